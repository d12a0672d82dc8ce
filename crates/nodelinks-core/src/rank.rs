//! Mirror ranking: concurrent probes over the catalog, latency ordering, recommendation,
//! and the paged interactive selection over the ranked list.

use std::cmp::Ordering;
use std::future::Future;
use std::time::Duration;

use crate::catalog::{Catalog, Mirror};
use crate::error_handling::Result;
use crate::http_client::build_probe_client;
use crate::probe::{probe_with, ProbeResult};
use crate::prompt::Prompt;
use crate::utils;

pub const PAGE_SIZE: usize = 10;

/// One row of the display list. `result` is None only for the custom slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedEntry {
    pub mirror: Mirror,
    pub result: Option<ProbeResult>,
}

impl RankedEntry {
    pub fn is_custom(&self) -> bool {
        self.result.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct Ranking {
    /// Probe results of every non-empty catalog address, sorted.
    pub results: Vec<ProbeResult>,
    /// Ranked entries followed by the custom slot, if the catalog has one.
    pub entries: Vec<RankedEntry>,
    pub recommended: String,
    /// False when no probe succeeded and `recommended` is the catalog fallback.
    pub recommendation_measured: bool,
}

/// Successful probes by ascending latency, then failures in their original order.
pub fn compare_results(a: &ProbeResult, b: &ProbeResult) -> Ordering {
    match (a.is_ok(), b.is_ok()) {
        (true, true) => a.elapsed_ms.cmp(&b.elapsed_ms),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Fastest successful probe, first one on ties.
pub fn recommend(results: &[ProbeResult]) -> Option<&ProbeResult> {
    results
        .iter()
        .filter(|r| r.is_ok())
        .fold(None, |best: Option<&ProbeResult>, r| match best {
            Some(b) if b.elapsed_ms <= r.elapsed_ms => Some(b),
            _ => Some(r),
        })
}

/// Rank with an arbitrary probe function. All probes start together and every one
/// is awaited, whatever its outcome.
pub async fn rank_with<F, Fut>(catalog: &Catalog, probe: F) -> Ranking
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = ProbeResult>,
{
    let targets: Vec<&Mirror> = catalog.probe_targets().collect();
    let probes = targets.iter().map(|m| probe(m.value.clone()));
    let outcomes = futures_util::future::join_all(probes).await;

    let mut paired: Vec<(Mirror, ProbeResult)> = targets
        .into_iter()
        .cloned()
        .zip(outcomes)
        .collect();
    paired.sort_by(|a, b| compare_results(&a.1, &b.1));

    let results: Vec<ProbeResult> = paired.iter().map(|(_, r)| r.clone()).collect();
    let (recommended, recommendation_measured) = match recommend(&results) {
        Some(best) => (best.target.clone(), true),
        None => (catalog.default_address().to_string(), false),
    };

    let mut entries: Vec<RankedEntry> = paired
        .into_iter()
        .map(|(mirror, result)| RankedEntry { mirror, result: Some(result) })
        .collect();
    if let Some(custom) = catalog.custom_entry() {
        entries.push(RankedEntry { mirror: custom.clone(), result: None });
    }

    let ok = results.iter().filter(|r| r.is_ok()).count();
    utils::trace(&format!(
        "ranked {} mirror(s): {} reachable, recommended {}",
        results.len(),
        ok,
        recommended
    ));

    Ranking { results, entries, recommended, recommendation_measured }
}

/// Rank every catalog mirror over HTTP; each probe carries its own timeout.
pub async fn rank_all(catalog: &Catalog, timeout_ms: u64) -> Ranking {
    match build_probe_client(Duration::from_millis(timeout_ms)) {
        Ok(client) => {
            let client = &client;
            rank_with(catalog, |addr| async move { probe_with(client, &addr, timeout_ms).await }).await
        }
        Err(e) => {
            let msg = e.to_string();
            rank_with(catalog, |addr| {
                let msg = msg.clone();
                async move { ProbeResult::failure(&addr, msg) }
            })
            .await
        }
    }
}

/// One line of the ranked display list.
pub fn format_entry(position: usize, entry: &RankedEntry) -> String {
    let address = if entry.mirror.is_custom() { "custom" } else { entry.mirror.value.as_str() };
    let status = match &entry.result {
        None => "custom address".to_string(),
        Some(r) => match (r.elapsed_ms, &r.error) {
            (Some(ms), None) => format!("{}ms", ms),
            _ => "probe failed".to_string(),
        },
    };
    format!(
        "  {:<3} {:<22} ({}) {}",
        format!("{}.", position),
        entry.mirror.name,
        address,
        status
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionState {
    ShowPage,
    AwaitInput,
    ConfirmSelection { position: usize, address: String },
    ProvideCustomAddress { position: usize },
    Done(Option<String>),
}

/// Paged selection over ranked entries.
pub struct Selector<'a> {
    entries: &'a [RankedEntry],
    page: usize,
    state: SelectionState,
    notice: Option<String>,
}

impl<'a> Selector<'a> {
    pub fn new(entries: &'a [RankedEntry]) -> Self {
        Self { entries, page: 0, state: SelectionState::ShowPage, notice: None }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.entries.len().div_ceil(PAGE_SIZE).max(1)
    }

    /// Lines for the current page, positions 1-based over the full list.
    pub fn page_lines(&self) -> Vec<String> {
        let start = self.page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.entries.len());
        let mut lines = vec![format!(
            "Mirrors by latency (page {}/{}, {} entries):",
            self.page + 1,
            self.total_pages(),
            self.entries.len()
        )];
        for (offset, entry) in self.entries[start..end].iter().enumerate() {
            lines.push(format_entry(start + offset + 1, entry));
        }
        lines.push(String::new());
        if self.total_pages() > 1 {
            lines.push("  n: next page, p: previous page".to_string());
        }
        lines.push(format!("  1-{}: choose a mirror, q: quit", self.entries.len()));
        lines
    }

    /// Apply one line typed at the AwaitInput state.
    pub fn choose(&mut self, input: &str) {
        let input = input.trim();
        let paged = self.total_pages() > 1;
        self.state = if paged && input.eq_ignore_ascii_case("n") && self.page + 1 < self.total_pages() {
            self.page += 1;
            SelectionState::ShowPage
        } else if paged && input.eq_ignore_ascii_case("p") && self.page > 0 {
            self.page -= 1;
            SelectionState::ShowPage
        } else if input.eq_ignore_ascii_case("q") {
            SelectionState::Done(None)
        } else {
            match input.parse::<usize>() {
                Ok(n) if n >= 1 && n <= self.entries.len() => {
                    let entry = &self.entries[n - 1];
                    if entry.is_custom() {
                        SelectionState::ProvideCustomAddress { position: n }
                    } else {
                        SelectionState::ConfirmSelection { position: n, address: entry.mirror.value.clone() }
                    }
                }
                _ => {
                    self.notice = Some(format!(
                        "Invalid input \"{}\"; enter a number between 1 and {}.",
                        input,
                        self.entries.len()
                    ));
                    SelectionState::ShowPage
                }
            }
        };
    }

    /// Apply the answer to the custom-address question.
    pub fn provide_custom(&mut self, position: usize, address: &str) {
        let address = address.trim();
        self.state = if address.is_empty() {
            self.notice = Some("Custom address cancelled.".to_string());
            SelectionState::ShowPage
        } else {
            SelectionState::ConfirmSelection { position, address: address.to_string() }
        };
    }

    /// Apply the y/n confirmation answer.
    pub fn confirm(&mut self, address: String, answer: &str) {
        self.state = if answer.trim().eq_ignore_ascii_case("y") {
            SelectionState::Done(Some(address))
        } else {
            self.notice = Some("Selection cancelled.".to_string());
            SelectionState::Done(None)
        };
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Drive the loop to completion. Some(address) only when the user confirmed a choice.
    pub fn run(&mut self, prompt: &mut dyn Prompt) -> Result<Option<String>> {
        loop {
            match self.state.clone() {
                SelectionState::ShowPage => {
                    prompt.clear();
                    for line in self.page_lines() {
                        prompt.say(&line);
                    }
                    if let Some(notice) = self.take_notice() {
                        prompt.say(&notice);
                    }
                    self.state = SelectionState::AwaitInput;
                }
                SelectionState::AwaitInput => {
                    let input = prompt.ask("Choice: ")?;
                    self.choose(&input);
                }
                SelectionState::ProvideCustomAddress { position } => {
                    let address = prompt.ask("Custom registry address (empty to cancel): ")?;
                    self.provide_custom(position, &address);
                }
                SelectionState::ConfirmSelection { position, address } => {
                    let name = &self.entries[position - 1].mirror.name;
                    prompt.say(&format!("Selected {} ({})", name, address));
                    let answer = prompt.ask("Use this mirror? (y/n): ")?;
                    self.confirm(address, &answer);
                    if let Some(notice) = self.take_notice() {
                        prompt.say(&notice);
                    }
                }
                SelectionState::Done(choice) => return Ok(choice),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompt;

    fn scenario_catalog() -> Catalog {
        Catalog::new(vec![
            Mirror::new("mirrorA", "m1.example", &["a"]),
            Mirror::new("mirrorB", "m2.example", &["b"]),
            Mirror::new("custom", "", &["custom"]),
        ])
        .unwrap()
    }

    async fn fake_probe(addr: String) -> ProbeResult {
        match addr.as_str() {
            "m1.example" => ProbeResult::success(&addr, 50, Some(200)),
            _ => ProbeResult::failure(&addr, "request timed out after 5000ms"),
        }
    }

    fn big_catalog(n: usize) -> Catalog {
        let mut mirrors: Vec<Mirror> = (0..n)
            .map(|i| Mirror::new(&format!("mirror{}", i), &format!("m{}.example", i), &[]))
            .collect();
        mirrors.push(Mirror::new("custom", "", &["custom"]));
        Catalog::new(mirrors).unwrap()
    }

    #[tokio::test]
    async fn test_ranking_scenario() {
        let catalog = scenario_catalog();
        let ranking = rank_with(&catalog, fake_probe).await;
        assert_eq!(ranking.results.len(), 2);
        assert_eq!(ranking.results[0].target, "m1.example");
        assert_eq!(ranking.results[0].elapsed_ms, Some(50));
        assert_eq!(ranking.results[1].target, "m2.example");
        assert!(ranking.results[1].error.is_some());
        assert_eq!(ranking.recommended, "m1.example");
        assert!(ranking.recommendation_measured);
        assert_eq!(ranking.entries.len(), 3);
        assert!(ranking.entries[2].is_custom());
    }

    #[tokio::test]
    async fn test_ranking_order_property() {
        let catalog = big_catalog(12);
        let ranking = rank_with(&catalog, |addr: String| async move {
            let n: u64 = addr.trim_start_matches('m').trim_end_matches(".example").parse().unwrap();
            if n % 3 == 0 {
                ProbeResult::failure(&addr, "connection refused")
            } else {
                ProbeResult::success(&addr, 1000 - n * 37 % 500, Some(200))
            }
        })
        .await;
        assert_eq!(ranking.results.len(), 12);
        for pair in ranking.results.windows(2) {
            if pair[1].is_ok() {
                assert!(pair[0].is_ok());
                assert!(pair[0].elapsed_ms <= pair[1].elapsed_ms);
            }
        }
        let best = ranking.results.iter().filter(|r| r.is_ok()).map(|r| r.elapsed_ms).min().unwrap();
        assert_eq!(ranking.results[0].elapsed_ms, best);
        assert_eq!(ranking.recommended, ranking.results[0].target);
    }

    #[tokio::test]
    async fn test_all_failed_falls_back_to_first_entry() {
        let catalog = scenario_catalog();
        let ranking = rank_with(&catalog, |addr: String| async move {
            ProbeResult::failure(&addr, "offline")
        })
        .await;
        assert_eq!(ranking.recommended, "m1.example");
        assert!(!ranking.recommendation_measured);
        // Failures keep catalog order.
        assert_eq!(ranking.results[0].target, "m1.example");
        assert_eq!(ranking.results[1].target, "m2.example");
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        let catalog = big_catalog(5);
        let start = std::time::Instant::now();
        let ranking = rank_with(&catalog, |addr: String| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            ProbeResult::success(&addr, 200, Some(200))
        })
        .await;
        assert_eq!(ranking.results.len(), 5);
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_selector_selects_and_confirms() {
        let catalog = scenario_catalog();
        let ranking = rank_with(&catalog, fake_probe).await;
        let mut prompt = ScriptedPrompt::new(["2", "y"]);
        let choice = Selector::new(&ranking.entries).run(&mut prompt).unwrap();
        assert_eq!(choice.as_deref(), Some("m2.example"));
    }

    #[tokio::test]
    async fn test_selector_rejects_out_of_range_then_quits() {
        let catalog = scenario_catalog();
        let ranking = rank_with(&catalog, fake_probe).await;
        let mut prompt = ScriptedPrompt::new(["4", "abc", "n", "q"]);
        let choice = Selector::new(&ranking.entries).run(&mut prompt).unwrap();
        assert_eq!(choice, None);
        assert!(prompt.said("Invalid input \"4\""));
        // single page: n is not a paging token
        assert!(prompt.said("Invalid input \"n\""));
        assert_eq!(prompt.remaining(), 0);
    }

    #[tokio::test]
    async fn test_selector_custom_address_flow() {
        let catalog = scenario_catalog();
        let ranking = rank_with(&catalog, fake_probe).await;
        let mut prompt = ScriptedPrompt::new(["3", "", "3", "https://npm.internal/", "y"]);
        let choice = Selector::new(&ranking.entries).run(&mut prompt).unwrap();
        assert_eq!(choice.as_deref(), Some("https://npm.internal/"));
        assert!(prompt.said("Custom address cancelled."));
    }

    #[tokio::test]
    async fn test_selector_declined_confirmation() {
        let catalog = scenario_catalog();
        let ranking = rank_with(&catalog, fake_probe).await;
        let mut prompt = ScriptedPrompt::new(["1", "n"]);
        let choice = Selector::new(&ranking.entries).run(&mut prompt).unwrap();
        assert_eq!(choice, None);
    }

    #[tokio::test]
    async fn test_selector_paging() {
        let catalog = big_catalog(14);
        let ranking = rank_with(&catalog, |addr: String| async move {
            ProbeResult::success(&addr, 10, Some(200))
        })
        .await;
        let mut selector = Selector::new(&ranking.entries);
        assert_eq!(selector.total_pages(), 2);
        selector.choose("p");
        assert_eq!(selector.page(), 0);
        assert!(selector.take_notice().is_some());
        selector.choose("N");
        assert_eq!(selector.page(), 1);
        assert_eq!(selector.state(), &SelectionState::ShowPage);
        selector.choose("n");
        assert_eq!(selector.page(), 1);
        assert!(selector.page_lines()[0].contains("page 2/2"));
        // positions are global across pages
        selector.choose("15");
        assert_eq!(selector.state(), &SelectionState::ProvideCustomAddress { position: 15 });
        selector.choose("3");
        assert_eq!(
            selector.state(),
            &SelectionState::ConfirmSelection { position: 3, address: ranking.entries[2].mirror.value.clone() }
        );
    }

    #[test]
    fn test_format_entry() {
        let entry = RankedEntry {
            mirror: Mirror::new("mirrorA", "m1.example", &[]),
            result: Some(ProbeResult::success("m1.example", 50, Some(200))),
        };
        let line = format_entry(1, &entry);
        assert!(line.contains("mirrorA"));
        assert!(line.contains("50ms"));
        let custom = RankedEntry { mirror: Mirror::new("Custom", "", &[]), result: None };
        assert!(format_entry(3, &custom).contains("custom address"));
    }
}
