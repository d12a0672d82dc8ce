//! Styled terminal output (no-op styling when stdout isn't a TTY) and rendering of
//! probe results.

use std::env;
use std::io::IsTerminal;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nodelinks_core::{LatencyRating, ProbeResult, Ranking};

pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

pub fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

pub fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

pub fn warning(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.yellow());
    } else {
        eprintln!("{}", msg);
    }
}

pub fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{}", msg);
    }
}

pub fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Spinner for network waits; None when stdout isn't a terminal.
pub fn spinner(message: &str) -> Option<ProgressBar> {
    if !std::io::stdout().is_terminal() {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹")
        .template("{spinner:.dim} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Some(spinner)
}

pub fn finish(spinner: Option<ProgressBar>) {
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
}

/// One probe outcome with its latency rating.
pub fn print_probe(result: &ProbeResult) {
    match (result.elapsed_ms, &result.error) {
        (Some(ms), None) => {
            let rating = LatencyRating::from_ms(ms).label();
            let status = result
                .status_code
                .map(|c| format!(", HTTP {}", c))
                .unwrap_or_default();
            success(&format!("{}: {}ms ({}{})", result.target, ms, rating, status));
        }
        (_, Some(err)) => error(&format!("{}: failed ({})", result.target, err)),
        _ => error(&format!("{}: failed", result.target)),
    }
}

/// Ranked list, fastest first, then the recommendation.
pub fn print_ranking(ranking: &Ranking) {
    info("Mirror latency (fastest first):");
    for (i, entry) in ranking.entries.iter().enumerate() {
        let position = i + 1;
        match &entry.result {
            None => dim(&format!("  {}. {} (custom address)", position, entry.mirror.name)),
            Some(r) => match (r.elapsed_ms, &r.error) {
                (Some(ms), None) => println!(
                    "  {}. {} ({}) {}ms [{}]",
                    position,
                    entry.mirror.name,
                    entry.mirror.value,
                    ms,
                    LatencyRating::from_ms(ms).label()
                ),
                (_, err) => warning(&format!(
                    "  {}. {} ({}) failed: {}",
                    position,
                    entry.mirror.name,
                    entry.mirror.value,
                    err.as_deref().unwrap_or("unknown error")
                )),
            },
        }
    }
    if ranking.recommendation_measured {
        success(&format!("Recommended: {}", ranking.recommended));
    } else {
        warning(&format!(
            "No mirror answered; falling back to {}",
            ranking.recommended
        ));
    }
}
