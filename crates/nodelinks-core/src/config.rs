//! Settings store: settings.json beside the tool, first-run initialization, and the
//! save path every write goes through (safety check, normalization, atomic replace).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error_handling::utils::{io_error, safety_error, usage_error};
use crate::error_handling::{NodelinksError, Result};
use crate::prompt::Prompt;
use crate::rank;
use crate::safety;
use crate::store::JsonDocument;
use crate::utils::{self, DEFAULT_PROBE_TIMEOUT_MS, NODE_MODULES};

/// Default store location offered at first run, relative to the current directory.
pub const DEFAULT_STORE_SUBDIR: &str = "node_modules/.nodelinks_deps";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Store directory; the shared node_modules lives directly under it.
    #[serde(default)]
    pub folder_path: PathBuf,
    /// Registry address as stored (host or URL).
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub mirror_timeout: u64,
}

impl Settings {
    pub fn new(folder_path: impl Into<PathBuf>, repo: impl Into<String>, mirror_timeout: u64) -> Self {
        Self {
            folder_path: folder_path.into(),
            repo: repo.into(),
            mirror_timeout,
        }
    }

    /// Fill fields left empty by an older or hand-edited document.
    pub fn with_defaults(mut self, home: &Path, catalog: &Catalog) -> Self {
        if self.mirror_timeout == 0 {
            self.mirror_timeout = DEFAULT_PROBE_TIMEOUT_MS;
        }
        if self.repo.trim().is_empty() {
            self.repo = catalog.default_address().to_string();
        }
        if self.folder_path.as_os_str().is_empty() {
            self.folder_path = home.to_path_buf();
        }
        self
    }
}

/// Absolute store directory; a trailing node_modules component is stripped.
pub fn normalize_folder(input: &Path) -> PathBuf {
    let abs = utils::absolutize(input);
    match (abs.file_name(), abs.parent()) {
        (Some(name), Some(parent)) if name == NODE_MODULES => parent.to_path_buf(),
        _ => abs,
    }
}

pub struct SettingsStore {
    home: PathBuf,
    doc: JsonDocument,
}

impl SettingsStore {
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            doc: JsonDocument::new(utils::settings_path(home)),
        }
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    pub async fn exists(&self) -> bool {
        self.doc.exists().await
    }

    /// The document as stored, without initialization or defaults.
    pub async fn read_raw(&self) -> Result<Option<Settings>> {
        self.doc.read().await
    }

    /// Current settings. A missing, malformed, or dangerous document leads to
    /// interactive re-initialization; the loaded record is re-saved normalized.
    pub async fn load(&self, prompt: &mut dyn Prompt, catalog: &Catalog) -> Result<Settings> {
        let settings = match self.doc.read::<Settings>().await {
            Ok(Some(s)) => s,
            Ok(None) => return self.initialize(prompt, catalog).await,
            Err(NodelinksError::Config { source, .. }) => {
                utils::log_error(&format!(
                    "{} is malformed ({}); re-initializing",
                    self.path().display(),
                    source
                ));
                return self.initialize(prompt, catalog).await;
            }
            Err(e) => return Err(e),
        };
        let settings = settings.with_defaults(&self.home, catalog);

        if safety::is_dangerous(&settings.folder_path).await {
            utils::log_error(&format!(
                "folderPath {} contains the nodelinks installation; settings removed, re-initializing",
                settings.folder_path.display()
            ));
            self.doc.delete().await?;
            return self.initialize(prompt, catalog).await;
        }

        self.save(&settings, catalog).await
    }

    /// Normalized form of `settings` as it would be written.
    pub fn normalized(&self, settings: &Settings, catalog: &Catalog) -> Settings {
        Settings {
            folder_path: normalize_folder(&settings.folder_path),
            repo: catalog.normalize_registry(&settings.repo),
            mirror_timeout: if settings.mirror_timeout == 0 {
                DEFAULT_PROBE_TIMEOUT_MS
            } else {
                settings.mirror_timeout
            },
        }
    }

    /// Persist settings. A dangerous store path removes the existing document and
    /// fails without writing anything.
    pub async fn save(&self, settings: &Settings, catalog: &Catalog) -> Result<Settings> {
        if safety::is_dangerous(&settings.folder_path).await {
            self.doc.delete().await?;
            utils::log_error(&format!(
                "Refusing to save: {} contains the nodelinks installation",
                settings.folder_path.display()
            ));
            return Err(safety_error(
                "save settings",
                &safety::guarded_dir(&settings.folder_path),
                "shared store contains this tool's own global installation; settings removed",
            ));
        }
        let normalized = self.normalized(settings, catalog);
        self.doc.write(&normalized).await?;
        utils::trace(&format!(
            "saved settings: folderPath={} repo={} mirrorTimeout={}",
            normalized.folder_path.display(),
            normalized.repo,
            normalized.mirror_timeout
        ));
        Ok(normalized)
    }

    /// Delete settings.json. Returns whether there was one.
    pub async fn remove(&self) -> Result<bool> {
        let removed = self.doc.delete().await?;
        if removed {
            utils::log(&format!("Removed {}", self.path().display()));
        }
        Ok(removed)
    }

    /// First-run setup: choose and create the store, then pick a registry from the
    /// ranked mirror list.
    pub async fn initialize(&self, prompt: &mut dyn Prompt, catalog: &Catalog) -> Result<Settings> {
        prompt.say("Initializing nodelinks settings...");
        let default_path = utils::absolutize(Path::new(DEFAULT_STORE_SUBDIR));

        let folder = loop {
            let answer = prompt.ask(&format!(
                "Shared dependency path (default: {}, q to quit): ",
                default_path.display()
            ))?;
            if answer.eq_ignore_ascii_case("q") {
                return Err(usage_error("initialization cancelled"));
            }
            let candidate = if answer.is_empty() {
                default_path.clone()
            } else {
                normalize_folder(Path::new(&answer))
            };
            if safety::is_dangerous(&candidate).await {
                prompt.say(&format!(
                    "{} contains the global nodelinks installation; choose another path.",
                    candidate.display()
                ));
                continue;
            }
            let confirm = prompt.ask(&format!("Use {}? (y/n): ", candidate.display()))?;
            if confirm.eq_ignore_ascii_case("y") {
                break candidate;
            }
        };

        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| io_error("create store directory", Some(&folder), e))?;

        // Placeholder so later steps always find a document.
        let placeholder = Settings::new(&folder, catalog.default_address(), DEFAULT_PROBE_TIMEOUT_MS);
        self.save(&placeholder, catalog).await?;

        prompt.say("Measuring mirror latency...");
        let ranking = rank::rank_all(catalog, DEFAULT_PROBE_TIMEOUT_MS).await;

        prompt.say("Choose an npm registry:");
        for (i, mirror) in catalog.mirrors().iter().enumerate() {
            let line = if mirror.is_custom() {
                format!("  {}. {} (custom)", i + 1, mirror.name)
            } else {
                let latency = ranking
                    .results
                    .iter()
                    .find(|r| r.target == mirror.value)
                    .and_then(|r| if r.is_ok() { r.elapsed_ms } else { None });
                match latency {
                    Some(ms) => format!("  {}. {} ({}) [{}ms]", i + 1, mirror.name, mirror.value, ms),
                    None => format!("  {}. {} ({}) [probe failed]", i + 1, mirror.name, mirror.value),
                }
            };
            prompt.say(&line);
        }

        let default_index = catalog.index_of(&ranking.recommended).unwrap_or(1);
        let answer = prompt.ask(&format!("Index (recommended: {}): ", default_index))?;
        let index = if answer.is_empty() {
            default_index
        } else {
            answer.parse::<usize>().unwrap_or(0)
        };
        let repo = match catalog.mirrors().get(index.wrapping_sub(1)) {
            Some(m) if m.is_custom() => {
                let custom = prompt.ask("Custom registry address (https:// recommended): ")?;
                if custom.is_empty() {
                    ranking.recommended.clone()
                } else {
                    custom
                }
            }
            Some(m) => m.value.clone(),
            None => ranking.recommended.clone(),
        };

        let settings = self
            .save(&Settings::new(&folder, repo, DEFAULT_PROBE_TIMEOUT_MS), catalog)
            .await?;
        utils::log(&format!(
            "Settings initialized: folderPath={} repo={}",
            settings.folder_path.display(),
            settings.repo
        ));
        Ok(settings)
    }
}
