//! npm backend: every package-manager call runs inside the shared store, never in the
//! caller's project, with the configured registry passed explicitly.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::config::Settings;
use crate::error_handling::utils::{io_error, usage_error};
use crate::error_handling::{NodelinksError, Result};
use crate::safety;
use crate::utils;

/// npm subcommands that take the registry override.
const REGISTRY_COMMANDS: &[&str] = &["install", "uninstall", "ci"];

/// Registry URL for a stored address: https:// unless a scheme is present.
pub fn registry_url(repo: &str) -> String {
    let repo = repo.trim();
    if repo.contains("://") {
        repo.to_string()
    } else {
        format!("https://{}", repo)
    }
}

/// Full npm argument list for `command` with `packages`.
pub fn npm_args(command: &str, packages: &[String], repo: &str) -> Vec<String> {
    let mut args = vec![command.to_string()];
    args.extend(packages.iter().cloned());
    if REGISTRY_COMMANDS.contains(&command) {
        args.push("--registry".to_string());
        args.push(registry_url(repo));
    }
    args
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopLevelPackage {
    pub name: String,
    pub version: Option<String>,
}

impl std::fmt::Display for TopLevelPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListOutcome {
    Packages(Vec<TopLevelPackage>),
    /// npm printed something that is not a dependency tree; holds a preview of it.
    Unparseable(String),
}

/// Names npm sometimes reports for stray files in node_modules.
fn looks_like_file(name: &str) -> bool {
    (name.contains('/') && !name.starts_with('@'))
        || name.starts_with('.')
        || name == utils::NODE_MODULES
        || name.ends_with(".json")
        || name.ends_with(".log")
}

/// Parse `npm list --json --depth=0` output into sorted top-level packages.
pub fn parse_npm_list(output: &str) -> Option<Vec<TopLevelPackage>> {
    // npm may print warnings around the JSON document.
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end < start {
        return None;
    }
    let root: serde_json::Value = serde_json::from_str(&output[start..=end]).ok()?;
    let mut packages: Vec<TopLevelPackage> = root
        .get("dependencies")
        .and_then(|d| d.as_object())
        .map(|deps| {
            deps.iter()
                .filter(|(name, _)| !looks_like_file(name))
                .map(|(name, info)| TopLevelPackage {
                    name: name.clone(),
                    version: info.get("version").and_then(|v| v.as_str()).map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();
    packages.sort_by(|a, b| a.name.cmp(&b.name));
    Some(packages)
}

pub struct NpmBackend {
    program: String,
    prefix_args: Vec<String>,
    store: PathBuf,
    repo: String,
}

impl NpmBackend {
    pub fn new(settings: &Settings) -> Self {
        Self {
            program: utils::npm_program(),
            prefix_args: Vec::new(),
            store: settings.folder_path.clone(),
            repo: settings.repo.clone(),
        }
    }

    /// Run `program prefix_args... <npm args>` instead of npm.
    pub fn with_command(mut self, program: impl Into<String>, prefix_args: Vec<String>) -> Self {
        self.program = program.into();
        self.prefix_args = prefix_args;
        self
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    fn describe(&self, args: &[String]) -> String {
        format!("npm {}", args.join(" "))
    }

    async fn status(&self, args: &[String]) -> Result<ExitStatus> {
        let command = self.describe(args);
        utils::log(&format!("Running {} (store: {})", command, self.store.display()));
        Command::new(&self.program)
            .args(&self.prefix_args)
            .args(args)
            .current_dir(&self.store)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| NodelinksError::Subprocess {
                command,
                code: None,
                source: format!("failed to start {}: {}", self.program, e),
            })
    }

    /// Run npm with inherited stdio; a non-zero exit is a Subprocess error.
    async fn run(&self, args: Vec<String>) -> Result<()> {
        let status = self.status(&args).await?;
        let command = self.describe(&args);
        utils::trace(&format!("{} exited with {:?}", command, status.code()));
        if status.success() {
            return Ok(());
        }
        let source = match status.code() {
            Some(_) => "non-zero exit".to_string(),
            None => "terminated by signal".to_string(),
        };
        Err(NodelinksError::Subprocess { command, code: status.code(), source })
    }

    /// Safety check, then make sure the store exists and has a package.json.
    pub async fn prepare(&self) -> Result<()> {
        safety::ensure_safe("run npm", &self.store).await?;
        if tokio::fs::metadata(self.store.join(utils::NODE_MODULES)).await.is_ok() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.store)
            .await
            .map_err(|e| io_error("create store directory", Some(&self.store), e))?;
        if tokio::fs::metadata(self.store.join("package.json")).await.is_err() {
            let args = vec![
                "init".to_string(),
                "-y".to_string(),
                "--registry".to_string(),
                registry_url(&self.repo),
            ];
            self.run(args).await?;
        }
        Ok(())
    }

    async fn run_packages(&self, command: &str, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Err(usage_error(format!("{} needs at least one package name", command)));
        }
        self.prepare().await?;
        self.run(npm_args(command, packages, &self.repo)).await
    }

    pub async fn install(&self, packages: &[String]) -> Result<()> {
        self.run_packages("install", packages).await
    }

    pub async fn uninstall(&self, packages: &[String]) -> Result<()> {
        self.run_packages("uninstall", packages).await
    }

    /// Uninstall, wait for it to exit, then install. Install is skipped if uninstall failed.
    pub async fn reinstall(&self, packages: &[String]) -> Result<()> {
        self.uninstall(packages).await?;
        self.install(packages).await
    }

    /// Top-level packages of the store.
    pub async fn list(&self) -> Result<ListOutcome> {
        safety::ensure_safe("run npm", &self.store).await?;
        if tokio::fs::metadata(&self.store).await.is_err() {
            return Ok(ListOutcome::Packages(Vec::new()));
        }
        let args = vec!["list".to_string(), "--json".to_string(), "--depth=0".to_string()];
        let command = self.describe(&args);
        utils::trace(&format!("Running {} (store: {})", command, self.store.display()));
        let output = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(&args)
            .current_dir(&self.store)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| NodelinksError::Subprocess {
                command: command.clone(),
                code: None,
                source: format!("failed to start {}: {}", self.program, e),
            })?;
        // npm list exits non-zero on extraneous or missing packages but still prints the tree.
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(match parse_npm_list(&stdout) {
            Some(packages) => ListOutcome::Packages(packages),
            None => ListOutcome::Unparseable(stdout.chars().take(200).collect()),
        })
    }
}
