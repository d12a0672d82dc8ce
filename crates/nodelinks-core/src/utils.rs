use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

pub const LOG_FILE: &str = "logs.txt";
pub const SETTINGS_FILE: &str = "settings.json";
pub const CATALOG_FILE: &str = "repos.json";
pub const NODE_MODULES: &str = "node_modules";
/// Name the tool is installed under in a global node_modules.
pub const PACKAGE_NAME: &str = "nodelinks";
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;

/// Directory holding settings.json, repos.json and logs.txt.
/// Uses NODELINKS_HOME if set; otherwise the directory of the running executable.
pub fn tool_home() -> PathBuf {
    if let Ok(dir) = env::var("NODELINKS_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.canonicalize().ok().or(Some(exe)))
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn settings_path(home: &Path) -> PathBuf {
    home.join(SETTINGS_FILE)
}

pub fn catalog_path(home: &Path) -> PathBuf {
    home.join(CATALOG_FILE)
}

/// Package manager program. NODELINKS_NPM overrides (used by tests and custom installs).
pub fn npm_program() -> String {
    if let Ok(p) = env::var("NODELINKS_NPM") {
        if !p.trim().is_empty() {
            return p;
        }
    }
    if cfg!(target_os = "windows") {
        "npm.cmd".to_string()
    } else {
        "npm".to_string()
    }
}

/// Make `input` absolute against the current directory without touching the filesystem.
pub fn absolutize(input: &Path) -> PathBuf {
    if input.is_absolute() {
        return input.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(input))
        .unwrap_or_else(|_| input.to_path_buf())
}

/// `<path>/node_modules`, unless the path already ends in node_modules.
pub fn with_node_modules(path: &Path) -> PathBuf {
    if path.file_name().map(|n| n == NODE_MODULES).unwrap_or(false) {
        path.to_path_buf()
    } else {
        path.join(NODE_MODULES)
    }
}

fn is_quiet() -> bool {
    if env::var("NODELINKS_QUIET").map(|v| v == "1" || v == "true").unwrap_or(false) {
        return true;
    }
    env::var("NODELINKS_LOG")
        .map(|v| v.to_lowercase() == "quiet" || v.to_lowercase() == "error")
        .unwrap_or(false)
}

pub fn log(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let log_message = format!("[{}] {}", timestamp, message);

    if !is_quiet() {
        println!("{}", log_message);
    }
    append_log_line(&log_message);
}

pub fn log_error(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    eprintln!("{}", message);
    append_log_line(&format!("[{}] ERROR {}", timestamp, message));
}

/// Log to file only (never echoed). For chatty events like individual probe outcomes.
pub fn trace(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    append_log_line(&format!("[{}] {}", timestamp, message));
}

fn append_log_line(line: &str) {
    let log_path = tool_home().join(LOG_FILE);
    // Append-only; a log that cannot be opened never fails the command.
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = writeln!(file, "{}", line);
    }
}
