//! Safety guard: a shared store must never contain the tool's own global installation.
//!
//! `npm install` / `npm uninstall` prune the store's node_modules; if the global
//! `nodelinks` link lives in there the tool would delete itself.

use std::path::{Path, PathBuf};

use crate::error_handling::utils::safety_error;
use crate::error_handling::Result;
use crate::utils::{self, PACKAGE_NAME};

/// node_modules directory that would be inspected for `candidate`.
pub fn guarded_dir(candidate: &Path) -> PathBuf {
    utils::with_node_modules(&utils::absolutize(candidate))
}

/// True when the candidate's node_modules holds a symlink named after this tool.
/// A directory that cannot be listed (missing, no permission) is not dangerous.
pub async fn is_dangerous(candidate: &Path) -> bool {
    let dir = guarded_dir(candidate);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name() != PACKAGE_NAME {
            continue;
        }
        if let Ok(ft) = entry.file_type().await {
            if ft.is_symlink() {
                utils::trace(&format!("safety: {} contains {}", dir.display(), PACKAGE_NAME));
                return true;
            }
        }
    }
    false
}

/// Err(Safety) when `candidate` is dangerous.
pub async fn ensure_safe(operation: &str, candidate: &Path) -> Result<()> {
    if is_dangerous(candidate).await {
        return Err(safety_error(
            operation,
            &guarded_dir(candidate),
            "shared store contains this tool's own global installation",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nonexistent_dir_is_not_dangerous() {
        let td = tempfile::tempdir().unwrap();
        assert!(!is_dangerous(&td.path().join("missing")).await);
        assert!(ensure_safe("save settings", &td.path().join("missing")).await.is_ok());
    }

    #[tokio::test]
    async fn test_plain_directory_named_like_tool_is_not_dangerous() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join("node_modules").join(PACKAGE_NAME)).unwrap();
        assert!(!is_dangerous(td.path()).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_symlink_is_dangerous() {
        let td = tempfile::tempdir().unwrap();
        let install = td.path().join("global").join("lib").join(PACKAGE_NAME);
        std::fs::create_dir_all(&install).unwrap();

        let store = td.path().join("store");
        let nm = store.join("node_modules");
        std::fs::create_dir_all(&nm).unwrap();
        std::os::unix::fs::symlink(&install, nm.join("lodash")).unwrap();
        assert!(!is_dangerous(&store).await);

        std::os::unix::fs::symlink(&install, nm.join(PACKAGE_NAME)).unwrap();
        assert!(is_dangerous(&store).await);
        // same answer whether or not the path already ends in node_modules
        assert!(is_dangerous(&nm).await);

        let err = ensure_safe("save settings", &store).await.unwrap_err();
        assert!(err.is_safety());
        assert!(format!("{}", err).contains("node_modules"));
    }
}
