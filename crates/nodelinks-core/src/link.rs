//! Project link management: `<project>/node_modules` as a directory link into the shared store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error_handling::utils::link_error;
use crate::error_handling::Result;
use crate::utils::{self, NODE_MODULES};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    Created { link: PathBuf, target: PathBuf },
    /// A link was already in place; nothing was touched.
    AlreadyLinked { link: PathBuf },
}

/// Link `<project_dir>/node_modules` to the shared node_modules of `shared_path`.
pub async fn create_link(project_dir: &Path, shared_path: &Path) -> Result<LinkOutcome> {
    let target = utils::with_node_modules(&utils::absolutize(shared_path));
    if tokio::fs::metadata(&target).await.is_err() {
        return Err(link_error(
            "create link",
            &target,
            "shared node_modules does not exist; install a package first",
        ));
    }

    let link = project_dir.join(NODE_MODULES);
    match tokio::fs::symlink_metadata(&link).await {
        Ok(meta) if meta.file_type().is_symlink() => {
            utils::trace(&format!("link {} already present", link.display()));
            return Ok(LinkOutcome::AlreadyLinked { link });
        }
        Ok(_) => {
            return Err(link_error(
                "create link",
                &link,
                "target exists and is not a symbolic link",
            ));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(link_error("create link", &link, e)),
    }

    #[cfg(unix)]
    tokio::fs::symlink(&target, &link)
        .await
        .map_err(|e| link_error("create link", &link, e))?;
    #[cfg(windows)]
    tokio::fs::symlink_dir(&target, &link)
        .await
        .map_err(|e| link_error("create link", &link, e))?;

    utils::log(&format!("Linked {} -> {}", link.display(), target.display()));
    Ok(LinkOutcome::Created { link, target })
}

/// Remove `<project_dir>/node_modules` if it is a link. Ok(None) when nothing is there;
/// a real directory or file is refused and left alone.
pub async fn remove_link(project_dir: &Path) -> Result<Option<PathBuf>> {
    let link = project_dir.join(NODE_MODULES);
    let meta = match tokio::fs::symlink_metadata(&link).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(link_error("remove link", &link, e)),
    };
    if !meta.file_type().is_symlink() {
        return Err(link_error(
            "remove link",
            &link,
            "target exists but is not a symbolic link; refusing to delete it",
        ));
    }

    #[cfg(unix)]
    tokio::fs::remove_file(&link)
        .await
        .map_err(|e| link_error("remove link", &link, e))?;
    // Directory links on Windows are removed as directories.
    #[cfg(windows)]
    tokio::fs::remove_dir(&link)
        .await
        .map_err(|e| link_error("remove link", &link, e))?;

    utils::log(&format!("Removed link {}", link.display()));
    Ok(Some(link))
}
