use crate::utils::ancestors;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// After a mirrored file is deleted, remove the directory it leaves behind.
/// Walks from `start_dir` upward, remembering the farthest directory found
/// completely empty, and stops at the first non-empty one; the surviving
/// candidate is removed with a single non-recursive delete. An ancestor still
/// containing its (empty) child directory counts as non-empty, so one
/// invocation removes at most `start_dir` itself; callers pruning after later
/// deletions peel further levels one pass at a time.
///
/// Does nothing when `start_dir` still has contents (a sibling file, say).
pub async fn prune_empty_ancestors(start_dir: &Path) -> Result<()> {
    let mut last_empty: Option<PathBuf> = None;
    for dir in ancestors(start_dir) {
        if !is_empty_dir(dir).await? {
            break;
        }
        last_empty = Some(dir.to_path_buf());
    }
    if let Some(dir) = last_empty {
        info!("Removing empty folder ({})", dir.display());
        tokio::fs::remove_dir(&dir).await?;
    }
    Ok(())
}

/// A directory with zero entries. A missing directory counts as non-empty so
/// the walk stops instead of erroring (it may already have been pruned).
async fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("not pruning {}: {e}", dir.display());
            return Ok(false);
        }
    };
    Ok(entries.next_entry().await?.is_none())
}
