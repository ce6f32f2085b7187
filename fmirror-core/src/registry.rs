use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Source paths with a copy currently in flight, keyed to when the copy
/// began. Duplicate near-simultaneous events for a path (editors saving the
/// same file twice in a burst) are suppressed by refusing a second entry.
///
/// Insert, lookup and removal synchronize internally; callers never hold an
/// outer lock.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    paths: Mutex<HashMap<PathBuf, Instant>>,
}

impl InFlightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim a path for a copy operation. Returns `None` when the path is
    /// already in flight, in which case the caller drops its event. The
    /// returned guard releases the claim when dropped, whatever path the
    /// operation takes to get there.
    pub fn begin(self: &Arc<Self>, path: &Path) -> Option<InFlightGuard> {
        let mut paths = self.paths.lock().expect("in-flight registry poisoned");
        if paths.contains_key(path) {
            return None;
        }
        paths.insert(path.to_path_buf(), Instant::now());
        Some(InFlightGuard {
            registry: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .expect("in-flight registry poisoned")
            .contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().expect("in-flight registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, path: &Path) {
        self.paths
            .lock()
            .expect("in-flight registry poisoned")
            .remove(path);
    }
}

/// Releases the claimed path on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_for_same_path_is_refused() {
        let registry = InFlightRegistry::new();
        let path = Path::new("/src/file.txt");

        let guard = registry.begin(path);
        assert!(guard.is_some());
        assert!(registry.begin(path).is_none());
        assert_eq!(registry.len(), 1);

        drop(guard);
        assert!(registry.is_empty());
        assert!(registry.begin(path).is_some());
    }

    #[test]
    fn guard_releases_on_error_paths_too() {
        let registry = InFlightRegistry::new();
        let path = Path::new("/src/file.txt");

        let result: Result<(), &str> = (|| {
            let _guard = registry.begin(path).ok_or("busy")?;
            Err("copy failed")
        })();
        assert!(result.is_err());
        assert!(!registry.contains(path));
    }

    #[test]
    fn distinct_paths_do_not_collide() {
        let registry = InFlightRegistry::new();
        let a = registry.begin(Path::new("/a"));
        let b = registry.begin(Path::new("/b"));
        assert!(a.is_some() && b.is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn claim_is_visible_across_threads() {
        let registry = InFlightRegistry::new();
        let _guard = registry.begin(Path::new("/contended")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.begin(Path::new("/contended")).is_none())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.len(), 1);
    }
}
