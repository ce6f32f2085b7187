use notify::{
    event::{ModifyKind, RenameMode},
    EventKind,
};
use std::path::PathBuf;

/// What a filesystem notification asks of the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// The source file exists (created or changed); the mirror copy must too.
    Upsert(PathBuf),
    /// The source file is gone; the mirror copy must go as well.
    Remove(PathBuf),
    /// The source file moved; old and new names are judged independently.
    Rename(PathBuf, PathBuf),
}

/// Convert a notify::Event into zero or more SyncEvents.
///
/// Upserts for directories are dropped here: the mirror holds files only, and
/// destination directories appear as a side effect of copying into them.
pub fn event_to_ops(event: notify::Event) -> Vec<SyncEvent> {
    let mut ops = Vec::new();
    match event.kind {
        EventKind::Create(_) => {
            for p in event.paths {
                if !p.is_dir() {
                    ops.push(SyncEvent::Upsert(p));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both => {
                // move event carries two paths (from, to)
                if event.paths.len() == 2 {
                    let mut paths = event.paths;
                    let to = paths.pop().expect("checked len");
                    let from = paths.pop().expect("checked len");
                    ops.push(SyncEvent::Rename(from, to));
                }
            }
            RenameMode::From => {
                for p in event.paths {
                    ops.push(SyncEvent::Remove(p));
                }
            }
            // RenameMode::To, and platforms that only report Any: the path we
            // got is the surviving side, treat it as fresh content.
            _ => {
                for p in event.paths {
                    if !p.is_dir() {
                        ops.push(SyncEvent::Upsert(p));
                    }
                }
            }
        },
        EventKind::Modify(_) => {
            for p in event.paths {
                if !p.is_dir() {
                    ops.push(SyncEvent::Upsert(p));
                }
            }
        }
        EventKind::Remove(_) => {
            for p in event.paths {
                ops.push(SyncEvent::Remove(p));
            }
        }
        _ => {}
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: Vec<&str>) -> notify::Event {
        let mut e = notify::Event::new(kind);
        e.paths = paths.into_iter().map(PathBuf::from).collect();
        e
    }

    #[test]
    fn create_and_modify_become_upserts() {
        let ops = event_to_ops(event(
            EventKind::Create(CreateKind::File),
            vec!["/r/a.txt"],
        ));
        assert_eq!(ops, vec![SyncEvent::Upsert(PathBuf::from("/r/a.txt"))]);

        let ops = event_to_ops(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec!["/r/a.txt"],
        ));
        assert_eq!(ops, vec![SyncEvent::Upsert(PathBuf::from("/r/a.txt"))]);
    }

    #[test]
    fn remove_maps_through() {
        let ops = event_to_ops(event(
            EventKind::Remove(RemoveKind::File),
            vec!["/r/a.txt"],
        ));
        assert_eq!(ops, vec![SyncEvent::Remove(PathBuf::from("/r/a.txt"))]);
    }

    #[test]
    fn two_path_rename_pairs_up() {
        let ops = event_to_ops(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec!["/r/old.txt", "/r/new.txt"],
        ));
        assert_eq!(
            ops,
            vec![SyncEvent::Rename(
                PathBuf::from("/r/old.txt"),
                PathBuf::from("/r/new.txt")
            )]
        );
    }

    #[test]
    fn one_sided_renames_degrade() {
        let ops = event_to_ops(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            vec!["/r/old.txt"],
        ));
        assert_eq!(ops, vec![SyncEvent::Remove(PathBuf::from("/r/old.txt"))]);

        let ops = event_to_ops(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            vec!["/r/new.txt"],
        ));
        assert_eq!(ops, vec![SyncEvent::Upsert(PathBuf::from("/r/new.txt"))]);
    }

    #[test]
    fn unrelated_kinds_are_dropped() {
        let ops = event_to_ops(event(
            EventKind::Access(notify::event::AccessKind::Any),
            vec!["/r/a"],
        ));
        assert!(ops.is_empty());
    }
}
