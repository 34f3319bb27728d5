use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use tracing::{debug, error, trace};

use crate::domain::LFError;
use crate::table::Table;

#[derive(Debug, Default, PartialEq)]
pub struct Changes {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FileEvent {
    Appeared(PathBuf),
    Vanished(PathBuf),
}

// Table files created, removed or renamed by a filesystem event.
fn file_events(event: &Event) -> Vec<FileEvent> {
    let tables = event.paths.iter().filter(|p| Table::is_table_file(p));
    match event.kind {
        EventKind::Create(_) => tables.map(|p| FileEvent::Appeared(p.clone())).collect(),
        EventKind::Remove(_) => tables.map(|p| FileEvent::Vanished(p.clone())).collect(),
        // Renames report old and new names; whichever still exists appeared.
        EventKind::Modify(ModifyKind::Name(_)) => tables
            .map(|p| {
                if p.exists() {
                    FileEvent::Appeared(p.clone())
                } else {
                    FileEvent::Vanished(p.clone())
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn forward(tx: &Sender<FileEvent>, res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            trace!("Watch event {:?} {:?}", event.kind, event.paths);
            for change in file_events(&event) {
                let _ = tx.send(change);
            }
        }
        Err(e) => error!("watch error: {e:?}"),
    }
}

/// Reports table files appearing in (or vanishing from) a directory. The
/// filesystem notifications are collected in a channel; every `drain` hands
/// out what arrived since the last one as one batch.
pub struct TableWatcher {
    dir: PathBuf,
    known: BTreeSet<PathBuf>,
    rx: Receiver<FileEvent>,
    _watcher: RecommendedWatcher,
}

impl TableWatcher {
    pub fn new(dir: PathBuf) -> Result<Self, LFError> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| forward(&tx, res),
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!("Watching {} for tables", dir.display());
        Ok(Self {
            dir,
            known: BTreeSet::new(),
            rx,
            _watcher: watcher,
        })
    }

    /// Table files present when watching started.
    pub fn existing(&mut self) -> Result<Changes, LFError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && Table::is_table_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(self.batch(paths.into_iter().map(FileEvent::Appeared)))
    }

    /// Everything the notifier delivered since the last call.
    pub fn drain(&mut self) -> Changes {
        let events: Vec<FileEvent> = self.rx.try_iter().collect();
        self.batch(events)
    }

    fn batch(&mut self, events: impl IntoIterator<Item = FileEvent>) -> Changes {
        let mut changes = Changes::default();
        for event in events {
            match event {
                FileEvent::Appeared(path) => {
                    if self.known.insert(path.clone()) {
                        changes.removed.retain(|p| *p != path);
                        changes.added.push(path);
                    }
                }
                FileEvent::Vanished(path) => {
                    if self.known.remove(&path) {
                        // appeared and vanished within the same batch
                        let before = changes.added.len();
                        changes.added.retain(|p| *p != path);
                        if before == changes.added.len() {
                            changes.removed.push(path);
                        }
                    }
                }
            }
        }
        if !changes.is_empty() {
            debug!(
                "Changes in {}: {} added, {} removed",
                self.dir.display(),
                changes.added.len(),
                changes.removed.len()
            );
        }
        changes
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind, RenameMode};
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};

    fn watcher(dir: &Path) -> TableWatcher {
        TableWatcher::new(dir.to_path_buf()).unwrap()
    }

    // Notifications arrive asynchronously.
    pub(crate) fn wait_for(watcher: &mut TableWatcher) -> Changes {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let changes = watcher.drain();
            if !changes.is_empty() || Instant::now() > deadline {
                return changes;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn events_are_reduced_to_table_files() {
        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/d/a.csv"))
            .add_path(PathBuf::from("/d/notes.txt"));
        assert_eq!(
            file_events(&create),
            vec![FileEvent::Appeared(PathBuf::from("/d/a.csv"))]
        );
        let remove = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/d/b.parquet"));
        assert_eq!(
            file_events(&remove),
            vec![FileEvent::Vanished(PathBuf::from("/d/b.parquet"))]
        );
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/d/a.csv"));
        assert!(file_events(&access).is_empty());
    }

    #[test]
    fn rename_reports_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let new = dir.path().join("new.csv");
        fs::write(&new, "City\nOslo\n").unwrap();
        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(dir.path().join("old.csv"))
            .add_path(new.clone());
        assert_eq!(
            file_events(&rename),
            vec![
                FileEvent::Vanished(dir.path().join("old.csv")),
                FileEvent::Appeared(new)
            ]
        );
    }

    #[test]
    fn batches_report_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = watcher(dir.path());
        let a = PathBuf::from("/d/a.csv");
        let b = PathBuf::from("/d/b.csv");

        let changes = w.batch(vec![
            FileEvent::Appeared(a.clone()),
            FileEvent::Appeared(a.clone()),
            FileEvent::Appeared(b.clone()),
            FileEvent::Vanished(b.clone()),
        ]);
        assert_eq!(changes.added, vec![a.clone()]);
        assert!(changes.removed.is_empty());

        let changes = w.batch(vec![FileEvent::Vanished(a.clone()), FileEvent::Vanished(b)]);
        assert_eq!(changes.removed, vec![a]);
        assert!(changes.added.is_empty());
    }

    #[test]
    fn existing_files_are_listed_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "City\nOslo\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut w = watcher(dir.path());
        let first = w.existing().unwrap();
        assert_eq!(first.added, vec![dir.path().join("a.csv")]);
        assert!(w.existing().unwrap().is_empty());
    }

    #[test]
    fn notifications_feed_drain() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = watcher(dir.path());
        assert!(w.drain().is_empty());

        let path = dir.path().join("jobs.csv");
        fs::write(&path, "City\nOslo\n").unwrap();
        let changes = wait_for(&mut w);
        assert_eq!(changes.added, vec![path.clone()]);

        fs::remove_file(&path).unwrap();
        let changes = wait_for(&mut w);
        assert_eq!(changes.removed, vec![path]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(TableWatcher::new(PathBuf::from("/definitely/not/here")).is_err());
    }
}
