//! File watching for rebuilds.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// Page, stylesheet, script or CSV was modified
    SourceModified(PathBuf),

    /// Image or other asset was modified
    AssetModified(PathBuf),

    /// File was created
    Created(PathBuf),

    /// File was deleted
    Deleted(PathBuf),
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `paths` recursively, dropping events for anything under `ignore`.
    ///
    /// Returns the watcher and a channel to receive events.
    pub fn new(
        paths: &[PathBuf],
        ignore: Vec<PathBuf>,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            let quiet_period = Duration::from_millis(100);
            let mut pending: Vec<WatchEvent> = Vec::new();

            loop {
                // Hold events until nothing has changed for a full quiet period
                let next = if pending.is_empty() {
                    sync_rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
                } else {
                    sync_rx.recv_timeout(quiet_period)
                };

                match next {
                    Ok(event) => {
                        let relevant = event
                            .paths
                            .iter()
                            .filter(|path| !ignore.iter().any(|skip| path.starts_with(skip)))
                            .filter_map(|path| classify_event(path, &event.kind));

                        for e in relevant {
                            if !pending.contains(&e) {
                                pending.push(e);
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        for e in pending.drain(..) {
                            if async_tx.blocking_send(e).is_err() {
                                return;
                            }
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
        EventKind::Modify(_) => match ext.as_str() {
            "html" | "css" | "js" | "csv" => Some(WatchEvent::SourceModified(path.to_path_buf())),
            _ => Some(WatchEvent::AssetModified(path.to_path_buf())),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use notify::EventKind;
    use std::fs;
    use std::time::Instant;
    use tempfile::tempdir;

    #[test]
    fn classifies_sources_and_assets() {
        let modify = EventKind::Modify(ModifyKind::Any);

        assert_eq!(
            classify_event(Path::new("g/js/app.js"), &modify),
            Some(WatchEvent::SourceModified(PathBuf::from("g/js/app.js")))
        );
        assert_eq!(
            classify_event(Path::new("g/images/head/a.PNG"), &modify),
            Some(WatchEvent::AssetModified(PathBuf::from("g/images/head/a.PNG")))
        );
        assert_eq!(
            classify_event(Path::new("g/new.csv"), &EventKind::Create(CreateKind::File)),
            Some(WatchEvent::Created(PathBuf::from("g/new.csv")))
        );
        assert_eq!(classify_event(Path::new("g/x"), &EventKind::Any), None);
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("guide.html");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()], vec![]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "<p>Created</p>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }

    #[tokio::test]
    async fn waits_for_quiet_period_after_last_change() {
        let temp = tempdir().unwrap();
        let css = temp.path().join("css.css");
        fs::write(&css, "p { color: red; }").unwrap();

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()], vec![]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&css, "p { color: blue; }").unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        fs::write(&css, "p { color: green; }").unwrap();
        let last_write = Instant::now();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        let waited = last_write.elapsed();

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(
            waited >= Duration::from_millis(50),
            "event delivered {:?} after the last write",
            waited
        );
    }

    #[tokio::test]
    async fn ignores_configured_paths() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("docs");
        fs::create_dir_all(&out).unwrap();

        let (watcher, mut rx) =
            FileWatcher::new(&[temp.path().to_path_buf()], vec![out.clone()]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(out.join("index.html"), "<p>bundle</p>").unwrap();

        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;

        drop(watcher);

        assert!(event.is_err(), "output writes should not be reported");
    }
}
