//! Install-in-progress override.
//!
//! The system installer drops a marker file into a known directory while it
//! runs. The directory (not the file) is watched because the marker is
//! created and deleted by a process we do not control.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::error::{LivecheckError, Result};

/// Direct existence check, used by the one-shot query.
pub fn install_marker_present(marker: &Path) -> bool {
    marker.is_file()
}

/// Keeps the directory watch alive; dropping it stops the watch.
pub struct InstallOverrideWatch {
    _watcher: RecommendedWatcher,
    marker: PathBuf,
    active: Arc<AtomicBool>,
}

impl InstallOverrideWatch {
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Watches `dir` and calls `on_change` with the marker's presence whenever it
/// flips. The current presence is reported once up front if the marker is
/// already there.
pub fn watch_install_marker<F>(dir: &Path, marker: PathBuf, on_change: F) -> Result<InstallOverrideWatch>
where
    F: Fn(bool) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();

    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(|err| LivecheckError::OverrideWatch {
            path: dir.to_path_buf(),
            details: err.to_string(),
        })?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|err| LivecheckError::OverrideWatch {
            path: dir.to_path_buf(),
            details: err.to_string(),
        })?;

    let active = Arc::new(AtomicBool::new(false));
    let initially_present = install_marker_present(&marker);
    if initially_present {
        active.store(true, Ordering::SeqCst);
        tracing::info!(marker = %marker.display(), "Install marker present at startup");
        on_change(true);
    }

    let thread_marker = marker.clone();
    let thread_active = Arc::clone(&active);
    thread::Builder::new()
        .name("livecheck-install-watch".to_string())
        .spawn(move || {
            for res in rx {
                if let Err(err) = res {
                    tracing::warn!(error = %err, "Install marker watch reported an error");
                    continue;
                }
                let present = install_marker_present(&thread_marker);
                if thread_active.swap(present, Ordering::SeqCst) == present {
                    continue;
                }
                if present {
                    tracing::info!(
                        marker = %thread_marker.display(),
                        "Install marker was written by an external process"
                    );
                } else {
                    tracing::info!(
                        marker = %thread_marker.display(),
                        "Install marker was deleted by an external process"
                    );
                }
                on_change(present);
            }
        })
        .map_err(|source| LivecheckError::Io {
            context: "spawning install marker watch thread".to_string(),
            source,
        })?;

    Ok(InstallOverrideWatch {
        _watcher: watcher,
        marker,
        active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn marker_presence_requires_a_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let marker = temp_dir.path().join("install-running");
        assert!(!install_marker_present(&marker));

        fs_err::create_dir(&marker).expect("create dir");
        assert!(!install_marker_present(&marker));
        fs_err::remove_dir(&marker).expect("remove dir");

        fs_err::write(&marker, "").expect("write marker");
        assert!(install_marker_present(&marker));
    }

    #[test]
    fn missing_directory_fails_to_watch() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let dir = temp_dir.path().join("absent");
        let result = watch_install_marker(&dir, dir.join("install-running"), |_| {});
        assert!(matches!(result, Err(LivecheckError::OverrideWatch { .. })));
    }

    #[test]
    fn marker_changes_are_reported_once_each() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let marker = temp_dir.path().join("install-running");
        let (tx, rx) = mpsc::channel();

        let watch = watch_install_marker(temp_dir.path(), marker.clone(), move |present| {
            let _ = tx.send(present);
        })
        .expect("watch");
        assert!(!watch.is_active());

        fs_err::write(&marker, "").expect("create marker");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));

        fs_err::remove_file(&marker).expect("remove marker");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(false));
        assert!(!watch.is_active());
        assert_eq!(watch.marker(), marker.as_path());
    }

    #[test]
    fn existing_marker_is_reported_at_startup() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let marker = temp_dir.path().join("install-running");
        fs_err::write(&marker, "").expect("create marker");
        let (tx, rx) = mpsc::channel();

        let watch = watch_install_marker(temp_dir.path(), marker, move |present| {
            let _ = tx.send(present);
        })
        .expect("watch");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(true));
        assert!(watch.is_active());
    }
}
