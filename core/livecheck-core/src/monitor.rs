//! Event-driven monitor loop.
//!
//! One cycle per mount-table change: re-read the table, run the probes,
//! reconcile, publish. The install override arrives from another thread
//! through [`MonitorHandle::set_install_override`] and publishes immediately,
//! without waiting for the next mount event.
//!
//! Reconciliation, notification and fan-out all happen under one lock, so
//! subscribers see snapshots in the order they were produced and exactly one
//! publish per reconciliation.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::config::LivecheckConfig;
use crate::error::{LivecheckError, Result};
use crate::mount_watch::{MountEvents, MountTableWatcher};
use crate::notifier::{ChangeNotifier, Notification};
use crate::probe::{CommandProbeAdapter, ProbeAdapter, ProbeOutcome, ProbeRunner};
use crate::reconcile::StateReconciler;
use crate::types::{DetailFormat, LiveSnapshot, LiveState};

const MONITOR_THREAD_NAME: &str = "livecheck-monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    /// No snapshot has been published yet.
    Loading,
    Ready,
}

/// What subscribers receive on every publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdate {
    pub snapshot: LiveSnapshot,
    pub notification: Option<Notification>,
}

struct MonitorState {
    reconciler: StateReconciler,
    notifier: ChangeNotifier,
    current: LiveSnapshot,
    subscribers: Vec<Sender<LiveUpdate>>,
}

impl MonitorState {
    fn publish(&mut self, snapshot: LiveSnapshot) {
        let notification = self.notifier.observe(snapshot.state);
        tracing::info!(
            state = %snapshot.state,
            notify = notification.is_some(),
            "Live state published"
        );
        self.current = snapshot.clone();

        let update = LiveUpdate {
            snapshot,
            notification,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(update.clone()).is_ok());
    }
}

/// Cloneable view of a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    inner: Arc<Mutex<MonitorState>>,
}

impl MonitorHandle {
    fn new(format: DetailFormat) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorState {
                reconciler: StateReconciler::new(format),
                notifier: ChangeNotifier::new(),
                current: LiveSnapshot::loading(),
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // Nothing under this lock can panic midway through an update.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Receives every snapshot published after this call.
    pub fn subscribe(&self) -> Receiver<LiveUpdate> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn current(&self) -> LiveSnapshot {
        self.lock().current.clone()
    }

    pub fn phase(&self) -> MonitorPhase {
        if self.lock().current.state == LiveState::Loading {
            MonitorPhase::Loading
        } else {
            MonitorPhase::Ready
        }
    }

    pub fn install_override(&self) -> bool {
        self.lock().reconciler.install_override()
    }

    /// Applies a change of the install marker. Publishes only when the flag
    /// actually flips.
    pub fn set_install_override(&self, active: bool) {
        let mut state = self.lock();
        if let Some(snapshot) = state.reconciler.set_install_override(active) {
            tracing::info!(active, "Install override changed");
            state.publish(snapshot);
        }
    }

    fn close(&self) {
        self.lock().subscribers.clear();
    }

    /// Reconciles and publishes one probe outcome.
    pub(crate) fn apply_probe(&self, outcome: &ProbeOutcome) -> LiveSnapshot {
        let mut state = self.lock();
        let snapshot = state.reconciler.apply_probe(outcome);
        state.publish(snapshot.clone());
        snapshot
    }
}

pub struct Monitor<A: ProbeAdapter, M: MountEvents> {
    runner: ProbeRunner<A>,
    mounts: M,
    handle: MonitorHandle,
}

impl Monitor<CommandProbeAdapter, MountTableWatcher> {
    /// Builds the production monitor. Fails only if the mount table cannot
    /// be opened.
    pub fn from_config(config: &LivecheckConfig, format: DetailFormat) -> Result<Self> {
        let mounts = MountTableWatcher::open(&config.mounts.table)?;
        let runner = ProbeRunner::new(config.probe_adapter(), config.writable_source());
        Ok(Self::new(runner, mounts, format))
    }
}

impl<A: ProbeAdapter, M: MountEvents> Monitor<A, M> {
    pub fn new(runner: ProbeRunner<A>, mounts: M, format: DetailFormat) -> Self {
        Self {
            runner,
            mounts,
            handle: MonitorHandle::new(format),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> Receiver<LiveUpdate> {
        self.handle.subscribe()
    }

    /// One refresh-probe-publish cycle, without waiting.
    pub fn poll_once(&mut self) -> Result<LiveSnapshot> {
        let table = self.mounts.refresh()?;
        tracing::debug!(entries = table.lines().count(), "Mount table read");
        let outcome = self.runner.run();
        Ok(self.handle.apply_probe(&outcome))
    }

    /// Runs until the mount table becomes unusable. Subscribers are
    /// disconnected when it returns, so their receivers end.
    pub fn run(mut self) -> Result<()> {
        let result = self.run_cycles();
        if let Err(err) = &result {
            tracing::error!(error = %err, "Monitor stopped");
        }
        self.handle.close();
        result
    }

    fn run_cycles(&mut self) -> Result<()> {
        loop {
            self.poll_once()?;
            self.mounts.wait_for_change()?;
        }
    }
}

impl<A, M> Monitor<A, M>
where
    A: ProbeAdapter + 'static,
    M: MountEvents + 'static,
{
    pub fn spawn(self) -> Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || self.run())
            .map_err(|source| LivecheckError::Io {
                context: "spawning monitor thread".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeOutput, WritableSource};
    use std::collections::VecDeque;
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedAdapter {
        live: Mutex<VecDeque<ProbeOutput>>,
        lists: ProbeOutput,
    }

    impl ScriptedAdapter {
        fn new(live: Vec<ProbeOutput>, lists: ProbeOutput) -> Self {
            Self {
                live: Mutex::new(live.into()),
                lists,
            }
        }
    }

    impl ProbeAdapter for ScriptedAdapter {
        fn run_live_mode(&self) -> ProbeOutput {
            let mut queue = self.live.lock().expect("lock");
            if queue.len() > 1 {
                queue.pop_front().expect("non-empty")
            } else {
                queue.front().cloned().expect("at least one output")
            }
        }

        fn run_writable_fs_lists(&self) -> ProbeOutput {
            self.lists.clone()
        }
    }

    /// Allows a fixed number of waits, then reports the table as gone.
    struct CountedEvents {
        remaining: usize,
        refreshes: Arc<AtomicUsize>,
    }

    impl MountEvents for CountedEvents {
        fn refresh(&mut self) -> Result<String> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok("/dev/sda1 / ext4 rw 0 0\n".to_string())
        }

        fn wait_for_change(&mut self) -> Result<()> {
            if self.remaining == 0 {
                return Err(LivecheckError::MountTablePoll {
                    path: PathBuf::from("/proc/self/mounts"),
                    source: io::Error::new(io::ErrorKind::Other, "gone"),
                });
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    fn live(token: &str) -> ProbeOutput {
        ProbeOutput::new(
            0,
            format!("live_status_detected_live_mode_environment_machine='{}'\n", token),
            "",
        )
    }

    fn monitor(
        live_outputs: Vec<ProbeOutput>,
        waits: usize,
    ) -> (Monitor<ScriptedAdapter, CountedEvents>, Arc<AtomicUsize>) {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let adapter = ScriptedAdapter::new(live_outputs, ProbeOutput::new(0, "\n\n", ""));
        let events = CountedEvents {
            remaining: waits,
            refreshes: Arc::clone(&refreshes),
        };
        (
            Monitor::new(
                ProbeRunner::new(adapter, WritableSource::Script),
                events,
                DetailFormat::Html,
            ),
            refreshes,
        )
    }

    #[test]
    fn starts_loading_then_publishes_first_cycle() {
        let (mut monitor, _) = monitor(vec![live("grub-live-semi-persistent")], 0);
        let handle = monitor.handle();
        let rx = monitor.subscribe();
        assert_eq!(handle.phase(), MonitorPhase::Loading);
        assert_eq!(handle.current(), LiveSnapshot::loading());

        let snapshot = monitor.poll_once().expect("cycle");
        assert_eq!(
            snapshot,
            LiveSnapshot::new(
                LiveState::GrubLiveSemiPersistent,
                "<li>none</li>",
                "<li>none</li>"
            )
        );
        assert_eq!(handle.phase(), MonitorPhase::Ready);

        let update = rx.recv_timeout(Duration::from_secs(1)).expect("update");
        assert_eq!(update.snapshot, snapshot);
        assert!(update.notification.is_some_and(|n| n.first_observation));
    }

    #[test]
    fn run_publishes_once_per_mount_event_and_stops_on_poll_failure() {
        let (monitor, refreshes) = monitor(
            vec![live("iso-live"), live("iso-live-semi-persistent-unsafe"), live("iso-live")],
            2,
        );
        let rx = monitor.subscribe();

        let err = monitor.run().expect_err("poll failure ends the loop");
        assert!(err.is_fatal());
        assert_eq!(refreshes.load(Ordering::SeqCst), 3);

        let states: Vec<_> = rx.iter().map(|update| update.snapshot.state).collect();
        assert_eq!(
            states,
            vec![
                LiveState::IsoLive,
                LiveState::IsoLiveSemiPersistentUnsafe,
                LiveState::IsoLive
            ]
        );
    }

    #[test]
    fn override_publishes_immediately_and_restores_previous_snapshot() {
        let (mut monitor, _) = monitor(vec![live("iso-live")], 0);
        let handle = monitor.handle();
        let rx = monitor.subscribe();

        monitor.poll_once().expect("cycle");
        handle.set_install_override(true);
        handle.set_install_override(true);
        handle.set_install_override(false);

        let updates: Vec<_> = rx.try_iter().collect();
        let states: Vec<_> = updates.iter().map(|update| update.snapshot.state).collect();
        assert_eq!(
            states,
            vec![
                LiveState::IsoLive,
                LiveState::InstallingDistribution,
                LiveState::IsoLive
            ]
        );
        assert!(updates[0].notification.is_none());
        assert!(updates[1].notification.is_some());
        assert!(updates[2].notification.is_some());
        assert!(!handle.install_override());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let (mut monitor, _) = monitor(vec![live("persistent")], 0);
        let dropped = monitor.subscribe();
        drop(dropped);
        let kept = monitor.subscribe();

        monitor.poll_once().expect("cycle");
        assert_eq!(
            kept.try_recv().expect("update").snapshot,
            LiveSnapshot::bare(LiveState::Persistent)
        );
        assert_eq!(monitor.handle.lock().subscribers.len(), 1);
    }

    #[test]
    fn spawned_monitor_reports_fatal_error_through_join() {
        let (monitor, _) = monitor(vec![live("grub-live")], 0);
        let rx = monitor.subscribe();
        let join = monitor.spawn().expect("spawn");

        let update = rx.recv_timeout(Duration::from_secs(5)).expect("first publish");
        assert_eq!(update.snapshot.state, LiveState::GrubLive);
        let result = join.join().expect("monitor thread panicked");
        assert!(matches!(result, Err(LivecheckError::MountTablePoll { .. })));
    }
}
