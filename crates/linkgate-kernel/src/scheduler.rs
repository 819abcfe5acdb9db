//! Per-callback poll scheduler.
//!
//! [`EventBridge::poll`] does not serialize concurrent calls: if two polls
//! for the same callback id overlap, whichever commits last wins. The
//! scheduler is the host-side answer to that. Every poll it runs holds a
//! mutex keyed by callback id, so polls for one identity never overlap while
//! polls for different identities run in parallel.
//!
//! On top of that it can drive a poll loop per callback id on a fixed
//! cadence:
//!
//! ```text
//! tick ──> lock(callback_id) ──> bridge.poll ──> batch ──> sink
//!                                     │
//!                                     └── error: logged, loop keeps cadence
//! ```
//!
//! A failed poll is not retried early. The next attempt happens on the next
//! tick, from the last committed checkpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use linkgate_bridge::EventBridge;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Items produced by one scheduled poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollBatch {
    pub callback_id: String,
    pub source: String,
    pub items: Vec<Map<String, Value>>,
    pub polled_at: DateTime<Utc>,
}

/// Snapshot of a running poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPoll {
    pub callback_id: String,
    pub source: String,
    pub every: Duration,
    pub started_at: DateTime<Utc>,
}

type PollLocks = DashMap<String, Arc<Mutex<()>>>;

struct PollLoop {
    info: ScheduledPoll,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Serializes polls per callback id and drives periodic poll loops.
///
/// Cheaply cloneable (`Arc`-backed); clones share locks and loops.
#[derive(Clone, Default)]
pub struct PollScheduler {
    locks: Arc<PollLocks>,
    loops: Arc<DashMap<String, PollLoop>>,
    shutdown: Arc<AtomicBool>,
}

impl PollScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one poll now, waiting for any in-flight poll of the same
    /// callback id to finish first.
    pub async fn poll_now(
        &self,
        bridge: &EventBridge,
        callback_id: &str,
    ) -> Result<Vec<Map<String, Value>>> {
        serialized_poll(&self.locks, bridge, callback_id).await
    }

    /// Start a poll loop for `callback_id` that polls every `every` and
    /// sends non-empty batches to `sink`.
    ///
    /// The first poll runs immediately. The loop ends when cancelled, when
    /// the scheduler shuts down, or when `sink`'s receiver is dropped.
    pub fn schedule(
        &self,
        bridge: EventBridge,
        callback_id: impl Into<String>,
        every: Duration,
        sink: mpsc::Sender<PollBatch>,
    ) -> Result<ScheduledPoll> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(KernelError::SchedulerShutdown);
        }
        if every.is_zero() {
            return Err(KernelError::InvalidSchedule {
                reason: "poll interval must be greater than zero".to_string(),
            });
        }
        if !bridge.supports_poll() {
            return Err(linkgate_bridge::BridgeError::PollUnsupported {
                source_id: bridge.source_id().to_string(),
            }
            .into());
        }

        let callback_id = callback_id.into();
        let info = ScheduledPoll {
            callback_id: callback_id.clone(),
            source: bridge.source_id().to_string(),
            every,
            started_at: Utc::now(),
        };

        // A finished loop (its sink was dropped) may be replaced.
        let slot = match self.loops.entry(callback_id.clone()) {
            Entry::Occupied(existing) if !existing.get().task.is_finished() => {
                return Err(KernelError::PollAlreadyScheduled { callback_id });
            }
            slot => slot,
        };

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.locks),
            bridge,
            callback_id.clone(),
            every,
            sink,
            stop_rx,
        ));

        tracing::info!(
            callback_id = %callback_id,
            source = %info.source,
            every_ms = every.as_millis() as u64,
            "poll loop scheduled"
        );

        slot.insert(PollLoop {
            info: info.clone(),
            stop,
            task,
        });
        Ok(info)
    }

    /// Stop the loop for `callback_id`. A poll already in flight finishes
    /// and commits normally. Returns `false` if no loop was running.
    pub fn cancel(&self, callback_id: &str) -> bool {
        match self.loops.remove(callback_id) {
            Some((_, running)) => {
                let _ = running.stop.send(true);
                release_lock(&self.locks, callback_id);
                tracing::info!(callback_id, "poll loop cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, callback_id: &str) -> bool {
        self.loops
            .get(callback_id)
            .is_some_and(|l| !l.task.is_finished())
    }

    /// Snapshot of running loops, sorted by callback id.
    pub fn scheduled(&self) -> Vec<ScheduledPoll> {
        let mut all: Vec<ScheduledPoll> = self
            .loops
            .iter()
            .filter(|l| !l.task.is_finished())
            .map(|l| l.info.clone())
            .collect();
        all.sort_by(|a, b| a.callback_id.cmp(&b.callback_id));
        all
    }

    /// Stop every loop and wait for them to exit. New loops are refused
    /// afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let ids: Vec<String> = self.loops.iter().map(|l| l.key().clone()).collect();
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, running)) = self.loops.remove(&id) {
                let _ = running.stop.send(true);
                tasks.push(running.task);
            }
        }
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "poll loop task ended abnormally");
            }
        }
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        tracing::info!("poll scheduler shut down");
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("loops", &self.loops.len())
            .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

// -- Private helpers ----------------------------------------------------

async fn serialized_poll(
    locks: &PollLocks,
    bridge: &EventBridge,
    callback_id: &str,
) -> Result<Vec<Map<String, Value>>> {
    let lock = Arc::clone(
        locks
            .entry(callback_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value(),
    );
    let polled = {
        let _guard = lock.lock().await;
        bridge.poll(callback_id).await
    };
    drop(lock);
    release_lock(locks, callback_id);
    Ok(polled?)
}

/// Drop the mutex for `callback_id` unless a poll still holds or awaits it.
/// The check runs under the map's shard lock, so a concurrent
/// `serialized_poll` either keeps the entry alive or creates a fresh one.
fn release_lock(locks: &PollLocks, callback_id: &str) {
    locks.remove_if(callback_id, |_, lock| Arc::strong_count(lock) == 1);
}

async fn run_loop(
    locks: Arc<PollLocks>,
    bridge: EventBridge,
    callback_id: String,
    every: Duration,
    sink: mpsc::Sender<PollBatch>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }

        match serialized_poll(&locks, &bridge, &callback_id).await {
            Ok(items) if items.is_empty() => {
                tracing::trace!(callback_id = %callback_id, "poll returned no items");
            }
            Ok(items) => {
                let batch = PollBatch {
                    callback_id: callback_id.clone(),
                    source: bridge.source_id().to_string(),
                    items,
                    polled_at: Utc::now(),
                };
                if sink.send(batch).await.is_err() {
                    tracing::debug!(callback_id = %callback_id, "poll sink closed");
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(
                    callback_id = %callback_id,
                    source = %bridge.source_id(),
                    kind = ?e.kind(),
                    error = %e,
                    "scheduled poll failed"
                );
            }
        }
    }

    tracing::debug!(callback_id = %callback_id, "poll loop stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use linkgate_bridge::{CallbackRegistration, PollOutcome, PollRequest, PollState};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_bridge() -> EventBridge {
        EventBridge::new(Arc::new(
            CallbackRegistration::builder("counter")
                .handle(|_event| async { Ok(None) })
                .poll(|req: PollRequest| async move {
                    let n = req.state.get("n").and_then(Value::as_u64).unwrap_or(0);
                    let mut item = Map::new();
                    item.insert("n".to_string(), json!(n));
                    Ok(PollOutcome::new(vec![item], PollState::new().with("n", n + 1)))
                })
                .build()
                .unwrap(),
        ))
    }

    #[tokio::test]
    async fn concurrent_polls_for_one_id_do_not_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        let bridge = EventBridge::new(Arc::new(
            CallbackRegistration::builder("slow")
                .handle(|_event| async { Ok(None) })
                .poll(move |req: PollRequest| {
                    let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        let n = req.state.get("n").and_then(Value::as_u64).unwrap_or(0);
                        let mut item = Map::new();
                        item.insert("n".to_string(), json!(n));
                        Ok(PollOutcome::new(vec![item], PollState::new().with("n", n + 1)))
                    }
                })
                .build()
                .unwrap(),
        ));

        let scheduler = PollScheduler::new();
        let (first, second) = tokio::join!(
            scheduler.poll_now(&bridge, "cb"),
            scheduler.poll_now(&bridge, "cb"),
        );

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let mut seen = vec![first.unwrap()[0]["n"].clone(), second.unwrap()[0]["n"].clone()];
        seen.sort_by_key(|v| v.as_u64());
        assert_eq!(seen, vec![json!(0), json!(1)]);
    }

    #[tokio::test]
    async fn loop_delivers_batches_until_cancelled() {
        let scheduler = PollScheduler::new();
        let (tx, mut rx) = mpsc::channel(8);

        let info = scheduler
            .schedule(counting_bridge(), "cb", Duration::from_millis(10), tx)
            .unwrap();
        assert_eq!(info.source, "counter");
        assert!(scheduler.is_scheduled("cb"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.callback_id, "cb");
        assert_eq!(first.items[0]["n"], 0);
        assert_eq!(second.items[0]["n"], 1);

        assert!(scheduler.cancel("cb"));
        assert!(!scheduler.cancel("cb"));
        assert!(scheduler.scheduled().is_empty());
    }

    #[tokio::test]
    async fn idle_locks_are_released() {
        let scheduler = PollScheduler::new();
        let bridge = counting_bridge();

        scheduler.poll_now(&bridge, "once").await.unwrap();
        assert!(!scheduler.locks.contains_key("once"));

        let (tx, mut rx) = mpsc::channel(8);
        scheduler
            .schedule(bridge, "cb", Duration::from_millis(10), tx)
            .unwrap();
        rx.recv().await.unwrap();
        assert!(scheduler.cancel("cb"));
        // Let a poll that was in flight at cancel time finish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.locks.is_empty());
    }

    #[tokio::test]
    async fn duplicate_schedule_is_rejected() {
        let scheduler = PollScheduler::new();
        let (tx, _rx) = mpsc::channel(8);
        scheduler
            .schedule(counting_bridge(), "cb", Duration::from_secs(60), tx.clone())
            .unwrap();
        let err = scheduler
            .schedule(counting_bridge(), "cb", Duration::from_secs(60), tx)
            .unwrap_err();
        assert!(matches!(err, KernelError::PollAlreadyScheduled { .. }));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_schedules_are_rejected() {
        let scheduler = PollScheduler::new();
        let (tx, _rx) = mpsc::channel(1);

        let err = scheduler
            .schedule(counting_bridge(), "cb", Duration::ZERO, tx.clone())
            .unwrap_err();
        assert!(matches!(err, KernelError::InvalidSchedule { .. }));

        let push_only = EventBridge::new(Arc::new(
            CallbackRegistration::builder("push")
                .handle(|_event| async { Ok(None) })
                .build()
                .unwrap(),
        ));
        let err = scheduler
            .schedule(push_only, "cb", Duration::from_secs(1), tx.clone())
            .unwrap_err();
        assert!(matches!(err, KernelError::Bridge(_)));

        scheduler.shutdown().await;
        let err = scheduler
            .schedule(counting_bridge(), "cb", Duration::from_secs(1), tx)
            .unwrap_err();
        assert!(matches!(err, KernelError::SchedulerShutdown));
    }

    #[tokio::test]
    async fn failing_polls_keep_the_loop_alive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let bridge = EventBridge::new(Arc::new(
            CallbackRegistration::builder("flaky")
                .handle(|_event| async { Ok(None) })
                .poll(move |_req: PollRequest| {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(linkgate_bridge::BridgeError::HttpStatus {
                                status: 503,
                                body: "busy".to_string(),
                            })
                        } else {
                            let mut item = Map::new();
                            item.insert("attempt".to_string(), json!(n));
                            Ok(PollOutcome::new(vec![item], PollState::new()))
                        }
                    }
                })
                .build()
                .unwrap(),
        ));

        let scheduler = PollScheduler::new();
        let (tx, mut rx) = mpsc::channel(8);
        scheduler
            .schedule(bridge, "cb", Duration::from_millis(10), tx)
            .unwrap();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.items[0]["attempt"], 1);
        scheduler.shutdown().await;
    }
}
