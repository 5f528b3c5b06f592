use common::analysis::{SessionState, SessionStatus};
use common::queue::{EnqueueRequest, ItemUpdate, QueueItem, ResultSink};
use common::validation::validate_enqueue_request;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use telemetry::metrics::QUEUE_ITEMS;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("invalid queue item: {0}")]
    Invalid(String),

    #[error("queue item {0} not found")]
    NotFound(String),

    #[error("queue item {0} already exists")]
    AlreadyExists(String),

    #[error("queue item {id} cannot be started while {status}")]
    NotRunnable { id: String, status: &'static str },
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
}

struct QueueSlot {
    item: QueueItem,
    /// Insertion order; breaks ties between equal creation timestamps
    seq: u64,
    run: Option<ActiveRun>,
}

impl QueueSlot {
    /// A run is live from admission until it ends or is cancelled
    fn has_live_run(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.cancel.is_cancelled())
    }

    fn is_runnable(&self) -> bool {
        self.item.state.status.is_runnable() && !self.has_live_run()
    }
}

/// A run admitted by [`AnalysisQueue::begin_run`]
#[derive(Debug, Clone)]
pub struct RunTicket {
    /// Snapshot of the item after its state was reset
    pub item: QueueItem,
    pub run_id: u64,
    pub cancel: CancellationToken,
}

/// In-memory analysis queue
#[derive(Default)]
pub struct AnalysisQueue {
    items: DashMap<String, QueueSlot>,
    next_seq: AtomicU64,
    next_run: AtomicU64,
}

impl AnalysisQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, request: EnqueueRequest) -> Result<QueueItem, QueueError> {
        validate_enqueue_request(&request).map_err(|e| QueueError::Invalid(e.to_string()))?;

        let id = request
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let item = QueueItem::new(id.clone(), request);

        match self.items.entry(id.clone()) {
            Entry::Occupied(_) => Err(QueueError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(QueueSlot {
                    item: item.clone(),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    run: None,
                });
                QUEUE_ITEMS.set(self.len() as i64);
                info!(item_id = %id, kind = item.media_kind.as_str(), "item enqueued");
                Ok(item)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.items.get(id).map(|slot| slot.item.clone())
    }

    /// All items in creation order
    pub fn list(&self) -> Vec<QueueItem> {
        let mut slots: Vec<(u64, QueueItem)> = self
            .items
            .iter()
            .map(|slot| (slot.seq, slot.item.clone()))
            .collect();
        slots.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq))
        });
        slots.into_iter().map(|(_, item)| item).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove an item, cancelling its session if one is running
    pub fn remove(&self, id: &str) -> Result<QueueItem, QueueError> {
        let (_, slot) = self
            .items
            .remove(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if let Some(run) = slot.run {
            run.cancel.cancel();
        }
        QUEUE_ITEMS.set(self.len() as i64);
        info!(item_id = %id, "item removed");
        Ok(slot.item)
    }

    /// Remove every item, cancelling all running sessions. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let ids: Vec<String> = self.items.iter().map(|slot| slot.key().clone()).collect();
        let mut removed = 0;
        for id in ids {
            if let Some((_, slot)) = self.items.remove(&id) {
                if let Some(run) = slot.run {
                    run.cancel.cancel();
                }
                removed += 1;
            }
        }
        QUEUE_ITEMS.set(self.len() as i64);
        info!(removed, "queue cleared");
        removed
    }

    /// Admit a new session for `id`.
    ///
    /// Only `queued` and `error` items without a live run are eligible. The
    /// item's state and result are reset and the slot is marked running
    /// until [`AnalysisQueue::end_run`] is called or the run is cancelled.
    pub fn begin_run(&self, id: &str) -> Result<RunTicket, QueueError> {
        let mut slot = self
            .items
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let status = slot.item.state.status;
        if slot.has_live_run() {
            return Err(QueueError::NotRunnable {
                id: id.to_string(),
                status: "running",
            });
        }
        if !status.is_runnable() {
            return Err(QueueError::NotRunnable {
                id: id.to_string(),
                status: status.as_str(),
            });
        }

        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        slot.run = Some(ActiveRun {
            id: run_id,
            cancel: cancel.clone(),
        });
        slot.item.state = SessionState::default();
        slot.item.result = None;

        debug!(item_id = %id, run_id, retry = status == SessionStatus::Error, "run admitted");
        Ok(RunTicket {
            item: slot.item.clone(),
            run_id,
            cancel,
        })
    }

    /// Release the slot held by `run_id`; a no-op once another run took over
    pub fn end_run(&self, id: &str, run_id: u64) {
        if let Some(mut slot) = self.items.get_mut(id) {
            if slot.run.as_ref().is_some_and(|run| run.id == run_id) {
                slot.run = None;
            }
        }
    }

    /// Apply an update from run `run_id`.
    ///
    /// Updates for removed items or from a run that no longer holds the slot
    /// are dropped. Returns whether the update was applied.
    pub fn publish_run(&self, id: &str, run_id: u64, update: ItemUpdate) -> bool {
        let Some(mut slot) = self.items.get_mut(id) else {
            debug!(item_id = id, "dropping update for removed item");
            return false;
        };
        if !slot.run.as_ref().is_some_and(|run| run.id == run_id) {
            debug!(item_id = id, run_id, "dropping update from superseded run");
            return false;
        }
        slot.item.apply(update);
        true
    }

    /// Ids of every item `begin_run` would currently admit, in creation order
    pub fn runnable_ids(&self) -> Vec<String> {
        let mut runnable: Vec<(u64, String)> = self
            .items
            .iter()
            .filter(|slot| slot.is_runnable())
            .map(|slot| (slot.seq, slot.key().clone()))
            .collect();
        runnable.sort_by_key(|(seq, _)| *seq);
        runnable.into_iter().map(|(_, id)| id).collect()
    }

    /// Cancel every running session without removing items
    pub fn cancel_all(&self) {
        for slot in self.items.iter() {
            if let Some(run) = &slot.run {
                run.cancel.cancel();
            }
        }
    }
}

/// The sink one admitted run publishes into
pub struct RunSink {
    queue: Arc<AnalysisQueue>,
    run_id: u64,
}

impl RunSink {
    pub fn new(queue: Arc<AnalysisQueue>, run_id: u64) -> Self {
        Self { queue, run_id }
    }
}

impl ResultSink for RunSink {
    fn publish(&self, item_id: &str, update: ItemUpdate) {
        self.queue.publish_run(item_id, self.run_id, update);
    }
}
