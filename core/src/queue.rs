//! Queue store: at most one live request per requester, consumed by a single
//! downstream worker.

use chrono::DateTime;
use chrono::Utc;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::record::TradeRecord;

/// Stable identifier of the user submitting requests.
pub type RequesterId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradePayload<R> {
    Single(R),
    /// Records of a batch, in submission order.
    Batch(Vec<R>),
}

impl<R> TradePayload<R> {
    pub fn len(&self) -> usize {
        match self {
            TradePayload::Single(_) => 1,
            TradePayload::Batch(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[R] {
        match self {
            TradePayload::Single(record) => std::slice::from_ref(record),
            TradePayload::Batch(records) => records,
        }
    }
}

/// Priority tier of a requester. Higher tiers are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Significance {
    #[default]
    Regular,
    Favored,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    /// 1-based index of this request within its batch.
    pub index: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFlags {
    pub is_hidden: bool,
    pub is_batch: bool,
    pub ignore_auto_ot: bool,
    pub is_non_native: bool,
}

#[derive(Debug, Clone)]
pub struct QueueRequest<R> {
    pub request_id: Uuid,
    pub requester: RequesterId,
    pub code: u32,
    pub display_name: String,
    pub payload: TradePayload<R>,
    pub significance: Significance,
    pub batch: Option<BatchInfo>,
    pub flags: RequestFlags,
    pub enqueued_at: DateTime<Utc>,
}

impl<R> QueueRequest<R> {
    pub fn new(
        requester: RequesterId,
        code: u32,
        display_name: impl Into<String>,
        payload: TradePayload<R>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            requester,
            code,
            display_name: display_name.into(),
            payload,
            significance: Significance::Regular,
            batch: None,
            flags: RequestFlags::default(),
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Queued,
    Processing,
}

#[derive(Debug, Clone)]
struct QueueEntry<R> {
    request: QueueRequest<R>,
    state: EntryState,
}

/// Receipt handed back to the front end on admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTicket {
    pub request_id: Uuid,
    pub requester: RequesterId,
    pub code: u32,
    /// 1-based service position at the time of admission.
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearResult {
    Cleared,
    CurrentlyProcessing,
    NotInQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("requester {0} already has a live request")]
    AlreadyQueued(RequesterId),
    #[error("queue is at capacity ({capacity})")]
    Full { capacity: usize },
}

pub struct TradeQueue<R> {
    entries: Mutex<IndexMap<RequesterId, QueueEntry<R>>>,
    capacity: usize,
}

impl<R: TradeRecord> TradeQueue<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn contains(&self, requester: RequesterId) -> bool {
        self.entries.lock().await.contains_key(&requester)
    }

    pub async fn state_of(&self, requester: RequesterId) -> Option<EntryState> {
        self.entries.lock().await.get(&requester).map(|e| e.state)
    }

    /// Insert `request` unless its requester already has a live entry or the
    /// queue is full. Check and insert happen under one lock.
    pub async fn try_enqueue(&self, request: QueueRequest<R>) -> Result<QueueTicket, EnqueueError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&request.requester) {
            return Err(EnqueueError::AlreadyQueued(request.requester));
        }
        if entries.len() >= self.capacity {
            return Err(EnqueueError::Full {
                capacity: self.capacity,
            });
        }
        debug!(
            requester = request.requester,
            request_id = %request.request_id,
            records = request.payload.len(),
            "request enqueued"
        );
        let (index, _) = entries.insert_full(
            request.requester,
            QueueEntry {
                request,
                state: EntryState::Queued,
            },
        );
        let position = service_position(&entries, index);
        let request = &entries[index].request;
        Ok(QueueTicket {
            request_id: request.request_id,
            requester: request.requester,
            code: request.code,
            position,
        })
    }

    /// Remove the requester's entry unless the worker already picked it up.
    pub async fn clear(&self, requester: RequesterId) -> ClearResult {
        let mut entries = self.entries.lock().await;
        match entries.get(&requester).map(|e| e.state) {
            None => ClearResult::NotInQueue,
            Some(EntryState::Processing) => ClearResult::CurrentlyProcessing,
            Some(EntryState::Queued) => {
                entries.shift_remove(&requester);
                ClearResult::Cleared
            }
        }
    }

    /// Snapshot of all requests matching `predicate`, in queue order.
    pub async fn find<P>(&self, predicate: P) -> Vec<QueueRequest<R>>
    where
        P: Fn(&QueueRequest<R>) -> bool,
    {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| predicate(&e.request))
            .map(|e| e.request.clone())
            .collect()
    }

    /// 1-based position of the requester's entry in service order.
    pub async fn position(&self, requester: RequesterId) -> Option<usize> {
        let entries = self.entries.lock().await;
        let index = entries.get_index_of(&requester)?;
        Some(service_position(&entries, index))
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Worker side: mark the next queued request as processing and return it.
    /// Higher significance goes first; ties keep arrival order.
    pub async fn begin_next(&self) -> Option<QueueRequest<R>> {
        let mut entries = self.entries.lock().await;
        let mut next: Option<(usize, Significance)> = None;
        for (index, entry) in entries.values().enumerate() {
            if entry.state != EntryState::Queued {
                continue;
            }
            let tier = entry.request.significance;
            if next.is_none_or(|(_, best)| tier > best) {
                next = Some((index, tier));
            }
        }
        let (index, _) = next?;
        let (_, entry) = entries.get_index_mut(index)?;
        entry.state = EntryState::Processing;
        Some(entry.request.clone())
    }

    /// Worker side: drop a finished request. Returns false when the
    /// requester had nothing in processing.
    pub async fn complete(&self, requester: RequesterId) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(&requester) {
            Some(entry) if entry.state == EntryState::Processing => {
                entries.shift_remove(&requester);
                true
            }
            _ => false,
        }
    }
}

/// Where the entry at `index` stands in the order `begin_next` serves.
/// Entries already processing stand ahead of every queued one; queued entries
/// are ordered by significance, then arrival.
fn service_position<R>(entries: &IndexMap<RequesterId, QueueEntry<R>>, index: usize) -> usize {
    let Some((_, target)) = entries.get_index(index) else {
        return entries.len() + 1;
    };
    let tier = target.request.significance;
    let ahead = entries
        .values()
        .enumerate()
        .filter(|(i, entry)| match (target.state, entry.state) {
            (EntryState::Processing, EntryState::Processing) => *i < index,
            (EntryState::Processing, EntryState::Queued) => false,
            (EntryState::Queued, EntryState::Processing) => true,
            (EntryState::Queued, EntryState::Queued) => {
                let other = entry.request.significance;
                other > tier || (other == tier && *i < index)
            }
        })
        .count();
    ahead + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntityContext;
    use crate::record::EntityCore;
    use crate::record::Pk9;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn request(requester: RequesterId) -> QueueRequest<Pk9> {
        QueueRequest::new(
            requester,
            1234_5678,
            format!("user{requester}"),
            TradePayload::Single(Pk9::new(EntityCore::new(EntityContext::Gen9, 25))),
        )
    }

    #[tokio::test]
    async fn one_live_request_per_requester() {
        let queue = TradeQueue::new(8);
        let ticket = queue.try_enqueue(request(1)).await.expect("first");
        assert_eq!(ticket.position, 1);
        assert_matches!(
            queue.try_enqueue(request(1)).await,
            Err(EnqueueError::AlreadyQueued(1))
        );
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let queue = TradeQueue::new(2);
        queue.try_enqueue(request(1)).await.expect("1");
        queue.try_enqueue(request(2)).await.expect("2");
        assert_matches!(
            queue.try_enqueue(request(3)).await,
            Err(EnqueueError::Full { capacity: 2 })
        );
    }

    #[tokio::test]
    async fn processing_entries_cannot_be_cleared() {
        let queue = TradeQueue::new(8);
        queue.try_enqueue(request(1)).await.expect("1");
        queue.try_enqueue(request(2)).await.expect("2");

        let started = queue.begin_next().await.expect("work");
        assert_eq!(started.requester, 1);
        assert_eq!(queue.clear(1).await, ClearResult::CurrentlyProcessing);
        assert_eq!(queue.clear(2).await, ClearResult::Cleared);
        assert_eq!(queue.clear(3).await, ClearResult::NotInQueue);

        assert!(queue.complete(1).await);
        assert!(!queue.complete(1).await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn higher_significance_is_served_first() {
        let queue = TradeQueue::new(8);
        queue.try_enqueue(request(1)).await.expect("1");
        let mut favored = request(2);
        favored.significance = Significance::Favored;
        queue.try_enqueue(favored).await.expect("2");
        queue.try_enqueue(request(3)).await.expect("3");

        assert_eq!(queue.begin_next().await.map(|r| r.requester), Some(2));
        assert_eq!(queue.begin_next().await.map(|r| r.requester), Some(1));
        assert_eq!(queue.begin_next().await.map(|r| r.requester), Some(3));
        assert!(queue.begin_next().await.is_none());
    }

    #[tokio::test]
    async fn find_and_position() {
        let queue = TradeQueue::new(8);
        queue.try_enqueue(request(10)).await.expect("10");
        let mut batch = request(20);
        batch.flags.is_batch = true;
        queue.try_enqueue(batch).await.expect("20");

        let batches = queue.find(|r| r.flags.is_batch).await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].requester, 20);
        assert_eq!(queue.position(20).await, Some(2));
        assert_eq!(queue.position(30).await, None);
        assert_eq!(queue.state_of(10).await, Some(EntryState::Queued));
    }

    #[tokio::test]
    async fn positions_follow_service_order_across_tiers() {
        let queue = TradeQueue::new(8);
        assert_eq!(queue.try_enqueue(request(1)).await.map(|t| t.position), Ok(1));
        assert_eq!(queue.try_enqueue(request(2)).await.map(|t| t.position), Ok(2));
        let mut owner = request(3);
        owner.significance = Significance::Owner;
        assert_eq!(queue.try_enqueue(owner).await.map(|t| t.position), Ok(1));
        let mut favored = request(4);
        favored.significance = Significance::Favored;
        assert_eq!(queue.try_enqueue(favored).await.map(|t| t.position), Ok(2));

        let mut reported = Vec::new();
        for requester in 1..=4 {
            reported.push(queue.position(requester).await);
        }
        assert_eq!(reported, vec![Some(3), Some(4), Some(1), Some(2)]);

        let mut served = Vec::new();
        while let Some(request) = queue.begin_next().await {
            // The request being worked on stays first.
            assert_eq!(queue.position(request.requester).await, Some(1));
            served.push(request.requester);
            assert!(queue.complete(request.requester).await);
        }
        assert_eq!(served, vec![3, 4, 1, 2]);
    }

    #[tokio::test]
    async fn processing_entry_stands_ahead_of_queued_owner() {
        let queue = TradeQueue::new(8);
        queue.try_enqueue(request(1)).await.expect("1");
        assert_eq!(queue.begin_next().await.map(|r| r.requester), Some(1));

        let mut owner = request(2);
        owner.significance = Significance::Owner;
        let ticket = queue.try_enqueue(owner).await.expect("owner");
        assert_eq!(ticket.position, 2);
        assert_eq!(queue.position(1).await, Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_admit_one() {
        let queue = std::sync::Arc::new(TradeQueue::new(64));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let queue = std::sync::Arc::clone(&queue);
            handles.push(tokio::spawn(async move { queue.try_enqueue(request(7)).await }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.expect("join").is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
