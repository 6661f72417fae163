// Bounded, deduplicating cache of resource offers
//
// Offers are keyed by id for O(1) dedup and rescind, and ordered by an
// insertion sequence for oldest-first eviction and delivery. Consumers that
// find the cache empty queue up and are woken with the next new offer, which
// stays reserved in the cache until they claim it.
use std::collections::{BTreeMap, HashMap};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::metrics::collector::{CacheMetrics, MetricsSnapshot, Occupancy};
use crate::offer::{Offer, OfferId};

mod waiters;

use waiters::WaitQueue;

/// Cache error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Invalid cache capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("Offer has an empty id")]
    EmptyOfferId,
}

/// What a successful push did with the offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored as the newest entry
    Inserted,
    /// Same id already cached or reserved for a consumer; payload replaced, position kept
    Replaced,
    /// Stored as the newest entry and the oldest one was dropped to make room
    Evicted(OfferId),
    /// Reserved for a waiting consumer
    HandedOff,
}

struct Entry<P> {
    seq: u64,
    offer: Offer<P>,
}

struct CacheState<P> {
    by_id: HashMap<OfferId, Entry<P>>,
    order: BTreeMap<u64, OfferId>,
    next_seq: u64,
    waiters: WaitQueue,
    /// Offers reserved for a woken waiter that has not claimed them yet
    in_flight: HashMap<OfferId, Entry<P>>,
}

enum Ticket<P> {
    Ready(Offer<P>),
    Wait(oneshot::Receiver<OfferId>),
}

/// Bounded offer cache shared between producers, rescinders and workers.
///
/// All operations take `&self`; wrap the cache in an `Arc` to share it.
/// Holds at most `capacity` offers, evicting the oldest on overflow.
pub struct OfferCache<P> {
    capacity: usize,
    state: Mutex<CacheState<P>>,
    metrics: CacheMetrics,
}

impl<P> OfferCache<P> {
    /// Create an empty cache holding at most `capacity` offers.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }

        Ok(Self {
            capacity,
            state: Mutex::new(CacheState {
                by_id: HashMap::with_capacity(capacity),
                order: BTreeMap::new(),
                next_seq: 0,
                waiters: WaitQueue::new(),
                in_flight: HashMap::new(),
            }),
            metrics: CacheMetrics::new(),
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(config.capacity)
    }

    /// Insert an offer, or replace the payload of the offer with the same id.
    ///
    /// A new id is reserved for the longest-waiting consumer if there is one.
    /// Otherwise it is stored as the newest entry, evicting the oldest entry if
    /// the cache was full. Replacing never changes the entry's position, and
    /// also applies to an offer reserved for a consumer that has not claimed it.
    pub fn push(&self, offer: Offer<P>) -> Result<PushOutcome, CacheError> {
        if offer.id.is_empty() {
            return Err(CacheError::EmptyOfferId);
        }

        let mut state = self.state.lock();

        if let Some(entry) = state.by_id.get_mut(&offer.id) {
            debug!("Replacing cached offer {}", offer.id);
            entry.offer = offer;
            self.metrics.record_replace();
            return Ok(PushOutcome::Replaced);
        }

        if let Some(entry) = state.in_flight.get_mut(&offer.id) {
            debug!("Replacing offer {} reserved for a consumer", offer.id);
            entry.offer = offer;
            self.metrics.record_replace();
            return Ok(PushOutcome::Replaced);
        }

        self.metrics.record_push();
        let seq = state.next_seq;
        state.next_seq += 1;
        Ok(self.admit(&mut state, Entry { seq, offer }))
    }

    /// Withdraw an offer by id.
    ///
    /// Returns true if the offer was cached or reserved for a consumer that
    /// has not claimed it yet. Unknown ids are a no-op.
    pub fn rescind(&self, id: &OfferId) -> bool {
        let mut state = self.state.lock();

        let removed = if let Some(entry) = state.by_id.remove(id) {
            state.order.remove(&entry.seq);
            true
        } else {
            state.in_flight.remove(id).is_some()
        };

        if removed {
            debug!("Rescinded offer {}", id);
        } else {
            trace!("Rescind of unknown offer {} ignored", id);
        }
        self.metrics.record_rescind(removed);
        removed
    }

    /// Remove and return the oldest offer, waiting for one if the cache is empty.
    ///
    /// Waiting consumers are served in the order they started waiting. The
    /// future is cancel-safe: dropping it (for example on a
    /// `tokio::time::timeout`) never loses an offer; one reserved for it but
    /// not yet claimed goes back into the cache at its original position.
    pub async fn pop(&self) -> Offer<P> {
        let mut ticket = self.enqueue();
        loop {
            let rx = match ticket {
                Ticket::Ready(offer) => return offer,
                Ticket::Wait(rx) => rx,
            };

            let mut pending = PendingPop { cache: self, rx };
            ticket = match (&mut pending.rx).await {
                Ok(id) => self.claim(&id),
                Err(_) => self.enqueue(),
            };
        }
    }

    /// Blocking variant of [`OfferCache::pop`] for plain threads.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; use
    /// `pop().await` there instead.
    pub fn blocking_pop(&self) -> Offer<P> {
        let mut ticket = self.enqueue();
        loop {
            let rx = match ticket {
                Ticket::Ready(offer) => return offer,
                Ticket::Wait(rx) => rx,
            };

            ticket = match rx.blocking_recv() {
                Ok(id) => self.claim(&id),
                Err(_) => self.enqueue(),
            };
        }
    }

    /// Remove and return the oldest offer without waiting.
    pub fn try_pop(&self) -> Option<Offer<P>> {
        let mut state = self.state.lock();
        let offer = Self::take_oldest(&mut state)?;
        self.metrics.record_pop();
        Some(offer)
    }

    /// Number of cached offers, not counting ones reserved for a consumer
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        debug_assert_eq!(state.by_id.len(), state.order.len());
        state.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: &OfferId) -> bool {
        self.state.lock().by_id.contains_key(id)
    }

    /// Number of consumers currently suspended in `pop`
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.live()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let occupancy = {
            let state = self.state.lock();
            Occupancy {
                len: state.by_id.len(),
                capacity: self.capacity,
                waiting: state.waiters.live(),
            }
        };
        self.metrics.snapshot(occupancy)
    }

    /// Place an entry: reserve it for a waiter, or store it at its sequence
    /// position and enforce capacity.
    fn admit(&self, state: &mut CacheState<P>, entry: Entry<P>) -> PushOutcome {
        let id = match state.waiters.hand_off(entry.offer.id.clone()) {
            Ok(()) => {
                debug!("Reserved offer {} for a waiting consumer", entry.offer.id);
                state.in_flight.insert(entry.offer.id.clone(), entry);
                self.metrics.record_hand_off();
                return PushOutcome::HandedOff;
            }
            Err(id) => id,
        };

        state.order.insert(entry.seq, id.clone());
        state.by_id.insert(id.clone(), entry);

        if state.by_id.len() > self.capacity {
            if let Some((_, oldest)) = state.order.pop_first() {
                state.by_id.remove(&oldest);
                debug!("Evicted oldest offer {} (capacity {})", oldest, self.capacity);
                self.metrics.record_eviction();
                return PushOutcome::Evicted(oldest);
            }
        }

        debug!("Cached offer {}", id);
        PushOutcome::Inserted
    }

    /// Take the oldest offer, or join the wait queue if there is none.
    fn enqueue(&self) -> Ticket<P> {
        let mut state = self.state.lock();
        self.take_or_wait(&mut state)
    }

    /// Take the offer reserved under `id` unless it was rescinded in the
    /// meantime, in which case fall back to the cache or go back to waiting.
    fn claim(&self, id: &OfferId) -> Ticket<P> {
        let mut state = self.state.lock();
        if let Some(entry) = state.in_flight.remove(id) {
            self.metrics.record_pop();
            return Ticket::Ready(entry.offer);
        }

        debug!("Offer {} was rescinded before delivery", id);
        self.take_or_wait(&mut state)
    }

    fn take_or_wait(&self, state: &mut CacheState<P>) -> Ticket<P> {
        match Self::take_oldest(state) {
            Some(offer) => {
                self.metrics.record_pop();
                Ticket::Ready(offer)
            }
            None => Ticket::Wait(state.waiters.register()),
        }
    }

    /// Release an offer whose waiter went away before claiming it. It goes
    /// to the next waiter or back to its original place in the eviction order.
    fn restore(&self, id: &OfferId) {
        let mut state = self.state.lock();
        let Some(entry) = state.in_flight.remove(id) else {
            debug!("Abandoned offer {} was rescinded in flight", id);
            return;
        };

        debug!("Restoring offer {} abandoned by its consumer", id);
        self.metrics.record_restore();
        self.admit(&mut state, entry);
    }

    fn take_oldest(state: &mut CacheState<P>) -> Option<Offer<P>> {
        let (_, id) = state.order.pop_first()?;
        state.by_id.remove(&id).map(|entry| entry.offer)
    }
}

impl<P> std::fmt::Debug for OfferCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfferCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// Receiving side of a suspended `pop`.
///
/// If dropped after being woken but before claiming, the reserved offer is
/// released back to the cache.
struct PendingPop<'a, P> {
    cache: &'a OfferCache<P>,
    rx: oneshot::Receiver<OfferId>,
}

impl<P> Drop for PendingPop<'_, P> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(id) = self.rx.try_recv() {
            self.cache.restore(&id);
        }
    }
}
