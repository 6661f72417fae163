// FIFO queue of consumers suspended on an empty cache
use std::collections::VecDeque;
use tokio::sync::oneshot;

use crate::offer::OfferId;

/// Consumers waiting for the next offer, served first come first served.
///
/// Each waiter owns the receiving half of a oneshot channel and is woken with
/// the id of the offer reserved for it; the offer itself stays in the cache
/// until the consumer claims it. A waiter whose receiver has gone away (its
/// `pop` future was dropped) is skipped on hand-off and pruned on the next
/// registration.
pub(super) struct WaitQueue {
    waiters: VecDeque<oneshot::Sender<OfferId>>,
}

impl WaitQueue {
    pub(super) fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    /// Enqueue a new waiter at the back of the line.
    pub(super) fn register(&mut self) -> oneshot::Receiver<OfferId> {
        self.waiters.retain(|tx| !tx.is_closed());

        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    /// Wake the longest-waiting live consumer with `id`.
    ///
    /// Returns the id back when nobody is left to take it.
    pub(super) fn hand_off(&mut self, mut id: OfferId) -> Result<(), OfferId> {
        while let Some(tx) = self.waiters.pop_front() {
            match tx.send(id) {
                Ok(()) => return Ok(()),
                Err(returned) => id = returned,
            }
        }
        Err(id)
    }

    /// Number of consumers still waiting
    pub(super) fn live(&self) -> usize {
        self.waiters.iter().filter(|tx| !tx.is_closed()).count()
    }
}
