//! Irreversibility promoter (§4.8): drains the volatile store for a newly
//! irreversible block into the writer batches, coordinating with readers
//! through a versioned gate.
//!
//! The gate is a `tokio::sync::watch` channel rather than a bare
//! `Notify`: `Notify::notify_waiters()` stores no wakeup for a task that
//! calls `notified()` after the notify already fired, so a reader that
//! checks `blocks(block)` and finds it true, then loses its timeslice
//! before awaiting `notified()`, can miss the release entirely and hang
//! until the next unrelated promotion. `watch::Receiver::changed()` has
//! no such gap: every `send()` bumps a version the receiver's next
//! `changed().await` always observes, no matter when it's called.

use std::sync::Arc;

use indexer_storage::Storage;
use tokio::sync::watch;

/// Published by the promoter while a block is mid-drain; 0 means "no
/// promotion in flight". The query engine's `synchronize` (§4.10, §5) waits
/// on the channel while this intersects the caller's requested block range.
pub struct PromotionGate {
    tx: watch::Sender<u32>,
}

impl PromotionGate {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(0u32);
        Arc::new(Self { tx })
    }

    pub fn current(&self) -> u32 {
        *self.tx.borrow()
    }

    /// True if `block` is currently being promoted and a reversible-aware
    /// reader must wait before reading SQL.
    pub fn blocks(&self, block: u32) -> bool {
        self.current() == block
    }

    /// Wait until `block` is no longer mid-promotion.
    pub async fn synchronize(&self, block: u32) {
        let mut rx = self.tx.subscribe();
        while *rx.borrow() == block {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PromotionGate {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0u32);
        Self { tx }
    }
}

/// Drain the volatile store for `block_number` and hand the resulting batch
/// to the writers, publishing the gate around the drain. Not reentrant for
/// the same block: the caller (the node's irreversibility callback) never
/// invokes this concurrently with itself or with ingestion, per §5.
pub async fn promote_block(storage: &Arc<Storage>, gate: &PromotionGate, block_number: u32) {
    let _ = gate.tx.send(block_number);

    let batch = {
        let mut volatile = storage.volatile.write().await;
        volatile.drain_for_promotion(block_number)
    };
    storage.writers.flush_batch(batch);

    let _ = gate.tx.send(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn synchronize_returns_immediately_when_not_gated() {
        let gate = PromotionGate::new();
        tokio::time::timeout(Duration::from_millis(50), gate.synchronize(5))
            .await
            .expect("should not block");
    }

    #[tokio::test]
    async fn synchronize_blocks_while_gated_and_wakes_on_release() {
        let gate = PromotionGate::new();
        gate.tx.send(5).unwrap();

        let gate2 = Arc::clone(&gate);
        let waiter = tokio::spawn(async move {
            gate2.synchronize(5).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.tx.send(0).unwrap();

        tokio::time::timeout(Duration::from_millis(200), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn synchronize_ignores_unrelated_block() {
        let gate = PromotionGate::new();
        gate.tx.send(5).unwrap();
        tokio::time::timeout(Duration::from_millis(50), gate.synchronize(6))
            .await
            .expect("unrelated block should not block");
    }

    #[tokio::test]
    async fn synchronize_does_not_miss_a_release_that_happens_before_subscribing() {
        // Regression test for the notify_waiters() lost-wakeup: a release
        // that happens strictly before synchronize() starts waiting must
        // still be observable once synchronize() does start waiting for a
        // *later* gating of the same block.
        let gate = PromotionGate::new();
        gate.tx.send(5).unwrap();
        gate.tx.send(0).unwrap();
        gate.tx.send(5).unwrap();

        let gate2 = Arc::clone(&gate);
        let waiter = tokio::spawn(async move {
            gate2.synchronize(5).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.tx.send(0).unwrap();
        tokio::time::timeout(Duration::from_millis(200), waiter).await.unwrap().unwrap();
    }
}
