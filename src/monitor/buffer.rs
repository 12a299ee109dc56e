// src/monitor/buffer.rs

//! The only structure shared between a sampler's read loop and the
//! orchestrator: an append-only buffer with a destructive, atomic drain.

use tokio::sync::Mutex;
use tracing::trace;

/// Records pushed by a producer and taken in bulk by a consumer.
///
/// `drain` swaps the contents out under the lock, so a record is returned by
/// exactly one drain and pushes racing with a drain land either wholly before
/// or wholly after it.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    inner: Mutex<Vec<T>>,
}

impl<T> SampleBuffer<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Append a batch atomically.
    pub async fn push_batch(&self, records: impl IntoIterator<Item = T>) {
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.extend(records);
        trace!(pushed = guard.len() - before, total = guard.len(), "sample buffer push");
    }

    pub async fn push(&self, record: T) {
        self.inner.lock().await.push(record);
    }

    /// Take everything currently buffered, leaving the buffer empty.
    pub async fn drain(&self) -> Vec<T> {
        let mut guard = self.inner.lock().await;
        std::mem::take(&mut *guard)
    }

    /// Drain and discard.
    pub async fn reset(&self) {
        let dropped = self.drain().await.len();
        trace!(dropped, "sample buffer reset");
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn drain_returns_everything_once() {
        let buf = SampleBuffer::new();
        buf.push_batch(vec![1, 2]).await;
        buf.push(3).await;

        assert_eq!(buf.drain().await, vec![1, 2, 3]);
        assert!(buf.is_empty().await);
        assert!(buf.drain().await.is_empty());
    }

    #[tokio::test]
    async fn reset_discards_pending_records() {
        let buf = SampleBuffer::new();
        buf.push_batch(["a", "b"]).await;
        buf.reset().await;
        buf.push("c").await;
        assert_eq!(buf.drain().await, vec!["c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pushes_and_drains_never_lose_or_duplicate() {
        let buf = Arc::new(SampleBuffer::new());
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let buf = Arc::clone(&buf);
                tokio::spawn(async move {
                    for i in 0..250u32 {
                        buf.push_batch([p * 1000 + i]).await;
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        for _ in 0..20 {
            seen.extend(buf.drain().await);
            tokio::task::yield_now().await;
        }
        for p in producers {
            p.await.unwrap();
        }
        seen.extend(buf.drain().await);

        seen.sort_unstable();
        let mut expected: Vec<u32> = (0..4u32)
            .flat_map(|p| (0..250u32).map(move |i| p * 1000 + i))
            .collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}
