//! An async, FIFO event channel for cascade progress/data events.
//!
//! Adapted from the teacher's thread-and-condvar `BoundedChannel`: the
//! producer/consumer pattern and statistics are kept, but the synchronous
//! `Mutex`+`Condvar` wait is replaced with `tokio::sync::mpsc`, since every
//! producer and consumer in this system is a cooperative async task rather
//! than an OS thread (§5: "a cooperative task scheduler").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{ResolveError, ResolveResult};
use crate::streaming::event::StreamEvent;

/// Statistics for a streaming channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    pub items_sent: u64,
    pub items_received: u64,
}

struct ChannelCounters {
    items_sent: AtomicU64,
    items_received: AtomicU64,
}

/// Sender side of an async stream-event channel.
pub struct StreamSender<T> {
    tx: mpsc::Sender<StreamEvent<T>>,
    counters: Arc<ChannelCounters>,
}

impl<T> StreamSender<T> {
    /// Sends an event, waiting for buffer space (the cascade's `enqueue`
    /// never drops a transaction, so this is the only mode exposed).
    pub async fn send(&self, event: StreamEvent<T>) -> ResolveResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ResolveError::ChannelClosed)?;
        self.counters.items_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn send_data(&self, item: T) -> ResolveResult<()> {
        self.send(StreamEvent::Data(item)).await
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            items_sent: self.counters.items_sent.load(Ordering::Relaxed),
            items_received: self.counters.items_received.load(Ordering::Relaxed),
        }
    }
}

impl<T> Clone for StreamSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Receiver side of an async stream-event channel.
pub struct StreamReceiver<T> {
    rx: mpsc::Receiver<StreamEvent<T>>,
    counters: Arc<ChannelCounters>,
}

impl<T> StreamReceiver<T> {
    /// Receives the next event, or `None` once every sender has dropped.
    pub async fn recv(&mut self) -> Option<StreamEvent<T>> {
        let item = self.rx.recv().await;
        if item.is_some() {
            self.counters.items_received.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            items_sent: self.counters.items_sent.load(Ordering::Relaxed),
            items_received: self.counters.items_received.load(Ordering::Relaxed),
        }
    }
}

/// Creates a bounded, FIFO stream-event channel pair of the given capacity.
pub fn stream_channel<T>(capacity: usize) -> (StreamSender<T>, StreamReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let counters = Arc::new(ChannelCounters {
        items_sent: AtomicU64::new(0),
        items_received: AtomicU64::new(0),
    });
    (
        StreamSender {
            tx,
            counters: Arc::clone(&counters),
        },
        StreamReceiver { rx, counters },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_fifo() {
        let (sender, mut receiver) = stream_channel::<i32>(10);
        sender.send_data(1).await.unwrap();
        sender.send_data(2).await.unwrap();
        drop(sender);

        assert!(matches!(receiver.recv().await, Some(StreamEvent::Data(1))));
        assert!(matches!(receiver.recv().await, Some(StreamEvent::Data(2))));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn stats_track_sent_and_received() {
        let (sender, mut receiver) = stream_channel::<i32>(10);
        sender.send_data(1).await.unwrap();
        sender.send_data(2).await.unwrap();
        receiver.recv().await;

        let stats = sender.stats();
        assert_eq!(stats.items_sent, 2);
        let rstats = receiver.stats();
        assert_eq!(rstats.items_received, 1);
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_errors() {
        let (sender, receiver) = stream_channel::<i32>(10);
        drop(receiver);
        let err = sender.send_data(1).await.unwrap_err();
        assert!(matches!(err, ResolveError::ChannelClosed));
    }
}
