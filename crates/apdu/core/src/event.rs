//! Per-reader event streams
//!
//! Each reader owns one sequential channel of [`ReaderEvent`]s. The reader
//! side holds a [`ReaderEventSender`]; the application consumes the matching
//! [`ReaderEventStream`]. There is no shared observer list, so events from
//! different readers never interleave on one stream.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};

/// Notifications raised by a single reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A card entered the field
    CardInserted {
        /// ATR of the inserted card
        atr: Bytes,
    },
    /// A card entered the field and answered the configured selection
    CardMatched {
        /// ATR of the inserted card
        atr: Bytes,
        /// Raw answer to the selection command, status word included
        selection: Bytes,
    },
    /// The card left the field
    CardRemoved,
    /// The reader itself is no longer reachable
    ReaderUnavailable,
}

/// Reader-side half of an event channel
#[derive(Debug, Clone)]
pub struct ReaderEventSender {
    reader: String,
    sender: Sender<ReaderEvent>,
    _alive: Arc<()>,
}

impl ReaderEventSender {
    /// Name of the reader this sender belongs to
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Publish an event, returning `false` once the stream has been dropped
    pub fn notify(&self, event: ReaderEvent) -> bool {
        tracing::trace!(reader = %self.reader, ?event, "Reader event");
        self.sender.send(event).is_ok()
    }
}

/// Application-side half of an event channel
#[derive(Debug)]
pub struct ReaderEventStream {
    reader: String,
    receiver: Receiver<ReaderEvent>,
    // Upgradable while any sender clone is alive
    senders: Weak<()>,
}

impl ReaderEventStream {
    /// Create the channel for one reader
    pub fn channel(reader: impl Into<String>) -> (ReaderEventSender, Self) {
        let reader = reader.into();
        let (sender, receiver) = unbounded();
        let alive = Arc::new(());
        let senders = Arc::downgrade(&alive);
        (
            ReaderEventSender {
                reader: reader.clone(),
                sender,
                _alive: alive,
            },
            Self {
                reader,
                receiver,
                senders,
            },
        )
    }

    /// Name of the reader this stream belongs to
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Take the next pending event without blocking
    pub fn try_next(&self) -> Option<ReaderEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event
    ///
    /// Returns `None` on timeout and once every sender is gone.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ReaderEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Whether the reader side has gone away and no event is left
    pub fn is_closed(&self) -> bool {
        self.receiver.is_empty() && self.senders.strong_count() == 0
    }
}

impl Iterator for ReaderEventStream {
    type Item = ReaderEvent;

    /// Blocks until the next event, ending when every sender is dropped
    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sender, stream) = ReaderEventStream::channel("Contactless 0");
        assert_eq!(sender.reader(), "Contactless 0");

        assert!(sender.notify(ReaderEvent::CardInserted {
            atr: Bytes::from_static(&[0x3B, 0x8F, 0x80, 0x01]),
        }));
        assert!(sender.notify(ReaderEvent::CardRemoved));
        drop(sender);

        let events: Vec<_> = stream.collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ReaderEvent::CardInserted { .. }));
        assert_eq!(events[1], ReaderEvent::CardRemoved);
    }

    #[test]
    fn test_streams_are_independent() {
        let (first, first_stream) = ReaderEventStream::channel("A");
        let (_second, second_stream) = ReaderEventStream::channel("B");

        first.notify(ReaderEvent::ReaderUnavailable);
        assert_eq!(first_stream.try_next(), Some(ReaderEvent::ReaderUnavailable));
        assert_eq!(second_stream.try_next(), None);
        assert_eq!(
            second_stream.next_timeout(Duration::from_millis(5)),
            None
        );
        assert!(!second_stream.is_closed());
    }

    #[test]
    fn test_closed_once_senders_gone_and_drained() {
        let (sender, stream) = ReaderEventStream::channel("A");
        let clone = sender.clone();
        sender.notify(ReaderEvent::CardRemoved);
        drop(sender);
        assert!(!stream.is_closed());

        drop(clone);
        assert!(!stream.is_closed());
        assert_eq!(stream.try_next(), Some(ReaderEvent::CardRemoved));
        assert!(stream.is_closed());
    }

    #[test]
    fn test_notify_after_stream_dropped() {
        let (sender, stream) = ReaderEventStream::channel("A");
        drop(stream);
        assert!(!sender.notify(ReaderEvent::CardRemoved));
    }
}
