//! Unbounded, single-consumer event channel for one run.
//!
//! The producer side never blocks: publishing appends to an unbounded
//! channel. After the terminal event the producer appends exactly one
//! sentinel, which ends the stream for the consumer.
//!
//! There is one channel per run, so a run has at most one live consumer.
//! Serving several simultaneous viewers of the same run would need a
//! broadcast structure instead of this point-to-point channel.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Event;

/// Item carried by the channel
#[derive(Debug)]
enum LogEntry {
    Event(Event),
    End,
}

/// Errors observed by a consumer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Event sequence gap: expected {expected}, received {actual}")]
    SequenceGap { expected: u64, actual: u64 },

    #[error("Event stream closed without an end marker")]
    Truncated,
}

/// Producer half, owned by the task driving the run
#[derive(Debug)]
pub struct EventLog {
    run_id: Uuid,
    tx: UnboundedSender<LogEntry>,
    closed: AtomicBool,
}

impl EventLog {
    /// Create a channel for `run_id`
    pub fn channel(run_id: Uuid) -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Self {
            run_id,
            tx,
            closed: AtomicBool::new(false),
        };
        let stream = EventStream {
            run_id,
            rx,
            next_expected: 1,
            finished: false,
        };
        (log, stream)
    }

    /// Append an event. A dropped consumer is not an error: the run keeps
    /// going whether or not anyone is listening.
    pub fn publish(&self, event: Event) {
        debug_assert!(!self.is_closed(), "publish after end marker");
        if self.tx.send(LogEntry::Event(event)).is_err() {
            debug!(run_id = %self.run_id, "Event consumer gone, continuing without it");
        }
    }

    /// Append the end marker. Subsequent calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(LogEntry::End);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Consumer half: a pull-based sequence of events ending at the sentinel
#[derive(Debug)]
pub struct EventStream {
    run_id: Uuid,
    rx: UnboundedReceiver<LogEntry>,
    next_expected: u64,
    finished: bool,
}

impl EventStream {
    /// Next event, or `Ok(None)` once the end marker has been read
    pub async fn next(&mut self) -> Result<Option<Event>, StreamError> {
        if self.finished {
            return Ok(None);
        }

        match self.rx.recv().await {
            Some(LogEntry::Event(event)) => {
                if event.sequence_id != self.next_expected {
                    warn!(
                        run_id = %self.run_id,
                        expected = self.next_expected,
                        actual = event.sequence_id,
                        "Event sequence gap"
                    );
                    return Err(StreamError::SequenceGap {
                        expected: self.next_expected,
                        actual: event.sequence_id,
                    });
                }
                self.next_expected += 1;
                Ok(Some(event))
            }
            Some(LogEntry::End) => {
                self.finished = true;
                Ok(None)
            }
            None => {
                warn!(run_id = %self.run_id, "Event log dropped without an end marker");
                Err(StreamError::Truncated)
            }
        }
    }

    /// Drain every event up to the end marker
    pub async fn collect(mut self) -> Result<Vec<Event>, StreamError> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await? {
            events.push(event);
        }
        Ok(events)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventPayload;

    fn event(run_id: Uuid, seq: u64) -> Event {
        Event::new(seq, run_id, EventPayload::RunComplete { elapsed_ms: 0 })
    }

    #[tokio::test]
    async fn test_events_then_end_marker() {
        let run_id = Uuid::new_v4();
        let (log, stream) = EventLog::channel(run_id);

        log.publish(event(run_id, 1));
        log.publish(event(run_id, 2));
        log.close();
        log.close();

        let events = stream.collect().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].sequence_id, 2);
    }

    #[tokio::test]
    async fn test_end_is_sticky() {
        let run_id = Uuid::new_v4();
        let (log, mut stream) = EventLog::channel(run_id);
        log.close();

        assert_eq!(stream.next().await, Ok(None));
        assert_eq!(stream.next().await, Ok(None));
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn test_sequence_gap_is_error() {
        let run_id = Uuid::new_v4();
        let (log, mut stream) = EventLog::channel(run_id);

        log.publish(event(run_id, 1));
        log.publish(event(run_id, 3));

        assert!(stream.next().await.unwrap().is_some());
        assert_eq!(
            stream.next().await,
            Err(StreamError::SequenceGap {
                expected: 2,
                actual: 3
            })
        );
    }

    #[tokio::test]
    async fn test_dropped_producer_without_end_is_truncated() {
        let run_id = Uuid::new_v4();
        let (log, mut stream) = EventLog::channel(run_id);
        drop(log);

        assert_eq!(stream.next().await, Err(StreamError::Truncated));
    }

    #[tokio::test]
    async fn test_publish_survives_dropped_consumer() {
        let run_id = Uuid::new_v4();
        let (log, stream) = EventLog::channel(run_id);
        drop(stream);

        log.publish(event(run_id, 1));
        log.close();
        assert!(log.is_closed());
    }
}
