//! Ordered event streaming for long-running pipeline operations.
//!
//! Pipeline phases run external processes whose output must be observed
//! incrementally by an asynchronous caller. The bridge runs the producer on
//! its own execution context (a task, or a blocking thread for synchronous
//! producers) and relays every line through an unbounded ordered channel.
//! The bridge owns the terminal event: a stream always ends with exactly one
//! [`PipelineEvent::Done`] or [`PipelineEvent::Error`], sent after the
//! producer returns, and nothing is delivered past it.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// One observable event of a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// One line of output, relayed the moment it was produced.
    Log {
        /// The raw output line.
        line: String,
    },

    /// Terminal: the operation succeeded.
    Done {
        /// Operation-specific result payload.
        payload: serde_json::Value,
    },

    /// Terminal: the operation failed.
    Error {
        /// Failure description, including captured process output.
        message: String,
    },
}

impl PipelineEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Producer-side handle relaying log lines into a stream.
///
/// Sinks are cheap to clone; all clones feed the same ordered channel.
#[derive(Debug, Clone)]
pub struct LineSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl LineSink {
    /// Relay one log line.
    ///
    /// Returns `false` when the consumer has gone away. Producers driving
    /// external processes should treat that as a cancellation signal and
    /// stop the process rather than keep producing into the void.
    pub fn line(&self, line: impl Into<String>) -> bool {
        self.tx.send(PipelineEvent::Log { line: line.into() }).is_ok()
    }

    /// Whether the consuming stream has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of a single pipeline invocation.
///
/// Yields events in production order and returns `None` once the terminal
/// event has been observed, regardless of anything still queued behind it.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
    finished: bool,
}

impl EventStream {
    /// Receive the next event, or `None` after the terminal event.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(event) => {
                if event.is_terminal() {
                    self.finished = true;
                    self.rx.close();
                }
                Some(event)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the stream to completion, collecting every event.
    pub async fn collect(mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}

/// Run an asynchronous producer on its own task, streaming its output.
///
/// The producer reports lines through the [`LineSink`]; its return value
/// becomes the single terminal event. The stream is live immediately, before
/// the producer has made progress.
pub fn spawn<F, Fut, E>(producer: F) -> EventStream
where
    F: FnOnce(LineSink) -> Fut + Send + 'static,
    Fut: Future<Output = Result<serde_json::Value, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = LineSink { tx: tx.clone() };

    tokio::spawn(async move {
        // Run the producer on its own task so a panic still yields a
        // terminal event instead of a silently truncated stream.
        let joined = tokio::spawn(producer(sink)).await;
        let terminal = match joined {
            Ok(Ok(payload)) => PipelineEvent::Done { payload },
            Ok(Err(e)) => PipelineEvent::Error {
                message: e.to_string(),
            },
            Err(e) => PipelineEvent::Error {
                message: format!("producer task failed: {e}"),
            },
        };
        if tx.send(terminal).is_err() {
            debug!("event stream abandoned before terminal event");
        }
    });

    EventStream {
        rx,
        finished: false,
    }
}

/// Run a blocking producer off the cooperative scheduler, streaming its
/// output.
///
/// The closure executes on the blocking thread pool so sequential external
/// process calls never stall the async front end. A panicking producer
/// terminates its stream with an error event rather than losing the stream.
pub fn spawn_blocking<F, E>(producer: F) -> EventStream
where
    F: FnOnce(&LineSink) -> Result<serde_json::Value, E> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = LineSink { tx: tx.clone() };

    tokio::spawn(async move {
        let joined = tokio::task::spawn_blocking(move || producer(&sink)).await;
        let terminal = match joined {
            Ok(Ok(payload)) => PipelineEvent::Done { payload },
            Ok(Err(e)) => PipelineEvent::Error {
                message: e.to_string(),
            },
            Err(e) => PipelineEvent::Error {
                message: format!("producer task failed: {e}"),
            },
        };
        if tx.send(terminal).is_err() {
            debug!("event stream abandoned before terminal event");
        }
    });

    EventStream {
        rx,
        finished: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relays_lines_in_order_then_done() {
        let stream = spawn(|sink| async move {
            sink.line("first");
            sink.line("second");
            Ok::<_, String>(serde_json::json!({ "ok": true }))
        });

        let events = stream.collect().await;
        assert_eq!(
            events,
            vec![
                PipelineEvent::Log {
                    line: "first".to_owned()
                },
                PipelineEvent::Log {
                    line: "second".to_owned()
                },
                PipelineEvent::Done {
                    payload: serde_json::json!({ "ok": true })
                },
            ]
        );
    }

    #[tokio::test]
    async fn producer_error_becomes_terminal_error() {
        let stream = spawn(|sink| async move {
            sink.line("working");
            Err::<serde_json::Value, _>("exit status 1".to_owned())
        });

        let events = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            PipelineEvent::Error { message } if message == "exit status 1"
        ));
    }

    #[tokio::test]
    async fn nothing_after_terminal_event() {
        // A lingering sink clone keeps sending after the producer returned;
        // the consumer must never observe anything past the terminal event.
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = LineSink { tx: tx.clone() };
        sink.line("before");
        tx.send(PipelineEvent::Done {
            payload: serde_json::Value::Null,
        })
        .expect("send terminal");
        sink.line("after");

        let mut stream = EventStream {
            rx,
            finished: false,
        };
        assert!(matches!(
            stream.recv().await,
            Some(PipelineEvent::Log { .. })
        ));
        assert!(matches!(
            stream.recv().await,
            Some(PipelineEvent::Done { .. })
        ));
        assert!(stream.recv().await.is_none());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn abandoned_consumer_is_visible_to_producer() {
        let (notify_tx, notify_rx) = tokio::sync::oneshot::channel();
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();

        let stream = spawn(move |sink| async move {
            // Wait until the consumer has dropped the stream.
            notify_rx.await.expect("notified");
            let delivered = sink.line("into the void");
            result_tx
                .send((delivered, sink.is_abandoned()))
                .expect("report");
            Ok::<_, String>(serde_json::Value::Null)
        });

        drop(stream);
        notify_tx.send(()).expect("notify producer");

        let (delivered, abandoned) = result_rx.await.expect("producer result");
        assert!(!delivered);
        assert!(abandoned);
    }

    #[tokio::test]
    async fn blocking_producer_streams_and_completes() {
        let stream = spawn_blocking(|sink| {
            for i in 0..3 {
                sink.line(format!("line {i}"));
            }
            Ok::<_, String>(serde_json::json!("built"))
        });

        let events = stream.collect().await;
        assert_eq!(events.len(), 4);
        assert!(events[..3]
            .iter()
            .all(|e| matches!(e, PipelineEvent::Log { .. })));
        assert!(matches!(&events[3], PipelineEvent::Done { .. }));
    }

    #[tokio::test]
    async fn panicking_producer_terminates_with_error() {
        let stream = spawn_blocking(|_sink| -> Result<serde_json::Value, String> {
            panic!("producer blew up");
        });

        let events = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PipelineEvent::Error { .. }));
    }

    async fn exploding_producer(sink: LineSink) -> Result<serde_json::Value, String> {
        sink.line("about to fail");
        panic!("async producer blew up");
    }

    #[tokio::test]
    async fn panicking_async_producer_terminates_with_error() {
        let stream = spawn(exploding_producer);

        let events = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], PipelineEvent::Error { .. }));
    }
}
