//! Per-connection protocol loop.
//!
//! ```text
//! AwaitingClientPing -> BatchCollecting -> BatchSending -> AwaitingClientPing
//!          |                  |                 |
//!          +------------------+-----------------+--> Closed(reason)
//! ```

use tracing::Instrument;
use uuid::Uuid;

use super::producer::{FrameProducer, ProducerEvent, ProducerHandle};
use super::transport::FrameTransport;
use super::StreamingError;
use crate::config::{SimulationConfig, StreamingConfig};
use crate::frame::{Frame, encode_batch};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its side of the connection.
    ClientDisconnected,
    /// Reading a trigger or writing a batch failed.
    TransportError,
    /// The producer delivered its completion event.
    SimulationEnded,
    /// The producer stopped without completing.
    ProducerFault,
    /// A batch could not be encoded.
    SerializationError,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CloseReason::ClientDisconnected => "client disconnected",
            CloseReason::TransportError => "transport error",
            CloseReason::SimulationEnded => "simulation ended",
            CloseReason::ProducerFault => "producer fault",
            CloseReason::SerializationError => "serialization error",
        };
        f.write_str(text)
    }
}

/// Summary returned when a session finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub reason: CloseReason,
    pub batches_sent: u64,
    pub frames_sent: u64,
}

enum SessionState {
    AwaitingClientPing,
    BatchCollecting,
    BatchSending {
        frames: Vec<Frame>,
        then_close: Option<CloseReason>,
    },
    Closed(CloseReason),
}

/// Streams one producer's frames to one client.
pub struct StreamSession<T: FrameTransport> {
    id: Uuid,
    transport: T,
    producer: ProducerHandle,
    config: StreamingConfig,
    batches_sent: u64,
    frames_sent: u64,
}

impl<T: FrameTransport> StreamSession<T> {
    /// Wraps an already running producer.
    pub fn new(transport: T, producer: ProducerHandle, config: StreamingConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            producer,
            config,
            batches_sent: 0,
            frames_sent: 0,
        }
    }

    /// Builds and spawns a producer for `simulation`, then wraps it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `StreamingError::Configuration` - Zero batch size or channel capacity
    /// - `StreamingError::Simulation` - Invalid bodies or time step
    pub fn start(
        transport: T,
        simulation: &SimulationConfig,
        streaming: &StreamingConfig,
    ) -> Result<Self, StreamingError> {
        streaming
            .validate()
            .map_err(|reason| StreamingError::Configuration { reason })?;
        let producer = FrameProducer::from_config(simulation)?.spawn(streaming.channel_capacity);
        Ok(Self::new(transport, producer, streaming.clone()))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the protocol loop until the session closes, then releases the
    /// transport and joins the producer.
    pub async fn run(self) -> SessionReport {
        let span = tracing::info_span!("stream_session", session_id = %self.id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> SessionReport {
        tracing::info!(
            batch_size = self.config.batch_size,
            channel_capacity = self.config.channel_capacity,
            "Session started"
        );

        let mut state = SessionState::AwaitingClientPing;
        let reason = loop {
            state = match state {
                SessionState::AwaitingClientPing => self.await_client_ping().await,
                SessionState::BatchCollecting => self.collect_batch().await,
                SessionState::BatchSending { frames, then_close } => {
                    self.send_batch(frames, then_close).await
                }
                SessionState::Closed(reason) => break reason,
            };
        };

        self.teardown(reason).await
    }

    async fn await_client_ping(&mut self) -> SessionState {
        match self.transport.read_message().await {
            Ok(Some(message)) => {
                tracing::trace!(bytes = message.len(), "Client requested next batch");
                SessionState::BatchCollecting
            }
            Ok(None) => SessionState::Closed(CloseReason::ClientDisconnected),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read client message");
                SessionState::Closed(CloseReason::TransportError)
            }
        }
    }

    async fn collect_batch(&mut self) -> SessionState {
        let batch_size = self.config.batch_size;
        let mut frames = Vec::with_capacity(batch_size);

        while frames.len() < batch_size {
            match self.producer.next_event().await {
                Some(ProducerEvent::Frame(frame)) => frames.push(frame),
                Some(ProducerEvent::Completed { steps }) => {
                    tracing::info!(steps, pending = frames.len(), "Simulation ended");
                    if self.config.flush_trailing_batch && !frames.is_empty() {
                        return SessionState::BatchSending {
                            frames,
                            then_close: Some(CloseReason::SimulationEnded),
                        };
                    }
                    return SessionState::Closed(CloseReason::SimulationEnded);
                }
                None => {
                    tracing::error!(
                        pending = frames.len(),
                        "Frame producer stopped without completing"
                    );
                    return SessionState::Closed(CloseReason::ProducerFault);
                }
            }
        }

        SessionState::BatchSending {
            frames,
            then_close: None,
        }
    }

    async fn send_batch(
        &mut self,
        frames: Vec<Frame>,
        then_close: Option<CloseReason>,
    ) -> SessionState {
        let message = match encode_batch(&frames) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode frame batch");
                return SessionState::Closed(CloseReason::SerializationError);
            }
        };

        if let Err(err) = self.transport.write_message(message).await {
            tracing::warn!(error = %err, "Failed to write frame batch");
            return SessionState::Closed(CloseReason::TransportError);
        }

        self.batches_sent += 1;
        self.frames_sent += frames.len() as u64;
        tracing::debug!(
            batch_len = frames.len(),
            batches_sent = self.batches_sent,
            "Sent frame batch"
        );

        match then_close {
            Some(reason) => SessionState::Closed(reason),
            None => SessionState::AwaitingClientPing,
        }
    }

    async fn teardown(mut self, mut reason: CloseReason) -> SessionReport {
        if let Err(err) = self.transport.close().await {
            tracing::debug!(error = %err, "Transport close failed");
        }

        match self.producer.shutdown().await {
            Ok(outcome) => {
                tracing::debug!(steps = outcome.steps(), "Frame producer joined");
            }
            Err(err) => {
                tracing::error!(error = %err, "Frame producer failed");
                reason = CloseReason::ProducerFault;
            }
        }

        tracing::info!(
            %reason,
            batches_sent = self.batches_sent,
            frames_sent = self.frames_sent,
            "Session closed"
        );

        SessionReport {
            session_id: self.id,
            reason,
            batches_sent: self.batches_sent,
            frames_sent: self.frames_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::simulation::presets;
    use crate::streaming::{MemoryTransport, ProducerOutcome};

    fn configs(steps: u64, batch_size: usize) -> (SimulationConfig, StreamingConfig) {
        let simulation = SimulationConfig {
            bodies: presets::two_body(),
            step_count: Some(steps),
            ..SimulationConfig::default()
        };
        let streaming = StreamingConfig {
            batch_size,
            ..StreamingConfig::default()
        };
        (simulation, streaming)
    }

    #[tokio::test]
    async fn test_sends_one_batch_per_ping() {
        let (simulation, streaming) = configs(100, 10);
        let (transport, mut client) = MemoryTransport::pair();
        let session = StreamSession::start(transport, &simulation, &streaming).unwrap();
        let task = tokio::spawn(session.run());

        for _ in 0..3 {
            assert!(client.ping());
            let message = client.next_message().await.expect("batch");
            let frames = crate::frame::decode_batch(&message).unwrap();
            assert_eq!(frames.len(), 10);
        }

        client.disconnect();
        let report = task.await.unwrap();
        assert_eq!(report.reason, CloseReason::ClientDisconnected);
        assert_eq!(report.batches_sent, 3);
        assert_eq!(report.frames_sent, 30);
    }

    #[tokio::test]
    async fn test_read_failure_closes_with_transport_error() {
        let (simulation, streaming) = configs(100, 10);
        let (transport, client) = MemoryTransport::pair();
        let session = StreamSession::start(transport, &simulation, &streaming).unwrap();

        client.inject_read_error("connection reset");
        let report = session.run().await;

        assert_eq!(report.reason, CloseReason::TransportError);
        assert_eq!(report.batches_sent, 0);
    }

    #[tokio::test]
    async fn test_write_failure_closes_with_transport_error() {
        let (simulation, streaming) = configs(100, 10);
        let (transport, mut client) = MemoryTransport::pair();
        let session = StreamSession::start(transport, &simulation, &streaming).unwrap();

        client.drop_downlink();
        client.ping();
        let report = session.run().await;

        assert_eq!(report.reason, CloseReason::TransportError);
        assert_eq!(report.batches_sent, 0);
    }

    #[test]
    fn test_start_rejects_zero_batch_size() {
        let (simulation, streaming) = configs(10, 0);
        let (transport, _client) = MemoryTransport::pair();

        assert!(matches!(
            StreamSession::start(transport, &simulation, &streaming),
            Err(StreamingError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_vanished_producer_closes_with_producer_fault() {
        let (sender, receiver) = mpsc::channel(4);
        let task = tokio::task::spawn_blocking(move || {
            let frame = Frame::new(vec![1], vec![0.0, 0.0, 0.0]).unwrap();
            let _ = sender.blocking_send(ProducerEvent::Frame(frame));
            ProducerOutcome::Cancelled { steps: 1 }
        });
        let (transport, client) = MemoryTransport::pair();
        let session = StreamSession::new(
            transport,
            ProducerHandle::from_parts(receiver, task),
            StreamingConfig {
                batch_size: 10,
                ..StreamingConfig::default()
            },
        );

        client.ping();
        let report = session.run().await;

        assert_eq!(report.reason, CloseReason::ProducerFault);
        assert_eq!(report.batches_sent, 0);
        assert!(client.saw_close());
    }

    #[tokio::test]
    async fn test_panicked_producer_closes_with_producer_fault() {
        let (sender, receiver) = mpsc::channel::<ProducerEvent>(4);
        let task = tokio::task::spawn_blocking(move || -> ProducerOutcome {
            let _sender = sender;
            panic!("integrator failure");
        });
        let (transport, mut client) = MemoryTransport::pair();
        let session = StreamSession::new(
            transport,
            ProducerHandle::from_parts(receiver, task),
            StreamingConfig::default(),
        );

        client.ping();
        let report = session.run().await;

        assert_eq!(report.reason, CloseReason::ProducerFault);
        assert!(client.saw_close());
        assert_eq!(client.next_message().await, None);
    }

    #[tokio::test]
    async fn test_producer_panic_overrides_close_reason_at_teardown() {
        let (sender, receiver) = mpsc::channel::<ProducerEvent>(4);
        let task = tokio::task::spawn_blocking(move || -> ProducerOutcome {
            let _sender = sender;
            panic!("integrator failure");
        });
        let (transport, mut client) = MemoryTransport::pair();
        let session = StreamSession::new(
            transport,
            ProducerHandle::from_parts(receiver, task),
            StreamingConfig::default(),
        );

        client.disconnect();
        let report = session.run().await;

        assert_eq!(report.reason, CloseReason::ProducerFault);
        assert!(client.saw_close());
    }
}
