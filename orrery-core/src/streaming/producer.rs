//! Steps a simulation and feeds frames into a bounded channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::StreamingError;
use crate::config::SimulationConfig;
use crate::frame::Frame;
use crate::simulation::{Simulation, SimulationError};

/// One item on the producer channel.
///
/// Frames arrive in step order; `Completed` is always the final item, so a
/// single `recv` tells the consumer both "next frame" and "no more frames"
/// without racing two channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerEvent {
    Frame(Frame),
    Completed { steps: u64 },
}

/// How a producer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerOutcome {
    /// Every configured step ran and the completion event was delivered.
    Completed { steps: u64 },
    /// The consumer went away first.
    Cancelled { steps: u64 },
}

impl ProducerOutcome {
    pub fn steps(self) -> u64 {
        match self {
            ProducerOutcome::Completed { steps } | ProducerOutcome::Cancelled { steps } => steps,
        }
    }
}

/// Drives one simulation for a fixed or unbounded number of steps.
#[derive(Debug, Clone)]
pub struct FrameProducer {
    simulation: Simulation,
    step_count: Option<u64>,
    dt: f64,
}

impl FrameProducer {
    /// `step_count` of `None` runs until the consumer disconnects.
    ///
    /// # Errors
    /// - `SimulationError::InvalidTimeStep` - `dt` is not finite and positive
    /// - `SimulationError::EmptyConfiguration` - `simulation` has no bodies
    pub fn new(
        simulation: Simulation,
        step_count: Option<u64>,
        dt: f64,
    ) -> Result<Self, SimulationError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimulationError::InvalidTimeStep { dt });
        }
        if simulation.is_empty() {
            return Err(SimulationError::EmptyConfiguration);
        }
        Ok(Self {
            simulation,
            step_count,
            dt,
        })
    }

    /// Builds the simulation described by `config`.
    ///
    /// # Errors
    /// - `SimulationError` - Invalid bodies or time step
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        let simulation = Simulation::from_specs(&config.bodies, config.force_model)?;
        Self::new(simulation, config.step_count, config.dt)
    }

    pub fn step_count(&self) -> Option<u64> {
        self.step_count
    }

    /// Starts the producer on a blocking worker thread.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, channel_capacity: usize) -> ProducerHandle {
        let (sender, receiver) = mpsc::channel(channel_capacity.max(1));
        let frames_sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&frames_sent);

        let task = tokio::task::spawn_blocking(move || self.run(sender, &counter));

        ProducerHandle {
            receiver: Some(receiver),
            task,
            frames_sent,
            completed: false,
        }
    }

    /// Runs to completion on the current thread, blocking whenever the
    /// channel is full.
    ///
    /// Must not be called from an async context.
    pub fn run(mut self, sender: mpsc::Sender<ProducerEvent>, frames_sent: &AtomicU64) -> ProducerOutcome {
        tracing::debug!(
            bodies = self.simulation.len(),
            steps = ?self.step_count,
            dt = self.dt,
            force_model = %self.simulation.force_model(),
            "Frame producer started"
        );

        let mut reported_degenerate = false;
        loop {
            let steps = self.simulation.steps_taken();
            if self.step_count.is_some_and(|limit| steps >= limit) {
                break;
            }

            self.simulation.step(self.dt);
            let frame = self.simulation.snapshot_frame();

            if frame.is_degenerate() && !reported_degenerate {
                reported_degenerate = true;
                tracing::warn!(
                    step = steps + 1,
                    "Simulation produced non-finite positions; frames are flagged degenerate"
                );
            }

            if sender.blocking_send(ProducerEvent::Frame(frame)).is_err() {
                tracing::debug!(steps = steps + 1, "Frame consumer gone, producer stopping");
                return ProducerOutcome::Cancelled { steps: steps + 1 };
            }
            frames_sent.fetch_add(1, Ordering::Relaxed);
        }

        let steps = self.simulation.steps_taken();
        if sender
            .blocking_send(ProducerEvent::Completed { steps })
            .is_err()
        {
            tracing::debug!(steps, "Frame consumer gone before completion was delivered");
            return ProducerOutcome::Cancelled { steps };
        }

        tracing::debug!(steps, "Frame producer completed");
        ProducerOutcome::Completed { steps }
    }
}

/// Consumer end of a spawned producer.
///
/// Owns the receiving half of the channel and the producer's task, so that
/// [`ProducerHandle::shutdown`] can release and join it deterministically.
#[derive(Debug)]
pub struct ProducerHandle {
    receiver: Option<mpsc::Receiver<ProducerEvent>>,
    task: JoinHandle<ProducerOutcome>,
    frames_sent: Arc<AtomicU64>,
    completed: bool,
}

impl ProducerHandle {
    /// Wraps an arbitrary channel and task, for driving sessions with
    /// misbehaving producers.
    #[cfg(test)]
    pub(crate) fn from_parts(
        receiver: mpsc::Receiver<ProducerEvent>,
        task: JoinHandle<ProducerOutcome>,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            task,
            frames_sent: Arc::new(AtomicU64::new(0)),
            completed: false,
        }
    }

    /// Waits for the next frame or the completion event.
    ///
    /// Returns `None` after completion has been observed, or if the producer
    /// stopped without completing. Completion is returned at most once and
    /// nothing is read from the channel afterwards.
    pub async fn next_event(&mut self) -> Option<ProducerEvent> {
        let receiver = self.receiver.as_mut()?;
        match receiver.recv().await {
            Some(ProducerEvent::Completed { steps }) => {
                self.completed = true;
                self.receiver = None;
                Some(ProducerEvent::Completed { steps })
            }
            Some(event) => Some(event),
            None => {
                self.receiver = None;
                None
            }
        }
    }

    /// True once the completion event has been returned.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Frames the producer has successfully queued so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Frames currently waiting in the channel.
    pub fn queued(&self) -> usize {
        self.receiver.as_ref().map_or(0, |receiver| receiver.len())
    }

    /// Stops consuming and waits for the producer to exit.
    ///
    /// Dropping the receiver fails the producer's next send, so a producer
    /// parked on a full channel wakes up and returns.
    ///
    /// # Errors
    /// - `StreamingError::ProducerFault` - The producer task panicked
    pub async fn shutdown(mut self) -> Result<ProducerOutcome, StreamingError> {
        self.receiver = None;
        self.task
            .await
            .map_err(|err| StreamingError::ProducerFault {
                reason: err.to_string(),
            })
    }
}
