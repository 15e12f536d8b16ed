//! Polling state machine for one in-flight evidence item.
//!
//! ```text
//! Idle ──start──▶ Polling { subscription, timer, on_complete }
//!  ▲                 │
//!  ├──terminal───────┤   (timer aborted, callback fired once)
//!  └──cancel─────────┘   (timer aborted, late responses discarded)
//! ```
//!
//! The timer is a spawned task that sleeps one interval, issues exactly one
//! status request, waits for it, and only then schedules the next tick. Its
//! responses travel back over a channel tagged with the subscription number;
//! the owner decides in [`EvidenceTracker::accept`] whether they still apply.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::adapters::CaseRepository;
use crate::domain::{CaseId, EvidenceId, EvidenceStatus, POLL_EXHAUSTED_STATE};

/// Default delay between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default cap on polls before giving up (30 minutes at the default interval)
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 360;

/// Invoked once when tracked evidence reaches a terminal state
pub type CompletionCallback = Box<dyn FnOnce(&EvidenceStatus) + Send + 'static>;

/// Errors from starting a subscription
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Already tracking evidence {evidence_id}")]
    Busy { evidence_id: EvidenceId },
}

/// Polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,

    /// `None` polls until the backend reports a terminal state
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_POLL_ATTEMPTS),
        }
    }
}

/// The evidence item being followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Increases with every `start`; stale responses carry an old number
    pub number: u64,
    pub case_id: CaseId,
    pub evidence_id: EvidenceId,
}

/// One response from the poll task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEvent {
    pub subscription: u64,
    pub attempt: u32,
    pub status: EvidenceStatus,
}

/// What the tracker made of a poll response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still running; subscription stays active
    Progress {
        subscription: Subscription,
        attempt: u32,
        status: EvidenceStatus,
    },

    /// Terminal state reached; tracker is idle again
    Finished {
        subscription: Subscription,
        attempt: u32,
        status: EvidenceStatus,
    },

    /// Response belonged to a subscription that is no longer active
    Discarded,
}

enum TrackerState {
    Idle,
    Polling {
        subscription: Subscription,
        timer: JoinHandle<()>,
        on_complete: CompletionCallback,
    },
}

/// Follows at most one evidence item at a time
pub struct EvidenceTracker {
    repository: Arc<dyn CaseRepository>,
    settings: PollSettings,
    state: TrackerState,
    next_number: u64,
    events_tx: mpsc::UnboundedSender<PollEvent>,
    events_rx: mpsc::UnboundedReceiver<PollEvent>,
}

impl EvidenceTracker {
    pub fn new(repository: Arc<dyn CaseRepository>, settings: PollSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            repository,
            settings,
            state: TrackerState::Idle,
            next_number: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// True while a subscription is active; uploads are refused meanwhile.
    ///
    /// Responses that already arrived are applied first, so a finished
    /// subscription reads as idle even if nobody awaited [`Self::next`].
    pub fn is_processing(&mut self) -> bool {
        self.drain();
        self.is_polling()
    }

    /// The active subscription, after applying responses that already arrived
    pub fn active(&mut self) -> Option<&Subscription> {
        self.drain();
        match &self.state {
            TrackerState::Polling { subscription, .. } => Some(subscription),
            TrackerState::Idle => None,
        }
    }

    fn is_polling(&self) -> bool {
        matches!(self.state, TrackerState::Polling { .. })
    }

    /// Apply every response already queued, without waiting.
    ///
    /// A terminal response finishes the subscription here: the timer is
    /// aborted and the completion callback fires. Returns the outcomes that
    /// applied to the active subscription, in arrival order.
    pub fn drain(&mut self) -> Vec<PollOutcome> {
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            match self.accept(event) {
                PollOutcome::Discarded => {}
                outcome => applied.push(outcome),
            }
        }
        applied
    }

    /// Begin polling `evidence_id`. Must be called within a tokio runtime.
    pub fn start<F>(
        &mut self,
        case_id: CaseId,
        evidence_id: EvidenceId,
        on_complete: F,
    ) -> Result<Subscription, TrackerError>
    where
        F: FnOnce(&EvidenceStatus) + Send + 'static,
    {
        if let Some(active) = self.active() {
            return Err(TrackerError::Busy {
                evidence_id: active.evidence_id.clone(),
            });
        }

        self.next_number += 1;
        let subscription = Subscription {
            number: self.next_number,
            case_id,
            evidence_id,
        };

        let timer = tokio::spawn(poll_until_terminal(
            Arc::clone(&self.repository),
            subscription.clone(),
            self.settings,
            self.events_tx.clone(),
        ));

        info!(
            "Tracking evidence {} of case {} every {:?}",
            subscription.evidence_id, subscription.case_id, self.settings.interval
        );

        self.state = TrackerState::Polling {
            subscription: subscription.clone(),
            timer,
            on_complete: Box::new(on_complete),
        };

        Ok(subscription)
    }

    /// Tear down the active subscription without waiting for an in-flight poll.
    ///
    /// The completion callback is dropped unfired.
    pub fn cancel(&mut self) -> Option<Subscription> {
        match std::mem::replace(&mut self.state, TrackerState::Idle) {
            TrackerState::Polling {
                subscription, timer, ..
            } => {
                timer.abort();
                info!("Stopped tracking evidence {}", subscription.evidence_id);
                Some(subscription)
            }
            TrackerState::Idle => None,
        }
    }

    /// Decide whether a poll response applies to the active subscription
    pub fn accept(&mut self, event: PollEvent) -> PollOutcome {
        let subscription = match &self.state {
            TrackerState::Polling { subscription, .. }
                if subscription.number == event.subscription =>
            {
                subscription.clone()
            }
            _ => {
                debug!(
                    "Discarding response from stale subscription #{}",
                    event.subscription
                );
                return PollOutcome::Discarded;
            }
        };

        if !event.status.is_terminal() {
            return PollOutcome::Progress {
                subscription,
                attempt: event.attempt,
                status: event.status,
            };
        }

        if let TrackerState::Polling {
            timer, on_complete, ..
        } = std::mem::replace(&mut self.state, TrackerState::Idle)
        {
            timer.abort();
            on_complete(&event.status);
        }

        info!(
            "Evidence {} finished as {} after {} polls",
            subscription.evidence_id, event.status.state, event.attempt
        );

        PollOutcome::Finished {
            subscription,
            attempt: event.attempt,
            status: event.status,
        }
    }

    /// Wait for the next response that applies to the active subscription.
    ///
    /// Returns `None` once nothing is being tracked.
    pub async fn next(&mut self) -> Option<PollOutcome> {
        loop {
            if !self.is_polling() {
                self.drain();
                return None;
            }

            let event = self.events_rx.recv().await?;
            match self.accept(event) {
                PollOutcome::Discarded => continue,
                outcome => return Some(outcome),
            }
        }
    }
}

impl Drop for EvidenceTracker {
    fn drop(&mut self) {
        if let TrackerState::Polling { timer, .. } = &self.state {
            timer.abort();
        }
    }
}

/// Body of the timer task: one outstanding request at a time
async fn poll_until_terminal(
    repository: Arc<dyn CaseRepository>,
    subscription: Subscription,
    settings: PollSettings,
    events: mpsc::UnboundedSender<PollEvent>,
) {
    let mut attempt = 0u32;

    loop {
        sleep(settings.interval).await;
        attempt += 1;

        let mut status = repository
            .fetch_evidence_status(&subscription.evidence_id)
            .await;

        debug!(
            "Poll #{} for evidence {}: {}",
            attempt, subscription.evidence_id, status.state
        );

        if !status.is_terminal() && settings.max_attempts.is_some_and(|max| attempt >= max) {
            warn!(
                "Evidence {} still {} after {} polls, giving up",
                subscription.evidence_id, status.state, attempt
            );
            status = EvidenceStatus::failed(POLL_EXHAUSTED_STATE);
        }

        let terminal = status.is_terminal();
        let event = PollEvent {
            subscription: subscription.number,
            attempt,
            status,
        };

        if events.send(event).is_err() || terminal {
            break;
        }
    }
}
