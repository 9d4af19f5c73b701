use std::sync::Arc;

use crate::dispatch::{DispatchReport, DispatchSequencer, Navigator, WalletsReady};
use crate::pending::{PendingRequest, QueryParams, parse_pending_request};
use crate::prompt::UnlockPrompt;
use crate::secret::Secret;
use crate::unlock::{UnlockAttempt, UnlockError, UnlockGate, UnlockPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockPhase {
    Idle,
    Submitting,
    Unlocked,
    Dispatching,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Unlocked(DispatchReport),
    Rejected(UnlockError),
    /// Another screen sharing the gate has an attempt in flight.
    Busy,
}

/// State behind one unlock screen: the request it was opened for, the
/// password field, the last error shown, and the attempt phase.
pub struct UnlockFlow<P, N, R> {
    pending: Option<PendingRequest>,
    gate: Arc<UnlockGate<P>>,
    sequencer: DispatchSequencer<N>,
    ready: R,
    password: Secret,
    error: Option<UnlockError>,
    phase: UnlockPhase,
}

impl<P, N, R> UnlockFlow<P, N, R>
where
    P: UnlockPrimitive,
    N: Navigator,
    R: WalletsReady<P::Wallet>,
{
    /// Reads the page query once; the resulting request never changes for
    /// the life of the flow. `gate` may be shared with other unlock screens
    /// of the same extension so only one attempt runs across all of them.
    pub fn mount(
        params: &QueryParams,
        gate: Arc<UnlockGate<P>>,
        sequencer: DispatchSequencer<N>,
        ready: R,
    ) -> Self {
        let pending = parse_pending_request(params);
        tracing::debug!(
            pending = pending.as_ref().map(|request| request.kind().as_str()),
            "unlock screen mounted"
        );
        Self {
            pending,
            gate,
            sequencer,
            ready,
            password: Secret::default(),
            error: None,
            phase: UnlockPhase::Idle,
        }
    }

    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> UnlockPhase {
        self.phase
    }

    pub fn error(&self) -> Option<UnlockError> {
        self.error
    }

    pub fn error_message(&self) -> Option<&'static str> {
        self.error.map(UnlockError::user_message)
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn set_password(&mut self, value: impl Into<String>) {
        self.password.set(value);
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            UnlockPhase::Submitting | UnlockPhase::Dispatching
        ) || self.gate.is_busy()
    }

    pub fn can_submit(&self) -> bool {
        !self.is_busy() && !self.password.is_blank()
    }

    pub fn prompt(&self) -> UnlockPrompt {
        UnlockPrompt::new(
            self.pending.as_ref(),
            self.is_busy(),
            self.password.is_blank(),
            self.error,
        )
    }

    pub fn gate(&self) -> &UnlockGate<P> {
        &self.gate
    }

    /// One press of the unlock button. The password field is empty afterwards
    /// on every path.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let previous = self.phase;
        self.phase = UnlockPhase::Submitting;
        self.error = None;

        let result = match self.gate.unlock(&mut self.password).await {
            Ok(UnlockAttempt::Unlocked(result)) => result,
            Ok(UnlockAttempt::Busy) => {
                self.phase = previous;
                return SubmitOutcome::Busy;
            }
            Err(error) => {
                self.error = Some(error);
                self.phase = if error.is_validation() {
                    UnlockPhase::Idle
                } else {
                    UnlockPhase::Failed
                };
                return SubmitOutcome::Rejected(error);
            }
        };

        self.phase = UnlockPhase::Unlocked;
        if self.pending.is_some() {
            self.phase = UnlockPhase::Dispatching;
        }

        match self
            .sequencer
            .on_unlocked(result.into_wallets(), self.pending.as_ref(), &self.ready)
            .await
        {
            Ok(report) => {
                self.phase = UnlockPhase::Idle;
                SubmitOutcome::Unlocked(report)
            }
            Err(error) => {
                tracing::warn!(%error, "wallets-ready handler failed");
                self.error = Some(UnlockError::UnlockFailure);
                self.phase = UnlockPhase::Failed;
                SubmitOutcome::Rejected(UnlockError::UnlockFailure)
            }
        }
    }
}
