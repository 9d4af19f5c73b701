use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::secret::{ClearOnDrop, Secret};

/// Failures reported by the wallet decryption layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("unlock failed: {0}")]
    Failure(String),
}

/// Errors surfaced to the unlock form. The display text is exactly what the
/// user sees; primitive diagnostics are never carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnlockError {
    #[error("Password is required")]
    EmptyPassword,
    #[error("Invalid password")]
    InvalidCredential,
    #[error("Failed to unlock wallet")]
    UnlockFailure,
}

impl UnlockError {
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::EmptyPassword => "Password is required",
            Self::InvalidCredential => "Invalid password",
            Self::UnlockFailure => "Failed to unlock wallet",
        }
    }

    #[must_use]
    pub fn is_validation(self) -> bool {
        matches!(self, Self::EmptyPassword)
    }
}

impl From<PrimitiveError> for UnlockError {
    fn from(error: PrimitiveError) -> Self {
        match error {
            PrimitiveError::InvalidCredential => Self::InvalidCredential,
            PrimitiveError::Failure(_) => Self::UnlockFailure,
        }
    }
}

/// Password-based wallet decryption, owned by the keystore layer.
#[async_trait]
pub trait UnlockPrimitive: Send + Sync {
    type Wallet: Send;

    async fn unlock_wallets(&self, secret: &str) -> Result<Vec<Self::Wallet>, PrimitiveError>;
}

#[async_trait]
impl<P> UnlockPrimitive for Arc<P>
where
    P: UnlockPrimitive + ?Sized,
{
    type Wallet = P::Wallet;

    async fn unlock_wallets(&self, secret: &str) -> Result<Vec<Self::Wallet>, PrimitiveError> {
        (**self).unlock_wallets(secret).await
    }
}

/// Wallets produced by one successful unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockResult<W> {
    wallets: Vec<W>,
}

impl<W> UnlockResult<W> {
    #[must_use]
    pub fn wallets(&self) -> &[W] {
        &self.wallets
    }

    #[must_use]
    pub fn into_wallets(self) -> Vec<W> {
        self.wallets
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockAttempt<W> {
    Unlocked(UnlockResult<W>),
    /// Another attempt was already in flight; this one was ignored.
    Busy,
}

/// Validates the password, delegates to the primitive, and classifies the
/// outcome. At most one attempt runs at a time per gate.
pub struct UnlockGate<P> {
    primitive: P,
    in_flight: AtomicBool,
}

impl<P: UnlockPrimitive> UnlockGate<P> {
    #[must_use]
    pub fn new(primitive: P) -> Self {
        Self {
            primitive,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one unlock attempt. `secret` is empty when this returns, whatever
    /// the outcome, and also if the returned future is dropped early.
    pub async fn unlock(
        &self,
        secret: &mut Secret,
    ) -> Result<UnlockAttempt<P::Wallet>, UnlockError> {
        let secret = ClearOnDrop(secret);

        if secret.0.is_blank() {
            return Err(UnlockError::EmptyPassword);
        }

        let Some(_flight) = InFlight::acquire(&self.in_flight) else {
            tracing::debug!("unlock submit ignored while another attempt is in flight");
            return Ok(UnlockAttempt::Busy);
        };

        match self.primitive.unlock_wallets(secret.0.expose()).await {
            Ok(wallets) => {
                tracing::info!(wallets = wallets.len(), "wallet unlocked");
                Ok(UnlockAttempt::Unlocked(UnlockResult { wallets }))
            }
            Err(error) => {
                match &error {
                    PrimitiveError::InvalidCredential => {
                        tracing::warn!("unlock rejected: invalid credential");
                    }
                    PrimitiveError::Failure(detail) => {
                        tracing::warn!(%detail, "unlock primitive failed");
                    }
                }
                Err(error.into())
            }
        }
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingPrimitive {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UnlockPrimitive for RecordingPrimitive {
        type Wallet = &'static str;

        async fn unlock_wallets(&self, secret: &str) -> Result<Vec<Self::Wallet>, PrimitiveError> {
            self.seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(secret.to_string());
            match secret {
                "correct-pw" => Ok(vec!["wallet-a", "wallet-b"]),
                "wrong-pw" => Err(PrimitiveError::InvalidCredential),
                _ => Err(PrimitiveError::Failure(
                    "keystore record is corrupt at offset 12".to_string(),
                )),
            }
        }
    }

    impl RecordingPrimitive {
        fn calls(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }
    }

    struct BlockingPrimitive {
        release: Notify,
    }

    #[async_trait]
    impl UnlockPrimitive for BlockingPrimitive {
        type Wallet = u8;

        async fn unlock_wallets(&self, _secret: &str) -> Result<Vec<Self::Wallet>, PrimitiveError> {
            self.release.notified().await;
            Ok(vec![7])
        }
    }

    #[tokio::test]
    async fn correct_password_returns_wallets_and_clears_secret() {
        let gate = UnlockGate::new(RecordingPrimitive::default());
        let mut secret = Secret::new("correct-pw");

        let attempt = gate.unlock(&mut secret).await.expect("unlock");
        let UnlockAttempt::Unlocked(result) = attempt else {
            panic!("expected unlocked attempt");
        };
        assert_eq!(result.wallets(), ["wallet-a", "wallet-b"]);
        assert!(secret.is_empty());
        assert_eq!(gate.primitive().calls(), ["correct-pw"]);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn wrong_password_maps_to_invalid_password_message() {
        let gate = UnlockGate::new(RecordingPrimitive::default());
        let mut secret = Secret::new("wrong-pw");

        let error = gate.unlock(&mut secret).await.expect_err("rejected");
        assert_eq!(error, UnlockError::InvalidCredential);
        assert_eq!(error.to_string(), "Invalid password");
        assert!(secret.is_empty());
    }

    #[tokio::test]
    async fn other_failures_hide_primitive_detail() {
        let gate = UnlockGate::new(RecordingPrimitive::default());
        let mut secret = Secret::new("anything-else");

        let error = gate.unlock(&mut secret).await.expect_err("failed");
        assert_eq!(error, UnlockError::UnlockFailure);
        assert_eq!(error.user_message(), "Failed to unlock wallet");
        assert!(!error.to_string().contains("corrupt"));
        assert!(secret.is_empty());
    }

    #[tokio::test]
    async fn blank_passwords_never_reach_the_primitive() {
        let gate = UnlockGate::new(RecordingPrimitive::default());
        for raw in ["", " ", "\t\n  "] {
            let mut secret = Secret::new(raw);
            let error = gate.unlock(&mut secret).await.expect_err("blank");
            assert_eq!(error, UnlockError::EmptyPassword);
            assert_eq!(error.to_string(), "Password is required");
            assert!(error.is_validation());
            assert!(secret.is_empty());
        }
        assert!(gate.primitive().calls().is_empty());
    }

    #[tokio::test]
    async fn password_is_passed_through_untrimmed() {
        let gate = UnlockGate::new(RecordingPrimitive::default());
        let mut secret = Secret::new(" correct-pw ");
        let _ = gate.unlock(&mut secret).await;
        assert_eq!(gate.primitive().calls(), [" correct-pw "]);
    }

    #[tokio::test]
    async fn concurrent_submit_is_reported_busy() {
        let gate = UnlockGate::new(BlockingPrimitive {
            release: Notify::new(),
        });
        let mut first = Secret::new("correct-pw");
        let mut second = Secret::new("correct-pw");

        let (first_attempt, second_attempt) = tokio::join!(gate.unlock(&mut first), async {
            let attempt = gate.unlock(&mut second).await;
            gate.primitive().release.notify_one();
            attempt
        });

        assert!(matches!(first_attempt, Ok(UnlockAttempt::Unlocked(_))));
        assert_eq!(second_attempt, Ok(UnlockAttempt::Busy));
        assert!(first.is_empty());
        assert!(second.is_empty());
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn dropped_attempt_clears_secret_and_releases_gate() {
        let gate = UnlockGate::new(BlockingPrimitive {
            release: Notify::new(),
        });
        let mut secret = Secret::new("correct-pw");
        {
            let attempt = gate.unlock(&mut secret);
            tokio::pin!(attempt);
            let polled = tokio::time::timeout(std::time::Duration::from_millis(5), &mut attempt);
            assert!(polled.await.is_err());
            assert!(gate.is_busy());
        }
        assert!(secret.is_empty());
        assert!(!gate.is_busy());
    }
}
