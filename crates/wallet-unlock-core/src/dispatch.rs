//! Post-unlock hand-off: wallets to the app, then one navigation to the
//! approval page of the interrupted dApp request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::UnlockConfig;
use crate::pending::{PendingRequest, RequestKind};

/// Time given to the wallets-ready handler's state updates before the
/// approval page loads and reads that state.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_APPROVAL_PAGE: &str = "index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTarget {
    Connect,
    Transaction,
    Contract,
}

impl ApprovalTarget {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Transaction => "transaction",
            Self::Contract => "contract",
        }
    }

    #[must_use]
    pub fn query(self) -> String {
        format!("action={}", self.as_str())
    }
}

impl From<RequestKind> for ApprovalTarget {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Connection => Self::Connect,
            RequestKind::Transaction => Self::Transaction,
            RequestKind::Contract => Self::Contract,
        }
    }
}

impl fmt::Display for ApprovalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `index.html?action=connect` and friends, relative to the extension root.
#[must_use]
pub fn approval_url(page: &str, target: ApprovalTarget) -> String {
    format!("{page}?{}", target.query())
}

/// The extension router, reduced to the single operation this layer needs.
pub trait Navigator {
    fn navigate_to(&self, target: ApprovalTarget);
}

impl<N: Navigator + ?Sized> Navigator for &N {
    fn navigate_to(&self, target: ApprovalTarget) {
        (**self).navigate_to(target);
    }
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate_to(&self, target: ApprovalTarget) {
        (**self).navigate_to(target);
    }
}

/// Resolves targets to page URLs and hands them to a URL sink such as a
/// location setter.
pub struct UrlNavigator<F> {
    page: String,
    open: F,
}

impl<F: Fn(&str)> UrlNavigator<F> {
    pub fn new(page: impl Into<String>, open: F) -> Self {
        Self {
            page: page.into(),
            open,
        }
    }
}

impl<F: Fn(&str)> Navigator for UrlNavigator<F> {
    fn navigate_to(&self, target: ApprovalTarget) {
        let url = approval_url(&self.page, target);
        tracing::info!(%url, "opening approval page");
        (self.open)(&url);
    }
}

/// How the wallets-ready handler reports that its state has committed.
#[derive(Debug)]
pub enum SettleSignal {
    /// No explicit signal; wait the fixed settle delay.
    Timed,
    /// Navigate once the sender fires.
    Acknowledged(oneshot::Receiver<()>),
}

impl SettleSignal {
    #[must_use]
    pub fn acknowledged() -> (oneshot::Sender<()>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self::Acknowledged(receiver))
    }
}

/// Receives ownership of the unlocked wallets. This is the only path by
/// which unlocked state leaves this crate.
pub trait WalletsReady<W> {
    type Error: fmt::Display;

    fn wallets_ready(&self, wallets: Vec<W>) -> Result<SettleSignal, Self::Error>;
}

impl<W, E, F> WalletsReady<W> for F
where
    F: Fn(Vec<W>) -> Result<SettleSignal, E>,
    E: fmt::Display,
{
    type Error = E;

    fn wallets_ready(&self, wallets: Vec<W>) -> Result<SettleSignal, E> {
        self(wallets)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "target", rename_all = "snake_case")]
pub enum DispatchReport {
    /// Nothing was pending; the regular post-unlock view takes over.
    Completed,
    Navigated(ApprovalTarget),
    /// The handler never acknowledged its commit, so the approval page was
    /// not opened.
    Abandoned(ApprovalTarget),
}

pub struct DispatchSequencer<N> {
    navigator: N,
    settle_delay: Duration,
    ack_timeout: Duration,
}

impl<N: Navigator> DispatchSequencer<N> {
    pub fn new(navigator: N) -> Self {
        Self {
            navigator,
            settle_delay: DEFAULT_SETTLE_DELAY,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn from_config(navigator: N, config: &UnlockConfig) -> Self {
        Self {
            navigator,
            settle_delay: config.settle_delay,
            ack_timeout: config.ack_timeout,
        }
    }

    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    #[must_use]
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Hands `wallets` to `ready` exactly once, then, if a request is
    /// pending, waits for the handler's state to settle and navigates once.
    ///
    /// A handler error is returned as-is and no navigation happens.
    pub async fn on_unlocked<W, R>(
        &self,
        wallets: Vec<W>,
        pending: Option<&PendingRequest>,
        ready: &R,
    ) -> Result<DispatchReport, R::Error>
    where
        R: WalletsReady<W> + ?Sized,
    {
        let signal = ready.wallets_ready(wallets)?;

        let Some(request) = pending else {
            return Ok(DispatchReport::Completed);
        };
        let target = ApprovalTarget::from(request.kind());

        match signal {
            SettleSignal::Timed => tokio::time::sleep(self.settle_delay).await,
            SettleSignal::Acknowledged(receiver) => {
                match tokio::time::timeout(self.ack_timeout, receiver).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        tracing::warn!(%target, "wallets-ready acknowledgment dropped");
                        return Ok(DispatchReport::Abandoned(target));
                    }
                    Err(_) => {
                        tracing::warn!(
                            %target,
                            timeout_ms = self.ack_timeout.as_millis() as u64,
                            "wallets-ready acknowledgment timed out"
                        );
                        return Ok(DispatchReport::Abandoned(target));
                    }
                }
            }
        }

        tracing::info!(%target, origin = %request.origin(), "resuming pending dApp request");
        self.navigator.navigate_to(target);
        Ok(DispatchReport::Navigated(target))
    }
}
