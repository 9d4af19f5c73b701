//! Unlock gating for the wallet extension.
//!
//! When a dApp request arrives while the wallet is locked, the extension opens
//! the unlock page with the request described in the query string. This crate
//! turns that query back into a [`PendingRequest`], runs the password through
//! an [`UnlockGate`], and after a successful unlock hands the wallets to the
//! app before resuming the request on its approval page.
//!
//! - [`pending`]: query parsing and encoding.
//! - [`unlock`]: password validation and delegation to the keystore.
//! - [`dispatch`]: wallets-ready hand-off and approval navigation.
//! - [`flow`]: the unlock screen state tying the three together.

pub mod config;
pub mod dispatch;
pub mod flow;
pub mod pending;
pub mod prompt;
pub mod secret;
pub mod unlock;

pub use config::{ConfigError, UnlockConfig};
pub use dispatch::{
    ApprovalTarget, DEFAULT_SETTLE_DELAY, DispatchReport, DispatchSequencer, Navigator,
    SettleSignal, UrlNavigator, WalletsReady, approval_url,
};
pub use flow::{SubmitOutcome, UnlockFlow, UnlockPhase};
pub use pending::{PendingRequest, QueryParams, RequestKind, parse_pending_request};
pub use prompt::{RequestBanner, UnlockPrompt};
pub use secret::Secret;
pub use unlock::{
    PrimitiveError, UnlockAttempt, UnlockError, UnlockGate, UnlockPrimitive, UnlockResult,
};
