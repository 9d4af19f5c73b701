use serde::Serialize;

use crate::pending::{PendingRequest, RequestKind};
use crate::unlock::UnlockError;

pub const SUBMIT_LABEL: &str = "Unlock Wallet";
pub const SUBMIT_LABEL_BUSY: &str = "Unlocking...";
pub const REDIRECT_HINT: &str = "After unlocking, you'll be redirected to approve the dApp request";

const TITLE_RESUME: &str = "Unlock Required";
const TITLE_PLAIN: &str = "Unlock Wallet";
const SUBTITLE_RESUME: &str =
    "Enter your password to unlock wallet and continue with the dApp request";
const SUBTITLE_PLAIN: &str = "Enter your password to access your wallets";
const CONTINUE_NOTICE: &str = "Please unlock your wallet to continue.";
const FALLBACK_INITIAL: char = 'A';

/// Context card shown above the password form while a dApp request waits.
/// Origin and name are echoed as given; nothing here vouches for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestBanner {
    pub avatar_initial: char,
    pub heading: String,
    pub origin: String,
    pub description: String,
}

impl RequestBanner {
    #[must_use]
    pub fn for_request(request: &PendingRequest) -> Self {
        Self {
            avatar_initial: request
                .app_name()
                .chars()
                .next()
                .unwrap_or(FALLBACK_INITIAL),
            heading: format!("{} wants to connect", request.app_name()),
            origin: request.origin().to_string(),
            description: format!("{}{CONTINUE_NOTICE}", kind_description(request.kind())),
        }
    }
}

fn kind_description(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Connection => "This app wants to connect to your wallet. ",
        RequestKind::Transaction => "This app wants to send a transaction. ",
        RequestKind::Contract => "This app wants to interact with a smart contract. ",
    }
}

/// Everything the unlock screen renders, minus the styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockPrompt {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub banner: Option<RequestBanner>,
    pub redirect_hint: Option<&'static str>,
    pub error: Option<&'static str>,
    pub submit_label: &'static str,
    pub submit_enabled: bool,
    pub input_enabled: bool,
}

impl UnlockPrompt {
    #[must_use]
    pub fn new(
        pending: Option<&PendingRequest>,
        busy: bool,
        password_blank: bool,
        error: Option<UnlockError>,
    ) -> Self {
        let resuming = pending.is_some();
        Self {
            title: if resuming { TITLE_RESUME } else { TITLE_PLAIN },
            subtitle: if resuming {
                SUBTITLE_RESUME
            } else {
                SUBTITLE_PLAIN
            },
            banner: pending.map(RequestBanner::for_request),
            redirect_hint: resuming.then_some(REDIRECT_HINT),
            error: error.map(UnlockError::user_message),
            submit_label: if busy { SUBMIT_LABEL_BUSY } else { SUBMIT_LABEL },
            submit_enabled: !busy && !password_blank,
            input_enabled: !busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_unlock_has_no_banner() {
        let prompt = UnlockPrompt::new(None, false, false, None);
        assert_eq!(prompt.title, "Unlock Wallet");
        assert_eq!(prompt.subtitle, "Enter your password to access your wallets");
        assert_eq!(prompt.banner, None);
        assert_eq!(prompt.redirect_hint, None);
        assert!(prompt.submit_enabled);
    }

    #[test]
    fn resumption_shows_request_context() {
        let request = PendingRequest::new(
            RequestKind::Transaction,
            "https://dapp.example",
            Some("DApp".to_string()),
        );
        let prompt = UnlockPrompt::new(Some(&request), false, false, None);
        assert_eq!(prompt.title, "Unlock Required");
        assert_eq!(prompt.redirect_hint, Some(REDIRECT_HINT));

        let banner = prompt.banner.expect("banner");
        assert_eq!(banner.avatar_initial, 'D');
        assert_eq!(banner.heading, "DApp wants to connect");
        assert_eq!(banner.origin, "https://dapp.example");
        assert_eq!(
            banner.description,
            "This app wants to send a transaction. Please unlock your wallet to continue."
        );
    }

    #[test]
    fn busy_or_blank_disables_submit() {
        let busy = UnlockPrompt::new(None, true, false, None);
        assert_eq!(busy.submit_label, "Unlocking...");
        assert!(!busy.submit_enabled);
        assert!(!busy.input_enabled);

        let blank = UnlockPrompt::new(None, false, true, None);
        assert_eq!(blank.submit_label, "Unlock Wallet");
        assert!(!blank.submit_enabled);
        assert!(blank.input_enabled);
    }

    #[test]
    fn errors_render_fixed_copy() {
        let prompt = UnlockPrompt::new(None, false, true, Some(UnlockError::UnlockFailure));
        assert_eq!(prompt.error, Some("Failed to unlock wallet"));
    }
}
