//! Pending dApp request descriptors carried across the unlock redirect.
//!
//! A background context that needs the wallet unlocked before it can serve a
//! dApp request opens the unlock page with a query such as
//! `action=unlock&pendingConnection=1&origin=https%3A%2F%2Fsite.io&appName=Site`.
//! The unlock page reads that query once at mount and reconstructs a
//! [`PendingRequest`] from it. Anything partial or malformed yields no request.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub const ACTION_KEY: &str = "action";
pub const UNLOCK_ACTION: &str = "unlock";
pub const ORIGIN_KEY: &str = "origin";
pub const APP_NAME_KEY: &str = "appName";

const MARKER_VALUE: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Connection,
    Transaction,
    Contract,
}

impl RequestKind {
    /// Marker evaluation order. Connection wins over transaction, which wins
    /// over contract, when a query carries more than one marker.
    pub const PRIORITY: [RequestKind; 3] = [
        RequestKind::Connection,
        RequestKind::Transaction,
        RequestKind::Contract,
    ];

    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Connection => "pendingConnection",
            Self::Transaction => "pendingTransaction",
            Self::Contract => "pendingContract",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Transaction => "transaction",
            Self::Contract => "contract",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown request kind: {0}")]
    UnknownKind(String),
}

#[must_use]
pub fn parse_request_kind(raw: &str) -> Option<RequestKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "connection" | "connect" => Some(RequestKind::Connection),
        "transaction" | "tx" => Some(RequestKind::Transaction),
        "contract" => Some(RequestKind::Contract),
        _ => None,
    }
}

impl std::str::FromStr for RequestKind {
    type Err = QueryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_request_kind(raw).ok_or_else(|| QueryError::UnknownKind(raw.to_string()))
    }
}

/// A dApp request interrupted by the unlock screen.
///
/// `origin` and `app_name` come straight from the page query and are
/// untrusted display data. This type makes no claim about who sent them;
/// allow-listing and origin checks belong to the approval flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    kind: RequestKind,
    origin: String,
    app_name: String,
}

impl PendingRequest {
    /// Builds a request, falling back to `origin` for a missing or empty app name.
    #[must_use]
    pub fn new(kind: RequestKind, origin: impl Into<String>, app_name: Option<String>) -> Self {
        let origin = origin.into();
        let app_name = app_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| origin.clone());
        Self {
            kind,
            origin,
            app_name,
        }
    }

    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Untrusted requesting origin.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Untrusted display name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Encodes the resumption query that reopens the unlock page for this request.
    #[must_use]
    pub fn to_query(&self) -> String {
        format!(
            "{ACTION_KEY}={UNLOCK_ACTION}&{}={MARKER_VALUE}&{ORIGIN_KEY}={}&{APP_NAME_KEY}={}",
            self.kind.marker(),
            urlencoding::encode(&self.origin),
            urlencoding::encode(&self.app_name),
        )
    }
}

/// Read-only view of the page query, captured once at mount.
///
/// Values are stored raw apart from `+`, which becomes an escaped space as in
/// form encoding; [`parse_pending_request`] does the decoding so a malformed
/// escape can be rejected instead of silently passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, String>,
}

impl QueryParams {
    /// Splits a `location.search` style string. The first occurrence of a key
    /// wins. Keys are decoded here; a key that does not decode is kept as is.
    #[must_use]
    pub fn from_search(search: &str) -> Self {
        let trimmed = search.trim();
        let query = trimmed.strip_prefix('?').unwrap_or(trimmed);
        let query = query.split('#').next().unwrap_or_default();

        let mut entries = BTreeMap::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = plus_as_space(key);
            let key = decode_component(&key).unwrap_or(key);
            entries.entry(key).or_insert_with(|| plus_as_space(value));
        }
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Present and non-empty, which is how the markers are tested.
    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in iter {
            entries.entry(key.into()).or_insert_with(|| value.into());
        }
        Self { entries }
    }
}

fn plus_as_space(raw: &str) -> String {
    raw.replace('+', "%20")
}

/// Strict percent-decoding. A `%` not followed by two hex digits, or bytes
/// that do not form UTF-8, reject the whole component.
#[must_use]
pub fn decode_component(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let well_formed = bytes
                .get(index + 1..index + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return None;
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}

/// Reconstructs the pending request, if any, from the unlock page query.
#[must_use]
pub fn parse_pending_request(params: &QueryParams) -> Option<PendingRequest> {
    if params.get(ACTION_KEY) != Some(UNLOCK_ACTION) {
        return None;
    }

    let raw_origin = params.non_empty(ORIGIN_KEY)?;
    let kind = RequestKind::PRIORITY
        .into_iter()
        .find(|kind| params.non_empty(kind.marker()).is_some())?;

    let Some(origin) = decode_component(raw_origin) else {
        tracing::debug!(%kind, "pending request origin is not valid percent-encoding");
        return None;
    };
    let app_name = match params.non_empty(APP_NAME_KEY) {
        Some(raw) => {
            let Some(decoded) = decode_component(raw) else {
                tracing::debug!(%kind, "pending request app name is not valid percent-encoding");
                return None;
            };
            Some(decoded)
        }
        None => None,
    };

    Some(PendingRequest::new(kind, origin, app_name))
}
