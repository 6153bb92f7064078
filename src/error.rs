//! The failure taxonomy surfaced to callers.
//!
//! Nothing here is swallowed or reinterpreted by the proxies - host-reported failures
//! pass through verbatim, with the offending identifier or parameter attached where
//! one is known. Client-side validation failures use the same taxonomy so a caller
//! has a single error type to match on.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The referenced handle no longer resolves - its referent was closed, deleted,
    /// merged away, or superseded by an id reuse.
    #[error("stale handle: {}", .ident)]
    StaleHandle { ident: String },
    /// Malformed bounds, out-of-range or unrecognized options, mismatched
    /// save-format variants. Detected client-side; the host was never contacted.
    #[error("invalid argument: {}", .reason)]
    InvalidArgument { reason: String },
    /// The host declined the operation as a business-rule refusal
    /// (e.g. grouping a background layer).
    #[error("host rejected the operation: {}", .reason)]
    HostRejected { reason: String },
    /// The host closed the document while the command was pending.
    #[error("document closed by the host")]
    DocumentClosed,
    /// The host could not access the save target.
    #[error("permission denied: {}", .reason)]
    PermissionDenied { reason: String },
    /// The host did not respond in time. The operation may still have been
    /// applied - callers must re-query state rather than assume non-application.
    #[error("host did not respond in time")]
    Timeout,
}

impl Error {
    pub(crate) fn stale(ident: impl std::fmt::Display) -> Self {
        Self::StaleHandle {
            ident: ident.to_string(),
        }
    }
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
    /// The host answered with a payload shape the command contract does not allow.
    /// Surfaced as a rejection since the caller can do nothing better with it.
    pub(crate) fn malformed_response(opcode: &'static str) -> Self {
        Self::HostRejected {
            reason: format!("malformed host response to `{opcode}`"),
        }
    }
}
