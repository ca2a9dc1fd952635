use serde::{Deserialize, Serialize};

/// The error-kind taxonomy shared across every crate in the workspace.
/// Concrete error enums (`CatalogError`, `BusError`, ...) each carry one
/// of these kinds so callers can branch on kind without matching every
/// concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    TransientIo,
    InvalidInput,
    ResourceExhausted,
    Conflict,
    Timeout,
    Fatal,
}

/// What a message handler decides to do with the message it was handed.
/// The handler contract returns a decision value instead of throwing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Ack,
    NackRequeue,
    NackDrop,
}

impl ErrorKind {
    /// Default disposition for an error of this kind, absent a more
    /// specific policy. Retry-sensitive call sites (the scanner's
    /// transient I/O path, derivation's placement-failure path) override
    /// this with their own retry-count bookkeeping.
    pub fn default_outcome(self) -> HandlerOutcome {
        match self {
            ErrorKind::TransientIo => HandlerOutcome::NackRequeue,
            ErrorKind::InvalidInput => HandlerOutcome::NackDrop,
            ErrorKind::ResourceExhausted => HandlerOutcome::NackRequeue,
            ErrorKind::Conflict => HandlerOutcome::NackRequeue,
            ErrorKind::Timeout => HandlerOutcome::NackRequeue,
            ErrorKind::Fatal => HandlerOutcome::NackDrop,
        }
    }
}
