use std::fmt;

use thiserror::Error;

use crate::port::PortId;

pub type PortResult<T> = Result<T, PortError>;

/// Synchronous contract violations raised at the offending call site.
///
/// Every violation is an `InvalidStateError`; callers tell them apart by the
/// message text (or by matching on [`StateViolation`]).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("InvalidStateError: {violation} ({port})")]
    InvalidState {
        port: PortId,
        violation: StateViolation,
    },
}

impl PortError {
    pub(crate) fn invalid_state(port: PortId, violation: StateViolation) -> Self {
        PortError::InvalidState { port, violation }
    }

    /// The port whose state caused the failure.
    pub fn port(&self) -> PortId {
        match self {
            PortError::InvalidState { port, .. } => *port,
        }
    }

    pub fn violation(&self) -> StateViolation {
        match self {
            PortError::InvalidState { violation, .. } => *violation,
        }
    }

    /// Message text without the error-kind prefix or port identity.
    pub fn message(&self) -> String {
        self.violation().to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateViolation {
    AlreadyClosed,
    AlreadyTransferred,
    AlreadyStarted,
    TransferSelf,
    DuplicateTransfer,
}

impl fmt::Display for StateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StateViolation::AlreadyClosed => "Port is already closed",
            StateViolation::AlreadyTransferred => "Port is already transferred",
            StateViolation::AlreadyStarted => "Port is already started",
            StateViolation::TransferSelf => "Port cannot transfer itself",
            StateViolation::DuplicateTransfer => "Port is listed twice in the transfer list",
        };
        f.write_str(text)
    }
}
