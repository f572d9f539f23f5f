use message_channel::PortError;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("invalid target origin: {0:?}")]
    InvalidTargetOrigin(String),

    #[error("invalid origin rule {rule:?}: {reason}")]
    InvalidOriginRule { rule: String, reason: &'static str },

    #[error("object name {0:?} is already registered")]
    DuplicateObjectName(String),

    #[error("object {0:?} is not injected into this frame")]
    ObjectNotInjected(String),
}

impl BridgeError {
    pub(crate) fn origin_rule(rule: &str, reason: &'static str) -> Self {
        BridgeError::InvalidOriginRule {
            rule: rule.to_owned(),
            reason,
        }
    }
}
