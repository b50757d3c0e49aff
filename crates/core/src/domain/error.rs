// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid transaction phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("No active compensable transaction while propagation is mandatory")]
    MandatoryPropagation,

    #[error("Illegal transaction scope state: {0}")]
    IllegalScopeState(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
