//! Errores del dominio.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown {kind} value: {value}")]
    UnknownLookupValue { kind: &'static str, value: String },

    #[error("workflow must reference exactly one entity")]
    InvalidEntityReference,
}
