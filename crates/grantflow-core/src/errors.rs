//! Taxonomía de errores del motor de workflows.
//!
//! Los cuatro errores centrales del contrato (`InvalidEvent`,
//! `InvalidWorkflowType`, `UnexpectedState`, `UserDoesNotExist`) propagan
//! síncronamente desde `EventHandler::process`; el resto cubre la
//! validación de entidades, el procesamiento de aprobaciones y la capa de
//! almacenamiento. Un guard denegado y un evento estructuralmente inválido
//! colapsan a propósito en `InvalidEvent`: el caller no puede distinguir
//! "no autorizado" de "no existe esa transición".

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowError {
    /// Evento no legal para el estado persistido actual, o guard denegado.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// El tipo de workflow no tiene entrada en el registry. Defecto de
    /// configuración: no es reintentable sin un deploy.
    #[error("invalid workflow type: {0}")]
    InvalidWorkflowType(String),

    /// El estado persistido no es un estado conocido por la máquina
    /// resuelta. Corrupción de datos o mismatch de versiones; fatal.
    #[error("unexpected workflow state: {0}")]
    UnexpectedState(String),

    #[error("user does not exist: {0}")]
    UserDoesNotExist(String),

    #[error("workflow does not exist: {0}")]
    WorkflowDoesNotExist(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid entity for workflow: {0}")]
    InvalidEntityForWorkflow(String),

    /// El usuario ya tiene una aprobación vigente del mismo tipo.
    #[error("duplicate approval: {0}")]
    DuplicateApproval(String),

    /// El response type de la aprobación falta o no es un valor válido.
    #[error("invalid approval response type: {0}")]
    InvalidResponseType(String),

    /// Error de la capa de almacenamiento subyacente.
    #[error("store error: {0}")]
    Store(String),
}

/// Clasificación gruesa para el worker que consume la cola: decide si
/// reintentar la entrega, descartarla, o escalar a investigación manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Vale la pena reintentar (el registro faltante puede aparecer, el
    /// error transitorio de IO puede resolverse).
    Retryable,
    /// Reintentar no sirve sin una corrección externa.
    NonRetryable,
    /// Requiere investigación manual; nunca se "repara" en silencio.
    Fatal,
}

pub fn classify_error(error: &WorkflowError) -> ErrorClass {
    match error {
        WorkflowError::UserDoesNotExist(_) | WorkflowError::Store(_) => ErrorClass::Retryable,
        WorkflowError::UnexpectedState(_) => ErrorClass::Fatal,
        _ => ErrorClass::NonRetryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_contract() {
        assert_eq!(classify_error(&WorkflowError::UserDoesNotExist("u".into())), ErrorClass::Retryable);
        assert_eq!(classify_error(&WorkflowError::UnexpectedState("s".into())), ErrorClass::Fatal);
        assert_eq!(classify_error(&WorkflowError::InvalidEvent("e".into())), ErrorClass::NonRetryable);
        assert_eq!(classify_error(&WorkflowError::InvalidWorkflowType("t".into())),
                   ErrorClass::NonRetryable);
    }
}
