//! Contextos que fluyen por una ejecución de `send`.
//!
//! `StateMachineEvent` es el value object transitorio que el `EventHandler`
//! arma tras validar el envelope: existe sólo durante un `process()`.
//! `GuardContext` (lectura) y `EffectContext` (escritura vía el adapter) son
//! las vistas que guards, listeners y efectos reciben del mundo.

use serde_json::Value;
use uuid::Uuid;

use grantflow_domain::{ApprovalResponseType, User, Workflow};

use crate::config::WorkflowConfig;
use crate::directory::Directory;
use crate::errors::WorkflowError;
use crate::persistence_model::StatePersistence;
use crate::store::WorkflowStore;

/// Evento ya validado y resuelto, listo para el runtime.
#[derive(Debug, Clone)]
pub struct StateMachineEvent {
    /// Nombre del evento a disparar en la máquina.
    pub event_to_send: String,
    pub acting_user: User,
    /// Metadata opaca del emisor; se copia a la fila de audit.
    pub metadata: Value,
    /// Response type crudo del envelope. Se parsea recién en el guard de
    /// aprobación para que un valor inválido sea un error del motor y no un
    /// fallo de deserialización silencioso.
    pub approval_response_type: Option<String>,
    pub comment: Option<String>,
    /// Evento de historia que originó esta transición.
    pub history_event_id: Uuid,
}

impl StateMachineEvent {
    /// Parsea el response type del envelope. `None` y valores desconocidos
    /// son errores distintos para poder diagnosticarlos por separado.
    pub fn parse_approval_response(&self) -> Result<ApprovalResponseType, WorkflowError> {
        match &self.approval_response_type {
            None => Err(WorkflowError::InvalidResponseType(
                "approval response type not found for state machine event".to_string(),
            )),
            Some(raw) => raw.parse().map_err(|_| {
                             WorkflowError::InvalidResponseType(
                    "approval response type is not a valid value".to_string(),
                )
                         }),
        }
    }
}

/// Vista de sólo lectura para evaluar guards. Nada se ha escrito todavía
/// cuando un guard corre.
pub struct GuardContext<'a> {
    pub event: &'a StateMachineEvent,
    pub workflow: &'a Workflow,
    pub config: &'a WorkflowConfig,
    pub store: &'a dyn WorkflowStore,
    pub directory: &'a dyn Directory,
}

/// Vista de escritura para listeners y efectos: toda mutación pasa por el
/// adapter (`model`), que participa de la transacción del caller.
pub struct EffectContext<'a> {
    pub event: &'a StateMachineEvent,
    pub config: &'a WorkflowConfig,
    pub source_state: &'a str,
    pub target_state: &'a str,
    pub model: &'a mut dyn StatePersistence,
    pub directory: &'a dyn Directory,
}
