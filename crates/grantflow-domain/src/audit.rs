//! Fila append-only `WorkflowAudit`: una por transición ejecutada.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Registro inmutable de una transición ejecutada. Es la historia canónica
/// de "qué pasó" sobre un workflow; nunca se actualiza ni se borra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAudit {
    pub audit_id: Uuid,
    pub workflow_id: Uuid,
    pub acting_user_id: Uuid,
    /// Nombre del evento que disparó la transición (p. ej. `start_workflow`).
    pub transition_event: String,
    pub source_state: String,
    pub target_state: String,
    /// Evento de historia (`WorkflowEventHistory`) que originó la transición.
    pub event_id: Uuid,
    /// Metadata opaca provista por el emisor del evento.
    pub audit_metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl WorkflowAudit {
    pub fn new(workflow_id: Uuid,
               acting_user_id: Uuid,
               transition_event: &str,
               source_state: &str,
               target_state: &str,
               event_id: Uuid,
               audit_metadata: Value)
               -> Self {
        Self { audit_id: Uuid::new_v4(),
               workflow_id,
               acting_user_id,
               transition_event: transition_event.to_string(),
               source_state: source_state.to_string(),
               target_state: target_state.to_string(),
               event_id,
               audit_metadata,
               created_at: Utc::now() }
    }
}
