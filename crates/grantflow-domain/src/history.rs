//! Ledger `WorkflowEventHistory`: copia durable de cada evento entrante.
//!
//! Se escribe ANTES de empezar cualquier validación; sirve como ledger de
//! replay/idempotencia bajo entrega at-least-once. El flag
//! `is_successfully_processed` sólo pasa a true cuando la transición
//! completa (cambio de estado + audit) ya commiteó.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEventHistory {
    pub event_id: Uuid,
    /// Envelope crudo tal como llegó de la cola.
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    pub is_successfully_processed: bool,
}

impl WorkflowEventHistory {
    pub fn new(payload: Value) -> Self {
        Self { event_id: Uuid::new_v4(),
               payload,
               received_at: Utc::now(),
               is_successfully_processed: false }
    }
}
