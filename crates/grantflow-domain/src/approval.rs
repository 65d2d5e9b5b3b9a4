//! Fila `WorkflowApproval`: una decisión de aprobación rendida durante una
//! transición.
//!
//! Las filas son inmutables salvo por `is_still_valid`: un ciclo posterior
//! que supersede una decisión apaga el flag de la fila vieja en vez de
//! borrarla.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ApprovalResponseType, ApprovalType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowApproval {
    pub approval_id: Uuid,
    pub workflow_id: Uuid,
    pub approval_type: ApprovalType,
    pub approving_user_id: Uuid,
    pub approval_response_type: ApprovalResponseType,
    pub comment: Option<String>,
    pub is_still_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkflowApproval {
    pub fn new(workflow_id: Uuid,
               approval_type: ApprovalType,
               approving_user_id: Uuid,
               approval_response_type: ApprovalResponseType,
               comment: Option<String>,
               is_still_valid: bool)
               -> Self {
        Self { approval_id: Uuid::new_v4(),
               workflow_id,
               approval_type,
               approving_user_id,
               approval_response_type,
               comment,
               is_still_valid,
               created_at: Utc::now() }
    }
}
