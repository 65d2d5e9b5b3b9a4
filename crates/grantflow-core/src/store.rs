//! Almacenamiento durable del motor.
//!
//! `WorkflowStore` es el contrato que el runtime necesita de la base: filas
//! de workflow, audits append-only, aprobaciones y el ledger de eventos
//! entrantes. La implementación in-memory vive aquí (tests y demo); la
//! implementación Postgres vive en grantflow-persistence.
//!
//! El trait no commitea nada por su cuenta: la transacción que envuelve una
//! transición es responsabilidad del caller (ver grantflow-persistence).

use std::collections::HashMap;

use uuid::Uuid;

use grantflow_domain::{Workflow, WorkflowApproval, WorkflowAudit, WorkflowEventHistory};

use crate::errors::WorkflowError;

pub trait WorkflowStore {
    fn create_workflow(&mut self, workflow: &Workflow) -> Result<(), WorkflowError>;
    /// Carga la fila del workflow. En Postgres toma un row-level lock
    /// (`FOR UPDATE`) para que dos eventos concurrentes sobre el mismo
    /// workflow no observen el mismo estado stale.
    fn get_workflow(&self, workflow_id: Uuid) -> Result<Option<Workflow>, WorkflowError>;
    fn update_workflow_state(&mut self, workflow_id: Uuid, state: &str, is_active: bool)
                             -> Result<(), WorkflowError>;

    fn add_audit(&mut self, audit: &WorkflowAudit) -> Result<(), WorkflowError>;
    /// Audits de un workflow en orden de inserción.
    fn list_audits(&self, workflow_id: Uuid) -> Result<Vec<WorkflowAudit>, WorkflowError>;

    fn add_approval(&mut self, approval: &WorkflowApproval) -> Result<(), WorkflowError>;
    fn list_approvals(&self, workflow_id: Uuid) -> Result<Vec<WorkflowApproval>, WorkflowError>;
    /// Apaga `is_still_valid` en todas las aprobaciones vigentes del
    /// workflow. Las filas nunca se borran.
    fn invalidate_approvals(&mut self, workflow_id: Uuid) -> Result<(), WorkflowError>;

    fn add_history_event(&mut self, event: &WorkflowEventHistory) -> Result<(), WorkflowError>;
    fn get_history_event(&self, event_id: Uuid) -> Result<Option<WorkflowEventHistory>, WorkflowError>;
    fn mark_history_processed(&mut self, event_id: Uuid) -> Result<(), WorkflowError>;
}

/// Backend in-memory con paridad de contrato respecto al backend Postgres.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: HashMap<Uuid, Workflow>,
    audits: Vec<WorkflowAudit>,
    approvals: Vec<WorkflowApproval>,
    history: HashMap<Uuid, WorkflowEventHistory>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cantidad de eventos de historia grabados, procesados o no.
    pub fn history_count(&self) -> usize {
        self.history.len()
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn create_workflow(&mut self, workflow: &Workflow) -> Result<(), WorkflowError> {
        if self.workflows.contains_key(&workflow.workflow_id) {
            return Err(WorkflowError::Store(format!("workflow {} already exists", workflow.workflow_id)));
        }
        self.workflows.insert(workflow.workflow_id, workflow.clone());
        Ok(())
    }

    fn get_workflow(&self, workflow_id: Uuid) -> Result<Option<Workflow>, WorkflowError> {
        Ok(self.workflows.get(&workflow_id).cloned())
    }

    fn update_workflow_state(&mut self, workflow_id: Uuid, state: &str, is_active: bool)
                             -> Result<(), WorkflowError> {
        let row = self.workflows
                      .get_mut(&workflow_id)
                      .ok_or_else(|| WorkflowError::Store(format!("workflow {workflow_id} not found")))?;
        row.current_workflow_state = state.to_string();
        row.is_active = is_active;
        row.updated_at = chrono::Utc::now();
        Ok(())
    }

    fn add_audit(&mut self, audit: &WorkflowAudit) -> Result<(), WorkflowError> {
        self.audits.push(audit.clone());
        Ok(())
    }

    fn list_audits(&self, workflow_id: Uuid) -> Result<Vec<WorkflowAudit>, WorkflowError> {
        Ok(self.audits.iter().filter(|a| a.workflow_id == workflow_id).cloned().collect())
    }

    fn add_approval(&mut self, approval: &WorkflowApproval) -> Result<(), WorkflowError> {
        self.approvals.push(approval.clone());
        Ok(())
    }

    fn list_approvals(&self, workflow_id: Uuid) -> Result<Vec<WorkflowApproval>, WorkflowError> {
        Ok(self.approvals.iter().filter(|a| a.workflow_id == workflow_id).cloned().collect())
    }

    fn invalidate_approvals(&mut self, workflow_id: Uuid) -> Result<(), WorkflowError> {
        for approval in self.approvals.iter_mut().filter(|a| a.workflow_id == workflow_id) {
            approval.is_still_valid = false;
        }
        Ok(())
    }

    fn add_history_event(&mut self, event: &WorkflowEventHistory) -> Result<(), WorkflowError> {
        self.history.insert(event.event_id, event.clone());
        Ok(())
    }

    fn get_history_event(&self, event_id: Uuid) -> Result<Option<WorkflowEventHistory>, WorkflowError> {
        Ok(self.history.get(&event_id).cloned())
    }

    fn mark_history_processed(&mut self, event_id: Uuid) -> Result<(), WorkflowError> {
        let row = self.history
                      .get_mut(&event_id)
                      .ok_or_else(|| WorkflowError::Store(format!("history event {event_id} not found")))?;
        row.is_successfully_processed = true;
        Ok(())
    }
}
