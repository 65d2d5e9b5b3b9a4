//! Configuración estática por tipo de workflow.
//!
//! Un `WorkflowConfig` dice: qué tipos de entidad acepta el workflow, qué
//! adapter de persistencia usa, y qué aprobación (tipo + privilegios +
//! mínimo de aprobaciones) exige cada evento guardado. Se construye una vez
//! en el arranque y vive read-only en el registry.

use std::collections::HashMap;

use grantflow_domain::{ApprovalType, Privilege, WorkflowEntityType, WorkflowType};

use crate::persistence_model::PersistenceModelFactory;

/// Requisitos de aprobación para un evento guardado.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    pub approval_type: ApprovalType,
    /// El usuario debe tener TODOS estos privilegios en la agencia dueña.
    pub required_privileges: Vec<Privilege>,
    /// Cantidad de aprobaciones vigentes del tipo necesarias para avanzar.
    pub minimum_approvals_required: u32,
}

impl ApprovalConfig {
    pub fn new(approval_type: ApprovalType, required_privileges: Vec<Privilege>) -> Self {
        Self { approval_type,
               required_privileges,
               minimum_approvals_required: 1 }
    }

    pub fn with_minimum_approvals(mut self, minimum: u32) -> Self {
        self.minimum_approvals_required = minimum;
        self
    }
}

#[derive(Debug)]
pub struct WorkflowConfig {
    pub workflow_type: WorkflowType,
    pub allowed_entity_types: Vec<WorkflowEntityType>,
    pub persistence_model: PersistenceModelFactory,
    /// Evento -> requisitos de aprobación. Eventos sin entrada no requieren
    /// aprobación de agencia.
    pub approval_mapping: HashMap<String, ApprovalConfig>,
}

impl WorkflowConfig {
    pub fn new(workflow_type: WorkflowType,
               allowed_entity_types: Vec<WorkflowEntityType>,
               persistence_model: PersistenceModelFactory)
               -> Self {
        Self { workflow_type,
               allowed_entity_types,
               persistence_model,
               approval_mapping: HashMap::new() }
    }

    pub fn with_approval(mut self, event: &str, approval: ApprovalConfig) -> Self {
        self.approval_mapping.insert(event.to_string(), approval);
        self
    }

    pub fn approval_for_event(&self, event: &str) -> Option<&ApprovalConfig> {
        self.approval_mapping.get(event)
    }

    pub fn allows_entity_type(&self, entity_type: WorkflowEntityType) -> bool {
        self.allowed_entity_types.contains(&entity_type)
    }
}
