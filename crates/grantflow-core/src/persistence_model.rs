//! Adapter de persistencia: liga el "estado actual" abstracto del runtime a
//! la columna de una fila durable.
//!
//! Se construye por llamada, a partir de la fila `Workflow` en memoria y el
//! handle de almacenamiento. Toda escritura de la transición (estado, flag
//! de actividad, audit, aprobaciones) entra por acá, de modo que comparte la
//! transacción del caller; el adapter nunca commitea por su cuenta.

use grantflow_domain::{Workflow, WorkflowApproval, WorkflowAudit};

use crate::errors::WorkflowError;
use crate::store::WorkflowStore;

pub trait StatePersistence {
    fn workflow(&self) -> &Workflow;
    fn current_state(&self) -> &str;
    /// Escribe el estado destino en la fila y en el store.
    fn write_state(&mut self, target: &str) -> Result<(), WorkflowError>;
    /// Prende/apaga `is_active` (el runtime la apaga al llegar a terminal).
    fn set_active(&mut self, active: bool) -> Result<(), WorkflowError>;
    fn add_audit(&mut self, audit: WorkflowAudit) -> Result<(), WorkflowError>;
    fn add_approval(&mut self, approval: WorkflowApproval) -> Result<(), WorkflowError>;
    fn invalidate_approvals(&mut self) -> Result<(), WorkflowError>;
    fn list_approvals(&self) -> Result<Vec<WorkflowApproval>, WorkflowError>;
}

/// Factory que cada `WorkflowConfig` lleva para construir su adapter. Un fn
/// pointer alcanza: el adapter no captura estado, sólo presta la fila y el
/// store del caller.
pub type PersistenceModelFactory =
    for<'a> fn(&'a mut Workflow, &'a mut (dyn WorkflowStore + 'a)) -> Box<dyn StatePersistence + 'a>;

/// Adapter genérico que sirve a los tres tipos de entidad. Los tipos de
/// workflow que necesiten side effects propios pueden registrar otra
/// factory en su config.
pub struct WorkflowPersistenceModel<'a> {
    workflow: &'a mut Workflow,
    store: &'a mut (dyn WorkflowStore + 'a),
}

impl<'a> WorkflowPersistenceModel<'a> {
    pub fn new(workflow: &'a mut Workflow, store: &'a mut (dyn WorkflowStore + 'a)) -> Self {
        Self { workflow, store }
    }
}

/// Construye el adapter genérico. Función libre con su propio lifetime para
/// que el fn item coercione al pointer `for<'a>` de
/// `PersistenceModelFactory`; como método del impl quedaría atado al
/// lifetime del impl y la coerción no tipa.
pub fn workflow_persistence_model<'a>(workflow: &'a mut Workflow,
                                      store: &'a mut (dyn WorkflowStore + 'a))
                                      -> Box<dyn StatePersistence + 'a> {
    Box::new(WorkflowPersistenceModel::new(workflow, store))
}

impl StatePersistence for WorkflowPersistenceModel<'_> {
    fn workflow(&self) -> &Workflow {
        self.workflow
    }

    fn current_state(&self) -> &str {
        &self.workflow.current_workflow_state
    }

    fn write_state(&mut self, target: &str) -> Result<(), WorkflowError> {
        self.workflow.current_workflow_state = target.to_string();
        self.workflow.updated_at = chrono::Utc::now();
        self.store.update_workflow_state(self.workflow.workflow_id, target, self.workflow.is_active)
    }

    fn set_active(&mut self, active: bool) -> Result<(), WorkflowError> {
        self.workflow.is_active = active;
        self.workflow.updated_at = chrono::Utc::now();
        self.store.update_workflow_state(self.workflow.workflow_id,
                                         &self.workflow.current_workflow_state,
                                         active)
    }

    fn add_audit(&mut self, audit: WorkflowAudit) -> Result<(), WorkflowError> {
        self.store.add_audit(&audit)
    }

    fn add_approval(&mut self, approval: WorkflowApproval) -> Result<(), WorkflowError> {
        self.store.add_approval(&approval)
    }

    fn invalidate_approvals(&mut self) -> Result<(), WorkflowError> {
        self.store.invalidate_approvals(self.workflow.workflow_id)
    }

    fn list_approvals(&self) -> Result<Vec<WorkflowApproval>, WorkflowError> {
        self.store.list_approvals(self.workflow.workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use grantflow_domain::{Workflow, WorkflowEntityRef, WorkflowType};

    use super::*;
    use crate::store::InMemoryWorkflowStore;

    #[test]
    fn factory_coerces_to_the_factory_pointer_and_writes_through() {
        // La coerción misma es parte del contrato: una config guarda el
        // fn pointer y lo invoca con lifetimes distintos por llamada.
        let factory: PersistenceModelFactory = workflow_persistence_model;

        let mut store = InMemoryWorkflowStore::new();
        let mut workflow = Workflow::new(WorkflowType::InitialPrototype,
                                         "START",
                                         WorkflowEntityRef::Opportunity(Uuid::new_v4()));
        store.create_workflow(&workflow).unwrap();

        let mut model = factory(&mut workflow, &mut store);
        model.write_state("PENDING_PROGRAM_OFFICER_APPROVAL").unwrap();
        assert_eq!(model.current_state(), "PENDING_PROGRAM_OFFICER_APPROVAL");
        drop(model);

        assert_eq!(workflow.current_workflow_state, "PENDING_PROGRAM_OFFICER_APPROVAL");
        let stored = store.get_workflow(workflow.workflow_id).unwrap().unwrap();
        assert_eq!(stored.current_workflow_state, "PENDING_PROGRAM_OFFICER_APPROVAL");
    }
}
