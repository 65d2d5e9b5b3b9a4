//! Registry de workflows: tipo -> (config, definición de máquina).
//!
//! Se llena una sola vez durante el arranque con llamadas explícitas a
//! `register` (nada de registración por anotación ni singletons globales) y
//! después se pasa por referencia compartida. Un lookup de un tipo nunca
//! registrado falla fuerte con `InvalidWorkflowType`.

use std::collections::HashMap;

use grantflow_domain::WorkflowType;

use crate::config::WorkflowConfig;
use crate::errors::WorkflowError;
use crate::machine::StateMachineDefinition;

#[derive(Default)]
pub struct WorkflowRegistry {
    entries: HashMap<WorkflowType, (WorkflowConfig, StateMachineDefinition)>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un tipo. Re-registrar el mismo tipo es un defecto de
    /// arranque, no un overwrite silencioso.
    pub fn register(&mut self,
                    workflow_type: WorkflowType,
                    config: WorkflowConfig,
                    definition: StateMachineDefinition)
                    -> Result<(), WorkflowError> {
        if self.entries.contains_key(&workflow_type) {
            return Err(WorkflowError::InvalidWorkflowType(format!(
                "workflow type {workflow_type} is already registered"
            )));
        }
        self.entries.insert(workflow_type, (config, definition));
        Ok(())
    }

    pub fn resolve(&self, workflow_type: WorkflowType)
                   -> Result<(&WorkflowConfig, &StateMachineDefinition), WorkflowError> {
        self.entries
            .get(&workflow_type)
            .map(|(config, definition)| (config, definition))
            .ok_or_else(|| {
                WorkflowError::InvalidWorkflowType(format!(
                    "workflow type {workflow_type} does not map to an actual state machine"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence_model::workflow_persistence_model;
    use grantflow_domain::WorkflowEntityType;

    fn dummy_entry() -> (WorkflowConfig, StateMachineDefinition) {
        let config = WorkflowConfig::new(WorkflowType::OpportunityPublish,
                                         vec![WorkflowEntityType::Opportunity],
                                         workflow_persistence_model);
        let definition = StateMachineDefinition::builder("start").terminal("end")
                                                                 .transition("start", "start_workflow", "end")
                                                                 .build()
                                                                 .unwrap();
        (config, definition)
    }

    #[test]
    fn resolve_unregistered_type_fails() {
        let registry = WorkflowRegistry::new();
        let err = registry.resolve(WorkflowType::InitialPrototype).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidWorkflowType(_)));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = WorkflowRegistry::new();
        let (config, definition) = dummy_entry();
        registry.register(WorkflowType::OpportunityPublish, config, definition)
                .unwrap();
        let (config, definition) = dummy_entry();
        let err = registry.register(WorkflowType::OpportunityPublish, config, definition)
                          .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidWorkflowType(_)));
    }
}
