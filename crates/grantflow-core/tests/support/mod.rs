//! Harness compartido por los tests de integración: registry con el
//! catálogo real, directorio en memoria con una agencia y sus oficiales, y
//! el camino completo ingest -> process para cada envelope.
#![allow(dead_code)]

use serde_json::json;
use uuid::Uuid;

use grantflow_core::machines;
use grantflow_core::{ingest_workflow_event, process_workflow_event, InMemoryDirectory,
                     InMemoryWorkflowStore, ProcessOutcome, ProcessWorkflowContext,
                     StartWorkflowContext, WorkflowError, WorkflowEvent, WorkflowEventType,
                     WorkflowRegistry};
use grantflow_domain::{Opportunity, Privilege, User, Workflow, WorkflowEntityType, WorkflowType};

pub const AGENCY: &str = "AGY-001";

pub struct Harness {
    pub registry: WorkflowRegistry,
    pub store: InMemoryWorkflowStore,
    pub directory: InMemoryDirectory,
    pub program_officer: User,
    pub budget_officer: User,
    pub outsider: User,
    pub opportunity_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        let mut registry = WorkflowRegistry::new();
        machines::register_workflows(&mut registry).unwrap();

        let mut directory = InMemoryDirectory::new();
        let program_officer = User::new("program.officer@agency.gov");
        let budget_officer = User::new("budget.officer@agency.gov");
        let outsider = User::new("outsider@elsewhere.gov");
        directory.add_user(program_officer.clone());
        directory.add_user(budget_officer.clone());
        directory.add_user(outsider.clone());

        let opportunity_id =
            directory.add_opportunity(Opportunity { opportunity_id: Uuid::new_v4(),
                                                    agency_code: Some(AGENCY.to_string()) });
        directory.grant_privilege(program_officer.user_id,
                                  AGENCY,
                                  Privilege::ProgramOfficerApproval);
        directory.grant_privilege(budget_officer.user_id,
                                  AGENCY,
                                  Privilege::BudgetOfficerApproval);

        Self { registry,
               store: InMemoryWorkflowStore::new(),
               directory,
               program_officer,
               budget_officer,
               outsider,
               opportunity_id }
    }

    pub fn start_envelope(&self, actor: &User) -> WorkflowEvent {
        WorkflowEvent { event_type: WorkflowEventType::StartWorkflow,
                        acting_user_id: actor.user_id,
                        metadata: json!({"channel": "test"}),
                        start_workflow_context:
                            Some(StartWorkflowContext { workflow_type:
                                                            WorkflowType::InitialPrototype,
                                                        entity_type:
                                                            WorkflowEntityType::Opportunity,
                                                        entity_id: self.opportunity_id }),
                        process_workflow_context: None }
    }

    pub fn process_envelope(&self,
                            actor: &User,
                            workflow_id: Uuid,
                            event_to_send: &str,
                            approval_response_type: Option<&str>,
                            comment: Option<&str>)
                            -> WorkflowEvent {
        WorkflowEvent { event_type: WorkflowEventType::ProcessWorkflow,
                        acting_user_id: actor.user_id,
                        metadata: json!({"channel": "test"}),
                        start_workflow_context: None,
                        process_workflow_context:
                            Some(ProcessWorkflowContext { workflow_id,
                                                          event_to_send: event_to_send.to_string(),
                                                          approval_response_type:
                                                              approval_response_type
                                                                  .map(str::to_string),
                                                          comment: comment.map(str::to_string) }) }
    }

    /// Camino completo de entrega: ingesta (historia primero) y proceso.
    pub fn deliver(&mut self, envelope: &WorkflowEvent) -> Result<ProcessOutcome, WorkflowError> {
        let event_id = ingest_workflow_event(&self.registry, &mut self.store, envelope)?;
        process_workflow_event(&self.registry, &mut self.store, &self.directory, event_id)
    }

    /// Arranca un workflow `InitialPrototype` sobre la opportunity del
    /// harness y retorna la fila resultante.
    pub fn start_workflow(&mut self) -> Workflow {
        let actor = self.program_officer.clone();
        self.deliver(&self.start_envelope(&actor)).unwrap().workflow
    }

    pub fn send_approval(&mut self,
                         actor: &User,
                         workflow_id: Uuid,
                         event_to_send: &str,
                         response: &str,
                         comment: Option<&str>)
                         -> Result<ProcessOutcome, WorkflowError> {
        let actor = actor.clone();
        let envelope =
            self.process_envelope(&actor, workflow_id, event_to_send, Some(response), comment);
        self.deliver(&envelope)
    }
}
