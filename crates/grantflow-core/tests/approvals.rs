//! Reglas de aprobación: umbral mínimo de aprobaciones, doble aprobación y
//! validación del response type. Usa una máquina de publicación con mínimo
//! de dos aprobaciones para ejercer el self-loop de espera.

use serde_json::json;
use uuid::Uuid;

use grantflow_core::machines::approval_event;
use grantflow_core::{ingest_workflow_event, process_workflow_event, ApprovalConfig,
                     InMemoryDirectory, InMemoryWorkflowStore, ProcessOutcome,
                     ProcessWorkflowContext, StartWorkflowContext, StateMachineDefinition,
                     workflow_persistence_model, WorkflowConfig, WorkflowError, WorkflowEvent,
                     WorkflowEventType, WorkflowRegistry, WorkflowStore};
use grantflow_domain::{ApprovalResponseType, Opportunity, Privilege, User, WorkflowEntityType,
                       WorkflowType};

const AGENCY: &str = "AGY-002";
const PENDING: &str = "PENDING_PROGRAM_OFFICER_APPROVAL";
const EVENT_APPROVAL: &str = "receive_program_officer_approval";

fn publish_definition() -> StateMachineDefinition {
    let builder = StateMachineDefinition::builder("START")
        .terminal("DECLINED")
        .terminal("END")
        .transition("START", "start_workflow", PENDING);
    approval_event(builder, PENDING, EVENT_APPROVAL, "END", "DECLINED", "START").build()
                                                                               .unwrap()
}

fn publish_config(minimum: u32) -> WorkflowConfig {
    WorkflowConfig::new(WorkflowType::OpportunityPublish,
                        vec![WorkflowEntityType::Opportunity],
                        workflow_persistence_model)
        .with_approval(EVENT_APPROVAL,
                       ApprovalConfig::new(grantflow_domain::ApprovalType::ProgramOfficerApproval,
                                           vec![Privilege::ProgramOfficerApproval])
                           .with_minimum_approvals(minimum))
}

struct Fixture {
    registry: WorkflowRegistry,
    store: InMemoryWorkflowStore,
    directory: InMemoryDirectory,
    first_officer: User,
    second_officer: User,
    opportunity_id: Uuid,
}

impl Fixture {
    fn new(minimum: u32) -> Self {
        let mut registry = WorkflowRegistry::new();
        registry.register(WorkflowType::OpportunityPublish,
                          publish_config(minimum),
                          publish_definition())
                .unwrap();

        let mut directory = InMemoryDirectory::new();
        let first_officer = User::new("first.po@agency.gov");
        let second_officer = User::new("second.po@agency.gov");
        directory.add_user(first_officer.clone());
        directory.add_user(second_officer.clone());
        let opportunity_id =
            directory.add_opportunity(Opportunity { opportunity_id: Uuid::new_v4(),
                                                    agency_code: Some(AGENCY.to_string()) });
        directory.grant_privilege(first_officer.user_id, AGENCY, Privilege::ProgramOfficerApproval);
        directory.grant_privilege(second_officer.user_id, AGENCY, Privilege::ProgramOfficerApproval);

        Self { registry,
               store: InMemoryWorkflowStore::new(),
               directory,
               first_officer,
               second_officer,
               opportunity_id }
    }

    fn deliver(&mut self, envelope: &WorkflowEvent) -> Result<ProcessOutcome, WorkflowError> {
        let event_id = ingest_workflow_event(&self.registry, &mut self.store, envelope)?;
        process_workflow_event(&self.registry, &mut self.store, &self.directory, event_id)
    }

    fn start(&mut self) -> Uuid {
        let envelope = WorkflowEvent {
            event_type: WorkflowEventType::StartWorkflow,
            acting_user_id: self.first_officer.user_id,
            metadata: json!({}),
            start_workflow_context: Some(StartWorkflowContext {
                workflow_type: WorkflowType::OpportunityPublish,
                entity_type: WorkflowEntityType::Opportunity,
                entity_id: self.opportunity_id,
            }),
            process_workflow_context: None,
        };
        self.deliver(&envelope).unwrap().workflow.workflow_id
    }

    fn approve(&mut self,
               actor_id: Uuid,
               workflow_id: Uuid,
               response: Option<&str>)
               -> Result<ProcessOutcome, WorkflowError> {
        let envelope = WorkflowEvent {
            event_type: WorkflowEventType::ProcessWorkflow,
            acting_user_id: actor_id,
            metadata: json!({}),
            start_workflow_context: None,
            process_workflow_context: Some(ProcessWorkflowContext {
                workflow_id,
                event_to_send: EVENT_APPROVAL.to_string(),
                approval_response_type: response.map(str::to_string),
                comment: None,
            }),
        };
        self.deliver(&envelope)
    }
}

#[test]
fn approval_below_minimum_stays_in_pending_but_records_the_decision() {
    let mut f = Fixture::new(2);
    let workflow_id = f.start();
    let first = f.first_officer.user_id;

    let outcome = f.approve(first, workflow_id, Some("approved")).unwrap();
    assert_eq!(outcome.workflow.current_workflow_state, PENDING);
    assert!(outcome.workflow.is_active);

    let approvals = f.store.list_approvals(workflow_id).unwrap();
    assert_eq!(approvals.len(), 1);
    assert!(approvals[0].is_still_valid);
    // El self-loop también audita: start + aprobación en espera.
    assert_eq!(f.store.list_audits(workflow_id).unwrap().len(), 2);
}

#[test]
fn reaching_the_minimum_advances_the_workflow() {
    let mut f = Fixture::new(2);
    let workflow_id = f.start();
    let first = f.first_officer.user_id;
    let second = f.second_officer.user_id;

    f.approve(first, workflow_id, Some("approved")).unwrap();
    let outcome = f.approve(second, workflow_id, Some("approved")).unwrap();

    assert_eq!(outcome.workflow.current_workflow_state, "END");
    assert!(!outcome.workflow.is_active);
    let approvals = f.store.list_approvals(workflow_id).unwrap();
    assert_eq!(approvals.len(), 2);
    assert!(approvals.iter().all(|a| a.is_still_valid));
}

#[test]
fn same_user_cannot_approve_twice() {
    let mut f = Fixture::new(2);
    let workflow_id = f.start();
    let first = f.first_officer.user_id;

    f.approve(first, workflow_id, Some("approved")).unwrap();
    let err = f.approve(first, workflow_id, Some("approved")).unwrap_err();

    assert!(matches!(err, WorkflowError::DuplicateApproval(_)));
    assert!(err.to_string().contains("User already has an active approval"));
    assert_eq!(f.store.list_approvals(workflow_id).unwrap().len(), 1);
}

#[test]
fn missing_response_type_is_rejected_before_any_write() {
    let mut f = Fixture::new(1);
    let workflow_id = f.start();
    let first = f.first_officer.user_id;

    let err = f.approve(first, workflow_id, None).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidResponseType(_)));
    assert!(err.to_string()
               .contains("approval response type not found for state machine event"));
    assert!(f.store.list_approvals(workflow_id).unwrap().is_empty());
    assert_eq!(f.store.list_audits(workflow_id).unwrap().len(), 1);
}

#[test]
fn unknown_response_type_is_rejected_before_any_write() {
    let mut f = Fixture::new(1);
    let workflow_id = f.start();
    let first = f.first_officer.user_id;

    let err = f.approve(first, workflow_id, Some("sideways")).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidResponseType(_)));
    assert!(err.to_string().contains("approval response type is not a valid value"));
    assert!(f.store.list_approvals(workflow_id).unwrap().is_empty());
}

#[test]
fn rework_restarts_the_approval_count() {
    let mut f = Fixture::new(2);
    let workflow_id = f.start();
    let first = f.first_officer.user_id;
    let second = f.second_officer.user_id;

    f.approve(first, workflow_id, Some("approved")).unwrap();
    let outcome = f.approve(second, workflow_id, Some("requires_modification")).unwrap();
    assert_eq!(outcome.workflow.current_workflow_state, "START");

    let approvals = f.store.list_approvals(workflow_id).unwrap();
    assert_eq!(approvals.len(), 2);
    assert!(approvals.iter().all(|a| !a.is_still_valid));
    assert!(approvals.iter().any(|a| {
                a.approval_response_type == ApprovalResponseType::RequiresModification
            }));

    // De vuelta en el ciclo, el primer oficial puede aprobar otra vez: su
    // aprobación anterior ya no cuenta como vigente.
    let restart = WorkflowEvent {
        event_type: WorkflowEventType::ProcessWorkflow,
        acting_user_id: first,
        metadata: json!({}),
        start_workflow_context: None,
        process_workflow_context: Some(ProcessWorkflowContext {
            workflow_id,
            event_to_send: "start_workflow".to_string(),
            approval_response_type: None,
            comment: None,
        }),
    };
    f.deliver(&restart).unwrap();
    let outcome = f.approve(first, workflow_id, Some("approved")).unwrap();
    assert_eq!(outcome.workflow.current_workflow_state, PENDING);
}
