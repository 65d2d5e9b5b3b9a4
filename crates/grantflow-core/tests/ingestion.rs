//! Ingesta e idempotencia: la historia se graba antes que cualquier
//! validación, los chequeos advisory del borde, y la barrera de reentrega.

mod support;

use serde_json::json;
use uuid::Uuid;

use grantflow_core::machines::initial_prototype::{EVENT_BUDGET_OFFICER_APPROVAL,
                                                  EVENT_PROGRAM_OFFICER_APPROVAL};
use grantflow_core::{classify_error, ingest_workflow_event, process_workflow_event, ErrorClass,
                     StartWorkflowContext, WorkflowError, WorkflowEvent, WorkflowEventType,
                     WorkflowStore};
use grantflow_domain::{WorkflowEntityType, WorkflowType};
use support::Harness;

#[test]
fn rejected_envelope_still_leaves_a_history_row() {
    let mut h = Harness::new();
    let po = h.program_officer.clone();
    let envelope = h.process_envelope(&po,
                                      Uuid::new_v4(),
                                      EVENT_PROGRAM_OFFICER_APPROVAL,
                                      Some("approved"),
                                      None);

    let err = ingest_workflow_event(&h.registry, &mut h.store, &envelope).unwrap_err();
    assert!(matches!(err, WorkflowError::WorkflowDoesNotExist(_)));
    // Recibido pero rechazable: el envelope crudo queda en la historia.
    assert_eq!(h.store.history_count(), 1);
}

#[test]
fn events_against_inactive_workflows_are_rejected_at_the_edge() {
    let mut h = Harness::new();
    let workflow = h.start_workflow();
    let po = h.program_officer.clone();
    let bo = h.budget_officer.clone();
    h.send_approval(&po, workflow.workflow_id, EVENT_PROGRAM_OFFICER_APPROVAL, "approved", None)
     .unwrap();
    h.send_approval(&bo, workflow.workflow_id, EVENT_BUDGET_OFFICER_APPROVAL, "approved", None)
     .unwrap();

    let envelope = h.process_envelope(&po,
                                      workflow.workflow_id,
                                      EVENT_PROGRAM_OFFICER_APPROVAL,
                                      Some("approved"),
                                      None);
    let err = ingest_workflow_event(&h.registry, &mut h.store, &envelope).unwrap_err();
    assert!(err.to_string().contains("Workflow is not active"));
}

#[test]
fn structurally_unknown_events_are_rejected_at_the_edge() {
    let mut h = Harness::new();
    let workflow = h.start_workflow();
    let po = h.program_officer.clone();

    let envelope =
        h.process_envelope(&po, workflow.workflow_id, "publish_to_the_moon", None, None);
    let err = ingest_workflow_event(&h.registry, &mut h.store, &envelope).unwrap_err();
    assert!(err.to_string().contains("Event is not valid for this workflow"));
}

#[test]
fn disallowed_entity_type_is_rejected_at_the_edge() {
    let mut h = Harness::new();
    let envelope = WorkflowEvent {
        event_type: WorkflowEventType::StartWorkflow,
        acting_user_id: h.program_officer.user_id,
        metadata: json!({}),
        start_workflow_context: Some(StartWorkflowContext {
            workflow_type: WorkflowType::InitialPrototype,
            entity_type: WorkflowEntityType::Application,
            entity_id: Uuid::new_v4(),
        }),
        process_workflow_context: None,
    };
    let err = ingest_workflow_event(&h.registry, &mut h.store, &envelope).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidEntityForWorkflow(_)));
}

#[test]
fn redelivering_a_processed_event_is_rejected_without_side_effects() {
    let mut h = Harness::new();
    let po = h.program_officer.clone();
    let envelope = h.start_envelope(&po);

    let event_id = ingest_workflow_event(&h.registry, &mut h.store, &envelope).unwrap();
    let outcome =
        process_workflow_event(&h.registry, &mut h.store, &h.directory, event_id).unwrap();

    let err = process_workflow_event(&h.registry, &mut h.store, &h.directory, event_id)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidEvent(_)));
    // Un solo workflow, una sola transición auditada.
    assert_eq!(h.store.list_audits(outcome.workflow.workflow_id).unwrap().len(), 1);
}

#[test]
fn failed_processing_leaves_the_event_unprocessed() {
    let mut h = Harness::new();
    let workflow = h.start_workflow();
    let outsider = h.outsider.clone();

    let envelope = h.process_envelope(&outsider,
                                      workflow.workflow_id,
                                      EVENT_PROGRAM_OFFICER_APPROVAL,
                                      Some("approved"),
                                      None);
    let event_id = ingest_workflow_event(&h.registry, &mut h.store, &envelope).unwrap();
    process_workflow_event(&h.registry, &mut h.store, &h.directory, event_id).unwrap_err();

    let history = h.store.get_history_event(event_id).unwrap().unwrap();
    assert!(!history.is_successfully_processed);
}

#[test]
fn missing_entity_fails_at_process_time() {
    let mut h = Harness::new();
    let envelope = WorkflowEvent {
        event_type: WorkflowEventType::StartWorkflow,
        acting_user_id: h.program_officer.user_id,
        metadata: json!({}),
        start_workflow_context: Some(StartWorkflowContext {
            workflow_type: WorkflowType::InitialPrototype,
            entity_type: WorkflowEntityType::Opportunity,
            entity_id: Uuid::new_v4(),
        }),
        process_workflow_context: None,
    };
    let err = h.deliver(&envelope).unwrap_err();
    assert!(matches!(err, WorkflowError::EntityNotFound(_)));
    assert_eq!(classify_error(&err), ErrorClass::NonRetryable);
}

#[test]
fn persisted_state_unknown_to_the_machine_is_fatal() {
    let mut h = Harness::new();
    let workflow = h.start_workflow();
    let po = h.program_officer.clone();

    // Fila corrupta (o escrita por otra versión de la máquina): el estado
    // persistido no existe en la definición resuelta.
    h.store
     .update_workflow_state(workflow.workflow_id, "PENDING_LEGACY_REVIEW", true)
     .unwrap();

    let err = h.send_approval(&po,
                              workflow.workflow_id,
                              EVENT_PROGRAM_OFFICER_APPROVAL,
                              "approved",
                              None)
               .unwrap_err();
    assert!(matches!(err, WorkflowError::UnexpectedState(_)));
    // Nunca se reintenta en silencio: requiere investigación manual.
    assert_eq!(classify_error(&err), ErrorClass::Fatal);
}

#[test]
fn unknown_acting_user_is_retryable() {
    let mut h = Harness::new();
    let ghost = grantflow_domain::User::new("ghost@agency.gov");
    // No registrado en el directorio.
    let envelope = h.start_envelope(&ghost);
    let err = h.deliver(&envelope).unwrap_err();
    assert!(matches!(err, WorkflowError::UserDoesNotExist(_)));
    assert_eq!(classify_error(&err), ErrorClass::Retryable);
}
