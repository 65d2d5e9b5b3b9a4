//! Orquestación de un envelope entrante.
//!
//! `EventHandler::process` es la unidad de trabajo síncrona del motor: toma
//! un envelope ya persistido en la historia, resuelve registry + workflow +
//! usuario actuante, y dispara `send`. El caller (servicio de ingesta o
//! worker) decide el alcance transaccional; acá no hay commit ni retry.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use grantflow_domain::{Workflow, WorkflowEntityRef, WorkflowEntityType, WorkflowType};

use crate::directory::Directory;
use crate::errors::WorkflowError;
use crate::listener::WorkflowAuditListener;
use crate::machine::{StateMachine, StateMachineEvent};
use crate::registry::WorkflowRegistry;
use crate::store::WorkflowStore;

/// Discriminante del envelope entrante.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEventType {
    StartWorkflow,
    ProcessWorkflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowContext {
    pub workflow_type: WorkflowType,
    pub entity_type: WorkflowEntityType,
    pub entity_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessWorkflowContext {
    pub workflow_id: Uuid,
    pub event_to_send: String,
    /// Crudo a propósito: se valida en el guard de aprobación, no acá.
    pub approval_response_type: Option<String>,
    pub comment: Option<String>,
}

/// Envelope tal como llega de la cola. La unión es por convención del
/// emisor; la validación de "contexto presente para el event_type" es del
/// motor, no del deserializador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_type: WorkflowEventType,
    pub acting_user_id: Uuid,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_workflow_context: Option<StartWorkflowContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_workflow_context: Option<ProcessWorkflowContext>,
}

pub struct EventHandler<'a> {
    registry: &'a WorkflowRegistry,
    store: &'a mut (dyn WorkflowStore + 'a),
    directory: &'a dyn Directory,
}

impl<'a> EventHandler<'a> {
    pub fn new(registry: &'a WorkflowRegistry,
               store: &'a mut (dyn WorkflowStore + 'a),
               directory: &'a dyn Directory)
               -> Self {
        Self { registry, store, directory }
    }

    /// Procesa un envelope y retorna el handle ejecutado (útil para
    /// inspección y tests). Cualquier error deja el evento de historia sin
    /// marcar como procesado; el caller rollbackea.
    pub fn process(self,
                   envelope: &WorkflowEvent,
                   history_event_id: Uuid)
                   -> Result<StateMachine<'a>, WorkflowError> {
        match envelope.event_type {
            WorkflowEventType::StartWorkflow => self.start_workflow(envelope, history_event_id),
            WorkflowEventType::ProcessWorkflow => self.process_workflow(envelope, history_event_id),
        }
    }

    fn start_workflow(self,
                      envelope: &WorkflowEvent,
                      history_event_id: Uuid)
                      -> Result<StateMachine<'a>, WorkflowError> {
        let Self { registry, store, directory } = self;
        let context = envelope.start_workflow_context.as_ref().ok_or_else(|| {
            WorkflowError::InvalidEvent("start workflow context not found for event".to_string())
        })?;

        let (config, definition) = registry.resolve(context.workflow_type)?;
        if !config.allows_entity_type(context.entity_type) {
            return Err(WorkflowError::InvalidEntityForWorkflow(format!(
                "entity type {} is not allowed for workflow type {}",
                context.entity_type, context.workflow_type
            )));
        }
        if !directory.entity_exists(context.entity_type, context.entity_id) {
            return Err(WorkflowError::EntityNotFound(format!(
                "{} {} does not exist",
                context.entity_type, context.entity_id
            )));
        }
        let acting_user = directory.get_user(envelope.acting_user_id).ok_or_else(|| {
            WorkflowError::UserDoesNotExist(format!("user {} does not exist",
                                                    envelope.acting_user_id))
        })?;

        let entity = WorkflowEntityRef::new(context.entity_type, context.entity_id);
        let workflow = Workflow::new(context.workflow_type, definition.initial_state(), entity);
        store.create_workflow(&workflow)?;
        debug!("workflow {} created for {} {}",
               workflow.workflow_id, context.entity_type, context.entity_id);

        let event = StateMachineEvent { event_to_send: definition.start_event().to_string(),
                                        acting_user,
                                        metadata: envelope.metadata.clone(),
                                        approval_response_type: None,
                                        comment: None,
                                        history_event_id };
        let mut machine = StateMachine::new(definition, config, store, directory, workflow)
            .with_listener(Box::new(WorkflowAuditListener));
        machine.send(&event)?;
        Ok(machine)
    }

    fn process_workflow(self,
                        envelope: &WorkflowEvent,
                        history_event_id: Uuid)
                        -> Result<StateMachine<'a>, WorkflowError> {
        let Self { registry, store, directory } = self;
        let context = envelope.process_workflow_context.as_ref().ok_or_else(|| {
            WorkflowError::InvalidEvent("process workflow context not found for event".to_string())
        })?;

        let workflow = store.get_workflow(context.workflow_id)?.ok_or_else(|| {
            WorkflowError::WorkflowDoesNotExist(format!("workflow {} does not exist",
                                                        context.workflow_id))
        })?;
        let (config, definition) = registry.resolve(workflow.workflow_type)?;
        let acting_user = directory.get_user(envelope.acting_user_id).ok_or_else(|| {
            WorkflowError::UserDoesNotExist(format!("user {} does not exist",
                                                    envelope.acting_user_id))
        })?;

        // Pre-check diagnóstico contra el estado persistido; `send` es el
        // chequeo autoritativo y el único que decide.
        if definition.candidates(&workflow.current_workflow_state, &context.event_to_send)
                     .is_none()
        {
            warn!("event {} has no transition from state {} of workflow {}",
                  context.event_to_send, workflow.current_workflow_state, workflow.workflow_id);
        }

        let event = StateMachineEvent { event_to_send: context.event_to_send.clone(),
                                        acting_user,
                                        metadata: envelope.metadata.clone(),
                                        approval_response_type: context.approval_response_type
                                                                       .clone(),
                                        comment: context.comment.clone(),
                                        history_event_id };
        let mut machine = StateMachine::new(definition, config, store, directory, workflow)
            .with_listener(Box::new(WorkflowAuditListener));
        machine.send(&event)?;
        Ok(machine)
    }
}
