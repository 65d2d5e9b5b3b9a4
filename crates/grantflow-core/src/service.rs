//! Servicio de ingesta: historia primero, proceso después.
//!
//! La entrega es at-least-once, así que la regla es grabar el envelope
//! crudo en `WorkflowEventHistory` ANTES de cualquier validación: aunque el
//! envelope sea basura, queda evidencia de que llegó. El procesamiento real
//! es un paso separado que marca `is_successfully_processed` recién cuando
//! la transición completa quedó aplicada.

use log::{debug, info};
use uuid::Uuid;

use grantflow_domain::{Workflow, WorkflowEventHistory};

use crate::directory::Directory;
use crate::errors::WorkflowError;
use crate::handler::{EventHandler, WorkflowEvent, WorkflowEventType};
use crate::machine::ExecutedTransition;
use crate::registry::WorkflowRegistry;
use crate::store::WorkflowStore;

/// Resultado de un `process_workflow_event` exitoso.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub workflow: Workflow,
    pub executed: Vec<ExecutedTransition>,
}

/// Graba el envelope en la historia y corre los chequeos advisory que
/// detectan envíos obviamente malos en el borde.
///
/// El append a la historia sobrevive a un chequeo fallido: un `Err` de acá
/// significa "recibido pero rechazable", no "no recibido". Los chequeos son
/// diagnósticos; el veredicto final sobre la transición lo da `send` dentro
/// de `process_workflow_event`.
pub fn ingest_workflow_event(registry: &WorkflowRegistry,
                             store: &mut dyn WorkflowStore,
                             envelope: &WorkflowEvent)
                             -> Result<Uuid, WorkflowError> {
    let payload = serde_json::to_value(envelope)
        .map_err(|e| WorkflowError::Store(format!("cannot serialize envelope: {e}")))?;
    let history = WorkflowEventHistory::new(payload);
    store.add_history_event(&history)?;
    debug!("history event {} recorded", history.event_id);

    match envelope.event_type {
        WorkflowEventType::StartWorkflow => {
            let context = envelope.start_workflow_context.as_ref().ok_or_else(|| {
                WorkflowError::InvalidEvent(
                    "start workflow context not found for event".to_string(),
                )
            })?;
            let (config, _) = registry.resolve(context.workflow_type)?;
            if !config.allows_entity_type(context.entity_type) {
                return Err(WorkflowError::InvalidEntityForWorkflow(format!(
                    "entity type {} is not allowed for workflow type {}",
                    context.entity_type, context.workflow_type
                )));
            }
        }
        WorkflowEventType::ProcessWorkflow => {
            let context = envelope.process_workflow_context.as_ref().ok_or_else(|| {
                WorkflowError::InvalidEvent(
                    "process workflow context not found for event".to_string(),
                )
            })?;
            let workflow = store.get_workflow(context.workflow_id)?.ok_or_else(|| {
                WorkflowError::WorkflowDoesNotExist(format!("workflow {} does not exist",
                                                            context.workflow_id))
            })?;
            if !workflow.is_active {
                return Err(WorkflowError::InvalidEvent("Workflow is not active".to_string()));
            }
            let (_, definition) = registry.resolve(workflow.workflow_type)?;
            if !definition.is_valid_event(&context.event_to_send) {
                return Err(WorkflowError::InvalidEvent(
                    "Event is not valid for this workflow".to_string(),
                ));
            }
        }
    }
    Ok(history.event_id)
}

/// Procesa un evento ya ingresado: deserializa el envelope desde la
/// historia, ejecuta el handler y deja el flag de procesado prendido sólo
/// si la transición completa tuvo éxito.
///
/// Reentregar un evento ya procesado falla con `InvalidEvent` sin tocar
/// nada: el flag persistido es la barrera de idempotencia.
pub fn process_workflow_event(registry: &WorkflowRegistry,
                              store: &mut dyn WorkflowStore,
                              directory: &dyn Directory,
                              event_id: Uuid)
                              -> Result<ProcessOutcome, WorkflowError> {
    let history = store.get_history_event(event_id)?.ok_or_else(|| {
        WorkflowError::InvalidEvent(format!("history event {event_id} does not exist"))
    })?;
    if history.is_successfully_processed {
        return Err(WorkflowError::InvalidEvent(format!(
            "history event {event_id} was already processed"
        )));
    }
    let envelope: WorkflowEvent = serde_json::from_value(history.payload).map_err(|e| {
        WorkflowError::InvalidEvent(format!("history event {event_id} is not a workflow event: {e}"))
    })?;

    let outcome = {
        let handler = EventHandler::new(registry, &mut *store, directory);
        let machine = handler.process(&envelope, event_id)?;
        ProcessOutcome { executed: machine.executed().to_vec(),
                         workflow: machine.into_workflow() }
    };
    store.mark_history_processed(event_id)?;
    info!("history event {} processed: workflow {} now in {}",
          event_id, outcome.workflow.workflow_id, outcome.workflow.current_workflow_state);
    Ok(outcome)
}
