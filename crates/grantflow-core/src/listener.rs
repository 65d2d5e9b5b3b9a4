//! Listeners de transición.
//!
//! Un listener observa cada transición exitosa ANTES de los efectos del
//! template y escribe en el mismo adapter de persistencia, así sus filas
//! viven o mueren con la transición.

use log::debug;

use grantflow_domain::WorkflowAudit;

use crate::errors::WorkflowError;
use crate::machine::EffectContext;

pub trait TransitionListener {
    fn on_transition(&self, ctx: &mut EffectContext<'_>) -> Result<(), WorkflowError>;
}

/// Listener estándar: una fila de auditoría por transición ejecutada.
///
/// Captura quién envió el evento, desde qué estado, hacia qué estado, y el
/// id del evento de historia que lo originó (si el envío vino del servicio
/// de ingesta).
#[derive(Debug, Default)]
pub struct WorkflowAuditListener;

impl TransitionListener for WorkflowAuditListener {
    fn on_transition(&self, ctx: &mut EffectContext<'_>) -> Result<(), WorkflowError> {
        let workflow = ctx.model.workflow();
        let audit = WorkflowAudit::new(workflow.workflow_id,
                                       ctx.event.acting_user.user_id,
                                       &ctx.event.event_to_send,
                                       ctx.source_state,
                                       ctx.target_state,
                                       ctx.event.history_event_id,
                                       ctx.event.metadata.clone());
        debug!("audit: workflow={} event={} {} -> {}",
               audit.workflow_id, audit.transition_event, audit.source_state, audit.target_state);
        ctx.model.add_audit(audit)
    }
}
