//! Autorización y efectos de aprobación de agencia.
//!
//! Los guards de este módulo son las piezas con que cada máquina arma sus
//! transiciones de aprobación: autorización por privilegio de agencia,
//! rechazo de doble aprobación, match del response type y umbral mínimo de
//! aprobaciones. El efecto `record_agency_approval` escribe la fila de
//! decisión dentro de la misma transacción que el cambio de estado.

use std::sync::Arc;

use log::debug;

use grantflow_domain::{ApprovalResponseType, User, Workflow, WorkflowApproval};

use crate::config::{ApprovalConfig, WorkflowConfig};
use crate::directory::Directory;
use crate::errors::WorkflowError;
use crate::machine::{EffectFn, GuardContext, GuardFn};

/// Predicado puro de autorización: ¿puede el usuario disparar este evento
/// de aprobación sobre este workflow?
///
/// Resuelve la agencia dueña desde la entidad ligada al workflow y verifica
/// que el usuario tenga, en esa agencia, todos los privilegios que la
/// configuración exige para el evento. Sin agencia resuelta o sin mapping
/// de aprobación para el evento, la respuesta es `false`.
pub fn can_user_do_agency_approval(user: &User,
                                   workflow: &Workflow,
                                   config: &WorkflowConfig,
                                   event_name: &str,
                                   directory: &dyn Directory)
                                   -> bool {
    let approval = match config.approval_for_event(event_name) {
        Some(approval) => approval,
        None => return false,
    };
    let agency_code = match directory.owning_agency_code(&workflow.entity) {
        Some(code) => code,
        None => return false,
    };
    let held = directory.agency_privileges(user.user_id, &agency_code);
    let authorized = approval.required_privileges.iter().all(|p| held.contains(p));
    debug!("agency approval check: user={} agency={} event={} -> {}",
           user.user_id, agency_code, event_name, authorized);
    authorized
}

/// Guard: el usuario actuante está autorizado para el evento de aprobación.
pub fn user_can_approve() -> GuardFn {
    Arc::new(|ctx: &GuardContext<'_>| {
        Ok(can_user_do_agency_approval(&ctx.event.acting_user,
                                       ctx.workflow,
                                       ctx.config,
                                       &ctx.event.event_to_send,
                                       ctx.directory))
    })
}

/// Guard: el usuario no tiene ya una aprobación vigente de este tipo.
///
/// Una doble aprobación no es "transición no permitida" sino un error con
/// tipo propio, así el emisor distingue su bug del caso estructural.
pub fn no_duplicate_approval() -> GuardFn {
    Arc::new(|ctx: &GuardContext<'_>| {
        let approval = required_approval(ctx)?;
        let duplicated =
            ctx.store
               .list_approvals(ctx.workflow.workflow_id)?
               .iter()
               .any(|row| {
                   row.is_still_valid
                   && row.approval_type == approval.approval_type
                   && row.approving_user_id == ctx.event.acting_user.user_id
               });
        if duplicated {
            return Err(WorkflowError::DuplicateApproval(
                "User already has an active approval".to_string(),
            ));
        }
        Ok(true)
    })
}

/// Guard: el response type del evento es exactamente `expected`.
///
/// Parsear acá (y no al deserializar el envelope) hace que un valor
/// inválido o ausente sea un `InvalidResponseType` del motor, antes de
/// cualquier escritura.
pub fn approval_response_is(expected: ApprovalResponseType) -> GuardFn {
    Arc::new(move |ctx: &GuardContext<'_>| {
        let response = ctx.event.parse_approval_response()?;
        Ok(response == expected)
    })
}

/// Guard de umbral: contando la aprobación que este evento está por
/// escribir, ¿se alcanza el mínimo configurado para el tipo?
///
/// Con `minimum_approvals_required = 1` este guard siempre pasa; con
/// mínimos mayores, la transición "de avance" lo usa para quedarse en el
/// estado de espera hasta juntar suficientes decisiones vigentes.
pub fn has_enough_approvals() -> GuardFn {
    Arc::new(|ctx: &GuardContext<'_>| {
        let approval = required_approval(ctx)?;
        let existing = ctx.store
                          .list_approvals(ctx.workflow.workflow_id)?
                          .iter()
                          .filter(|row| row.is_still_valid && row.approval_type == approval.approval_type)
                          .count() as u32;
        Ok(existing + 1 >= approval.minimum_approvals_required)
    })
}

/// Negación de [`has_enough_approvals`], para la transición que se queda
/// esperando más aprobaciones.
pub fn needs_more_approvals() -> GuardFn {
    let enough = has_enough_approvals();
    Arc::new(move |ctx: &GuardContext<'_>| Ok(!enough(ctx)?))
}

/// Combina guards en conjunción: todos deben pasar. Un `Err` de cualquiera
/// corta la evaluación y aborta el `send` completo.
pub fn all_of(guards: Vec<GuardFn>) -> GuardFn {
    Arc::new(move |ctx: &GuardContext<'_>| {
        for guard in &guards {
            if !guard(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}

/// Efecto: escribe la fila `WorkflowApproval` de la decisión rendida.
///
/// `REQUIRES_MODIFICATION` invalida todas las aprobaciones vigentes del
/// workflow y la fila nueva nace con `is_still_valid = false`: el ciclo se
/// reinicia limpio y la decisión de rework queda registrada pero nunca
/// cuenta para un umbral.
pub fn record_agency_approval() -> EffectFn {
    Arc::new(|ctx| {
        let approval = ctx.config
                          .approval_for_event(&ctx.event.event_to_send)
                          .ok_or_else(|| {
                              WorkflowError::InvalidEvent(format!(
                                  "no approval configuration for event {}",
                                  ctx.event.event_to_send
                              ))
                          })?;
        let response = ctx.event.parse_approval_response()?;
        let is_still_valid = response != ApprovalResponseType::RequiresModification;
        if !is_still_valid {
            ctx.model.invalidate_approvals()?;
        }
        let row = WorkflowApproval::new(ctx.model.workflow().workflow_id,
                                        approval.approval_type,
                                        ctx.event.acting_user.user_id,
                                        response,
                                        ctx.event.comment.clone(),
                                        is_still_valid);
        ctx.model.add_approval(row)
    })
}

fn required_approval<'a>(ctx: &GuardContext<'a>) -> Result<&'a ApprovalConfig, WorkflowError> {
    ctx.config
       .approval_for_event(&ctx.event.event_to_send)
       .ok_or_else(|| {
           WorkflowError::InvalidEvent(format!("no approval configuration for event {}",
                                               ctx.event.event_to_send))
       })
}
