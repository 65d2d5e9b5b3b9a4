//! Catálogo de máquinas concretas.
//!
//! Cada submódulo define un tipo de workflow completo: constantes de estados
//! y eventos, la `StateMachineDefinition` y su `WorkflowConfig`.
//! `register_workflows` arma el registry de arranque con todas.

pub mod initial_prototype;

use grantflow_domain::ApprovalResponseType;

use crate::approval::{all_of, approval_response_is, has_enough_approvals, needs_more_approvals,
                      no_duplicate_approval, record_agency_approval, user_can_approve};
use crate::errors::WorkflowError;
use crate::machine::{StateMachineDefinitionBuilder, Transition};
use crate::registry::WorkflowRegistry;

/// Registra todas las máquinas del catálogo. Se llama una vez en el
/// arranque; un duplicado acá es un defecto de construcción.
pub fn register_workflows(registry: &mut WorkflowRegistry) -> Result<(), WorkflowError> {
    registry.register(grantflow_domain::WorkflowType::InitialPrototype,
                      initial_prototype::config(),
                      initial_prototype::definition()?)
}

/// Cablea un evento de aprobación de agencia completo sobre `source`:
/// cuatro candidatos en orden, todos autorizados por privilegio y
/// protegidos contra doble aprobación.
///
/// 1. `APPROVED` con el mínimo alcanzado avanza a `approved_target`.
/// 2. `APPROVED` sin el mínimo se queda en `source` (la decisión igual se
///    registra y cuenta para el umbral del próximo evento).
/// 3. `DECLINED` va a `declined_target`.
/// 4. `REQUIRES_MODIFICATION` vuelve a `rework_target` invalidando las
///    aprobaciones vigentes.
pub fn approval_event(builder: StateMachineDefinitionBuilder,
                      source: &str,
                      event: &str,
                      approved_target: &str,
                      declined_target: &str,
                      rework_target: &str)
                      -> StateMachineDefinitionBuilder {
    builder.add(source,
                event,
                Transition::to(approved_target)
                    .guarded(all_of(vec![user_can_approve(),
                                         no_duplicate_approval(),
                                         approval_response_is(ApprovalResponseType::Approved),
                                         has_enough_approvals()]))
                    .with_effect(record_agency_approval()))
           .add(source,
                event,
                Transition::to(source)
                    .guarded(all_of(vec![user_can_approve(),
                                         no_duplicate_approval(),
                                         approval_response_is(ApprovalResponseType::Approved),
                                         needs_more_approvals()]))
                    .with_effect(record_agency_approval()))
           .add(source,
                event,
                Transition::to(declined_target)
                    .guarded(all_of(vec![user_can_approve(),
                                         no_duplicate_approval(),
                                         approval_response_is(ApprovalResponseType::Declined)]))
                    .with_effect(record_agency_approval()))
           .add(source,
                event,
                Transition::to(rework_target)
                    .guarded(all_of(vec![user_can_approve(),
                                         no_duplicate_approval(),
                                         approval_response_is(ApprovalResponseType::RequiresModification)]))
                    .with_effect(record_agency_approval()))
}
