//! Máquina `InitialPrototype`: doble aprobación secuencial sobre una
//! opportunity.
//!
//! ```text
//! START --start_workflow--> PENDING_PROGRAM_OFFICER_APPROVAL
//!   --receive_program_officer_approval(APPROVED)--> PENDING_BUDGET_OFFICER_APPROVAL
//!   --receive_budget_officer_approval(APPROVED)--> END (terminal)
//! ```
//! `DECLINED` en cualquiera de las dos etapas cierra en `DECLINED`
//! (terminal); `REQUIRES_MODIFICATION` reinicia el ciclo en `START`.

use grantflow_domain::{ApprovalType, Privilege, WorkflowEntityType, WorkflowType};

use crate::config::{ApprovalConfig, WorkflowConfig};
use crate::errors::WorkflowError;
use crate::machine::StateMachineDefinition;
use crate::machines::approval_event;
use crate::persistence_model::workflow_persistence_model;

pub const START: &str = "START";
pub const PENDING_PROGRAM_OFFICER_APPROVAL: &str = "PENDING_PROGRAM_OFFICER_APPROVAL";
pub const PENDING_BUDGET_OFFICER_APPROVAL: &str = "PENDING_BUDGET_OFFICER_APPROVAL";
pub const DECLINED: &str = "DECLINED";
pub const END: &str = "END";

pub const EVENT_START_WORKFLOW: &str = "start_workflow";
pub const EVENT_PROGRAM_OFFICER_APPROVAL: &str = "receive_program_officer_approval";
pub const EVENT_BUDGET_OFFICER_APPROVAL: &str = "receive_budget_officer_approval";

pub fn definition() -> Result<StateMachineDefinition, WorkflowError> {
    let builder = StateMachineDefinition::builder(START)
        .start_event(EVENT_START_WORKFLOW)
        .terminal(DECLINED)
        .terminal(END)
        .transition(START, EVENT_START_WORKFLOW, PENDING_PROGRAM_OFFICER_APPROVAL);
    let builder = approval_event(builder,
                                 PENDING_PROGRAM_OFFICER_APPROVAL,
                                 EVENT_PROGRAM_OFFICER_APPROVAL,
                                 PENDING_BUDGET_OFFICER_APPROVAL,
                                 DECLINED,
                                 START);
    let builder = approval_event(builder,
                                 PENDING_BUDGET_OFFICER_APPROVAL,
                                 EVENT_BUDGET_OFFICER_APPROVAL,
                                 END,
                                 DECLINED,
                                 START);
    builder.build()
}

pub fn config() -> WorkflowConfig {
    WorkflowConfig::new(WorkflowType::InitialPrototype,
                        vec![WorkflowEntityType::Opportunity],
                        workflow_persistence_model)
        .with_approval(EVENT_PROGRAM_OFFICER_APPROVAL,
                       ApprovalConfig::new(ApprovalType::ProgramOfficerApproval,
                                           vec![Privilege::ProgramOfficerApproval]))
        .with_approval(EVENT_BUDGET_OFFICER_APPROVAL,
                       ApprovalConfig::new(ApprovalType::BudgetOfficerApproval,
                                           vec![Privilege::BudgetOfficerApproval]))
}
