//! grantflow-domain: modelo de datos durable del motor de workflows.
//!
//! Contiene las filas persistibles (`Workflow`, `WorkflowAudit`,
//! `WorkflowApproval`, `WorkflowEventHistory`), los enums de lookup y los
//! registros de directorio (usuarios, agencias, entidades de negocio).
//! Ninguna de estas estructuras conoce la base de datos: el mapeo a filas
//! reales vive en `grantflow-persistence`.

pub mod approval;
pub mod audit;
pub mod constants;
pub mod entity;
pub mod errors;
pub mod history;
pub mod user;
pub mod workflow;

pub use approval::WorkflowApproval;
pub use audit::WorkflowAudit;
pub use constants::{ApprovalResponseType, ApprovalType, Privilege, WorkflowEntityType, WorkflowType};
pub use entity::{Application, ApplicationSubmission, Opportunity};
pub use errors::DomainError;
pub use history::WorkflowEventHistory;
pub use user::User;
pub use workflow::{Workflow, WorkflowEntityRef};
