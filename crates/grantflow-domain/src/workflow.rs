//! Fila durable `Workflow` y su referencia de entidad.
//!
//! La referencia de entidad es un sum type: un workflow apunta a exactamente
//! UNA entidad de negocio (opportunity, application o application
//! submission). El invariante "exactamente una" queda garantizado por
//! construcción; `from_columns` lo re-valida en la frontera con la base de
//! datos, donde las tres columnas nullable podrían violarlo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{WorkflowEntityType, WorkflowType};
use crate::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id", rename_all = "snake_case")]
pub enum WorkflowEntityRef {
    Opportunity(Uuid),
    Application(Uuid),
    ApplicationSubmission(Uuid),
}

impl WorkflowEntityRef {
    pub fn new(entity_type: WorkflowEntityType, entity_id: Uuid) -> Self {
        match entity_type {
            WorkflowEntityType::Opportunity => Self::Opportunity(entity_id),
            WorkflowEntityType::Application => Self::Application(entity_id),
            WorkflowEntityType::ApplicationSubmission => Self::ApplicationSubmission(entity_id),
        }
    }

    pub fn entity_type(&self) -> WorkflowEntityType {
        match self {
            Self::Opportunity(_) => WorkflowEntityType::Opportunity,
            Self::Application(_) => WorkflowEntityType::Application,
            Self::ApplicationSubmission(_) => WorkflowEntityType::ApplicationSubmission,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::Opportunity(id) | Self::Application(id) | Self::ApplicationSubmission(id) => *id,
        }
    }

    /// Reconstruye la referencia desde las tres columnas nullable de la
    /// tabla. Cero o más de una columna presente es corrupción de datos.
    pub fn from_columns(opportunity_id: Option<Uuid>,
                        application_id: Option<Uuid>,
                        application_submission_id: Option<Uuid>)
                        -> Result<Self, DomainError> {
        match (opportunity_id, application_id, application_submission_id) {
            (Some(id), None, None) => Ok(Self::Opportunity(id)),
            (None, Some(id), None) => Ok(Self::Application(id)),
            (None, None, Some(id)) => Ok(Self::ApplicationSubmission(id)),
            _ => Err(DomainError::InvalidEntityReference),
        }
    }

    /// Descompone la referencia en las tres columnas nullable.
    pub fn to_columns(&self) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Opportunity(id) => (Some(*id), None, None),
            Self::Application(id) => (None, Some(*id), None),
            Self::ApplicationSubmission(id) => (None, None, Some(*id)),
        }
    }
}

/// Instancia durable de una máquina de estados, ligada a una entidad.
///
/// Se crea con un evento START, se muta in-place con cada evento PROCESS y
/// nunca se borra. `is_active` se apaga al alcanzar un estado terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: Uuid,
    pub workflow_type: WorkflowType,
    pub current_workflow_state: String,
    pub is_active: bool,
    pub entity: WorkflowEntityRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Crea un workflow nuevo en el estado inicial de su tipo.
    pub fn new(workflow_type: WorkflowType, initial_state: &str, entity: WorkflowEntityRef) -> Self {
        let now = Utc::now();
        Self { workflow_id: Uuid::new_v4(),
               workflow_type,
               current_workflow_state: initial_state.to_string(),
               is_active: true,
               entity,
               created_at: now,
               updated_at: now }
    }
}
