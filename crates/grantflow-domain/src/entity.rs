//! Entidades de negocio a las que un workflow puede ligarse.
//!
//! La cadena de pertenencia determina la agencia dueña: una opportunity
//! pertenece directamente a una agencia (por `agency_code`), una
//! application pertenece a la opportunity de su competition, y una
//! application submission pertenece a su application.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub opportunity_id: Uuid,
    /// Puede ser None u apuntar a una agencia inexistente; en ese caso
    /// ninguna aprobación de agencia es posible sobre esta entidad.
    pub agency_code: Option<String>,
}

impl Opportunity {
    pub fn new(agency_code: Option<&str>) -> Self {
        Self { opportunity_id: Uuid::new_v4(),
               agency_code: agency_code.map(str::to_string) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: Uuid,
    pub opportunity_id: Uuid,
}

impl Application {
    pub fn new(opportunity_id: Uuid) -> Self {
        Self { application_id: Uuid::new_v4(),
               opportunity_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub application_submission_id: Uuid,
    pub application_id: Uuid,
}

impl ApplicationSubmission {
    pub fn new(application_id: Uuid) -> Self {
        Self { application_submission_id: Uuid::new_v4(),
               application_id }
    }
}
