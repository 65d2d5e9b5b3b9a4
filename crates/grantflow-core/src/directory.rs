//! Directorios externos: usuarios, entidades de negocio y privilegios.
//!
//! El motor no es dueño de estos datos; sólo los consulta. `Directory` es el
//! contrato de colaborador y `InMemoryDirectory` la implementación para
//! tests y demo. En producción, estas consultas resuelven contra las tablas
//! de usuarios/agencias del sistema anfitrión.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use grantflow_domain::{Application, ApplicationSubmission, Opportunity, Privilege, User,
                       WorkflowEntityRef, WorkflowEntityType};

pub trait Directory {
    fn get_user(&self, user_id: Uuid) -> Option<User>;
    fn get_opportunity(&self, opportunity_id: Uuid) -> Option<Opportunity>;
    fn get_application(&self, application_id: Uuid) -> Option<Application>;
    fn get_application_submission(&self, submission_id: Uuid) -> Option<ApplicationSubmission>;
    /// Privilegios que el usuario tiene asignados dentro de una agencia.
    fn agency_privileges(&self, user_id: Uuid, agency_code: &str) -> HashSet<Privilege>;

    fn entity_exists(&self, entity_type: WorkflowEntityType, entity_id: Uuid) -> bool {
        match entity_type {
            WorkflowEntityType::Opportunity => self.get_opportunity(entity_id).is_some(),
            WorkflowEntityType::Application => self.get_application(entity_id).is_some(),
            WorkflowEntityType::ApplicationSubmission => {
                self.get_application_submission(entity_id).is_some()
            }
        }
    }

    /// Resuelve la agencia dueña de la entidad ligada al workflow,
    /// caminando la cadena de pertenencia: submission -> application ->
    /// opportunity -> agency_code. `None` si algún eslabón falta o la
    /// opportunity no tiene agencia.
    fn owning_agency_code(&self, entity: &WorkflowEntityRef) -> Option<String> {
        let opportunity_id = match *entity {
            WorkflowEntityRef::Opportunity(id) => id,
            WorkflowEntityRef::Application(id) => self.get_application(id)?.opportunity_id,
            WorkflowEntityRef::ApplicationSubmission(id) => {
                let application_id = self.get_application_submission(id)?.application_id;
                self.get_application(application_id)?.opportunity_id
            }
        };
        self.get_opportunity(opportunity_id)?.agency_code
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: HashMap<Uuid, User>,
    opportunities: HashMap<Uuid, Opportunity>,
    applications: HashMap<Uuid, Application>,
    submissions: HashMap<Uuid, ApplicationSubmission>,
    // (user, agency_code) -> privilegios
    privileges: HashMap<(Uuid, String), HashSet<Privilege>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user: User) -> Uuid {
        let id = user.user_id;
        self.users.insert(id, user);
        id
    }

    pub fn add_opportunity(&mut self, opportunity: Opportunity) -> Uuid {
        let id = opportunity.opportunity_id;
        self.opportunities.insert(id, opportunity);
        id
    }

    pub fn add_application(&mut self, application: Application) -> Uuid {
        let id = application.application_id;
        self.applications.insert(id, application);
        id
    }

    pub fn add_application_submission(&mut self, submission: ApplicationSubmission) -> Uuid {
        let id = submission.application_submission_id;
        self.submissions.insert(id, submission);
        id
    }

    pub fn grant_privilege(&mut self, user_id: Uuid, agency_code: &str, privilege: Privilege) {
        self.privileges
            .entry((user_id, agency_code.to_string()))
            .or_default()
            .insert(privilege);
    }
}

impl Directory for InMemoryDirectory {
    fn get_user(&self, user_id: Uuid) -> Option<User> {
        self.users.get(&user_id).cloned()
    }

    fn get_opportunity(&self, opportunity_id: Uuid) -> Option<Opportunity> {
        self.opportunities.get(&opportunity_id).cloned()
    }

    fn get_application(&self, application_id: Uuid) -> Option<Application> {
        self.applications.get(&application_id).cloned()
    }

    fn get_application_submission(&self, submission_id: Uuid) -> Option<ApplicationSubmission> {
        self.submissions.get(&submission_id).cloned()
    }

    fn agency_privileges(&self, user_id: Uuid, agency_code: &str) -> HashSet<Privilege> {
        self.privileges
            .get(&(user_id, agency_code.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
