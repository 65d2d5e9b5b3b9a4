//! Soporte común de los tests Postgres. Todos los tests se saltean si no
//! hay `DATABASE_URL` en el entorno.
#![allow(dead_code)]

use diesel::connection::SimpleConnection;
use once_cell::sync::Lazy;

use grantflow_core::machines;
use grantflow_core::{InMemoryDirectory, WorkflowRegistry};
use grantflow_domain::{Opportunity, Privilege, User};
use grantflow_persistence::config::DbConfig;
use grantflow_persistence::pg::{build_pool, PgPool, PoolProvider};
use uuid::Uuid;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env();
    match build_pool(&cfg.url, 1, 2) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    TEST_POOL.as_ref().map(|p| f(p))
}

pub fn provider() -> Option<PoolProvider> {
    with_pool(|p| PoolProvider { pool: p.clone() })
}

/// Limpia las tablas del motor entre tests (orden por FKs).
pub fn truncate_tables(pool: &PgPool) {
    let mut conn = pool.get().expect("conn");
    conn.batch_execute(
        "TRUNCATE workflow_approval, workflow_audit, workflow_event_history, workflow CASCADE;",
    )
    .expect("truncate");
}

pub const AGENCY: &str = "AGY-PG";

/// Fixture estándar: registry con el catálogo real y directorio en memoria
/// con una opportunity y sus dos oficiales.
pub struct Fixture {
    pub registry: WorkflowRegistry,
    pub directory: InMemoryDirectory,
    pub program_officer: User,
    pub budget_officer: User,
    pub opportunity_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let mut registry = WorkflowRegistry::new();
        machines::register_workflows(&mut registry).expect("registry");

        let mut directory = InMemoryDirectory::new();
        let program_officer = User::new("pg.program.officer@agency.gov");
        let budget_officer = User::new("pg.budget.officer@agency.gov");
        directory.add_user(program_officer.clone());
        directory.add_user(budget_officer.clone());
        let opportunity_id =
            directory.add_opportunity(Opportunity { opportunity_id: Uuid::new_v4(),
                                                    agency_code: Some(AGENCY.to_string()) });
        directory.grant_privilege(program_officer.user_id,
                                  AGENCY,
                                  Privilege::ProgramOfficerApproval);
        directory.grant_privilege(budget_officer.user_id,
                                  AGENCY,
                                  Privilege::BudgetOfficerApproval);

        Self { registry, directory, program_officer, budget_officer, opportunity_id }
    }
}
