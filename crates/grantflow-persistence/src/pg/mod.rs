//! Implementación Postgres (Diesel) del `WorkflowStore` del core.
//!
//! Objetivo general del módulo:
//! - Proveer una capa de persistencia durable con paridad 1:1 respecto al
//!   backend en memoria de grantflow-core.
//! - Garantizar la atomicidad del contrato: carga de la fila de workflow
//!   con lock (`FOR UPDATE`), evaluación de guards, escritura de estado,
//!   audit y approval en UNA transacción read-write.
//! - Aislar completamente el mapeo dominio <-> filas de DB del core.
//!
//! El store en sí no abre transacciones: opera sobre la conexión que le
//! presta el wrapper (`ingest_event_in_transaction` /
//! `process_event_in_transaction`), que también maneja el retry con backoff
//! para errores transitorios.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use grantflow_core::service::{ingest_workflow_event, process_workflow_event, ProcessOutcome};
use grantflow_core::{Directory, WorkflowError, WorkflowEvent, WorkflowRegistry, WorkflowStore};
use grantflow_domain::{Workflow, WorkflowApproval, WorkflowAudit, WorkflowEntityRef,
                       WorkflowEventHistory, WorkflowType};

use crate::error::{is_retryable, PersistenceError};
use crate::migrations::run_pending_migrations;
use crate::schema::{workflow, workflow_approval, workflow_audit, workflow_event_history};

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Al construirlo se corre automáticamente el set de migraciones pendientes
/// (una sola vez).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// simular en tests unitarios sin acoplar a r2d2. Debe devolver una
/// conexión válida o `PersistenceError::TransientIo` en caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self)
                  -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>,
                            PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self)
                  -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>,
                            PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Filas Diesel y mapeo dominio <-> tabla
// ---------------------------------------------------------------------------

#[derive(Queryable, Debug)]
pub struct WorkflowRow {
    pub workflow_id: Uuid,
    pub workflow_type: String,
    pub current_workflow_state: String,
    pub is_active: bool,
    pub opportunity_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub application_submission_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn into_domain(self) -> Result<Workflow, WorkflowError> {
        let workflow_type: WorkflowType = self.workflow_type.parse().map_err(|e| {
            WorkflowError::Store(format!("workflow {}: {e}", self.workflow_id))
        })?;
        let entity = WorkflowEntityRef::from_columns(self.opportunity_id,
                                                     self.application_id,
                                                     self.application_submission_id)
            .map_err(|e| WorkflowError::Store(format!("workflow {}: {e}", self.workflow_id)))?;
        Ok(Workflow { workflow_id: self.workflow_id,
                      workflow_type,
                      current_workflow_state: self.current_workflow_state,
                      is_active: self.is_active,
                      entity,
                      created_at: self.created_at,
                      updated_at: self.updated_at })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow)]
pub struct NewWorkflowRow<'a> {
    pub workflow_id: &'a Uuid,
    pub workflow_type: &'a str,
    pub current_workflow_state: &'a str,
    pub is_active: bool,
    pub opportunity_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub application_submission_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
pub struct AuditRow {
    pub audit_id: Uuid,
    pub workflow_id: Uuid,
    pub acting_user_id: Uuid,
    pub transition_event: String,
    pub source_state: String,
    pub target_state: String,
    pub event_id: Uuid,
    pub audit_metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_domain(self) -> WorkflowAudit {
        WorkflowAudit { audit_id: self.audit_id,
                        workflow_id: self.workflow_id,
                        acting_user_id: self.acting_user_id,
                        transition_event: self.transition_event,
                        source_state: self.source_state,
                        target_state: self.target_state,
                        event_id: self.event_id,
                        audit_metadata: self.audit_metadata,
                        created_at: self.created_at }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_audit)]
pub struct NewAuditRow<'a> {
    pub audit_id: &'a Uuid,
    pub workflow_id: &'a Uuid,
    pub acting_user_id: &'a Uuid,
    pub transition_event: &'a str,
    pub source_state: &'a str,
    pub target_state: &'a str,
    pub event_id: &'a Uuid,
    pub audit_metadata: &'a Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
pub struct ApprovalRow {
    pub approval_id: Uuid,
    pub workflow_id: Uuid,
    pub approval_type: String,
    pub approving_user_id: Uuid,
    pub approval_response_type: String,
    pub comment: Option<String>,
    pub is_still_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRow {
    fn into_domain(self) -> Result<WorkflowApproval, WorkflowError> {
        let approval_type = self.approval_type.parse().map_err(|e| {
            WorkflowError::Store(format!("approval {}: {e}", self.approval_id))
        })?;
        let approval_response_type = self.approval_response_type.parse().map_err(|e| {
            WorkflowError::Store(format!("approval {}: {e}", self.approval_id))
        })?;
        Ok(WorkflowApproval { approval_id: self.approval_id,
                              workflow_id: self.workflow_id,
                              approval_type,
                              approving_user_id: self.approving_user_id,
                              approval_response_type,
                              comment: self.comment,
                              is_still_valid: self.is_still_valid,
                              created_at: self.created_at })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_approval)]
pub struct NewApprovalRow<'a> {
    pub approval_id: &'a Uuid,
    pub workflow_id: &'a Uuid,
    pub approval_type: &'a str,
    pub approving_user_id: &'a Uuid,
    pub approval_response_type: &'a str,
    pub comment: Option<&'a str>,
    pub is_still_valid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Debug)]
pub struct HistoryRow {
    pub event_id: Uuid,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    pub is_successfully_processed: bool,
}

impl HistoryRow {
    fn into_domain(self) -> WorkflowEventHistory {
        WorkflowEventHistory { event_id: self.event_id,
                               payload: self.payload,
                               received_at: self.received_at,
                               is_successfully_processed: self.is_successfully_processed }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_event_history)]
pub struct NewHistoryRow<'a> {
    pub event_id: &'a Uuid,
    pub payload: &'a Value,
    pub received_at: DateTime<Utc>,
    pub is_successfully_processed: bool,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// `WorkflowStore` sobre una conexión Postgres prestada.
///
/// El trait del core lee con `&self`, así que la conexión mutable vive en
/// un `RefCell`; el motor es monohilo por transacción, nunca hay dos
/// préstamos vivos a la vez.
pub struct PgWorkflowStore<'c> {
    conn: RefCell<&'c mut PgConnection>,
    last_error_retryable: Cell<bool>,
}

impl<'c> PgWorkflowStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn: RefCell::new(conn),
               last_error_retryable: Cell::new(false) }
    }

    /// Si el último error devuelto por este store era transitorio. El trait
    /// del core aplana todo a `WorkflowError::Store(String)`, así que la
    /// clase semántica del `PersistenceError` se preserva acá para que el
    /// wrapper transaccional decida si reintentar. Una violación de unique
    /// o check es determinística y jamás se reintenta.
    pub fn last_error_retryable(&self) -> bool {
        self.last_error_retryable.get()
    }

    fn store_err(&self, e: diesel::result::Error) -> WorkflowError {
        let persistence = PersistenceError::from(e);
        self.last_error_retryable.set(is_retryable(&persistence));
        WorkflowError::from(persistence)
    }

    /// Error de fila faltante/contada: determinístico, nunca transitorio.
    fn row_err(&self, message: String) -> WorkflowError {
        self.last_error_retryable.set(false);
        WorkflowError::Store(message)
    }
}

impl WorkflowStore for PgWorkflowStore<'_> {
    fn create_workflow(&mut self, wf: &Workflow) -> Result<(), WorkflowError> {
        let (opportunity_id, application_id, application_submission_id) = wf.entity.to_columns();
        let row = NewWorkflowRow { workflow_id: &wf.workflow_id,
                                   workflow_type: wf.workflow_type.as_str(),
                                   current_workflow_state: &wf.current_workflow_state,
                                   is_active: wf.is_active,
                                   opportunity_id,
                                   application_id,
                                   application_submission_id,
                                   created_at: wf.created_at,
                                   updated_at: wf.updated_at };
        diesel::insert_into(workflow::table).values(&row)
                                            .execute(&mut **self.conn.borrow_mut())
                                            .map_err(|e| self.store_err(e))?;
        debug!("create_workflow: {}", wf.workflow_id);
        Ok(())
    }

    /// Carga con `FOR UPDATE`: dentro del wrapper transaccional esto locked
    /// la fila por toda la transición, que es la garantía de orden que el
    /// contrato exige para eventos concurrentes sobre el mismo workflow.
    fn get_workflow(&self, workflow_id: Uuid) -> Result<Option<Workflow>, WorkflowError> {
        let row: Option<WorkflowRow> = workflow::table.find(workflow_id)
                                                      .for_update()
                                                      .first(&mut **self.conn.borrow_mut())
                                                      .optional()
                                                      .map_err(|e| self.store_err(e))?;
        row.map(WorkflowRow::into_domain).transpose()
    }

    fn update_workflow_state(&mut self,
                             workflow_id: Uuid,
                             state: &str,
                             is_active: bool)
                             -> Result<(), WorkflowError> {
        let updated =
            diesel::update(workflow::table.find(workflow_id))
                .set((workflow::current_workflow_state.eq(state),
                      workflow::is_active.eq(is_active),
                      workflow::updated_at.eq(Utc::now())))
                .execute(&mut **self.conn.borrow_mut())
                .map_err(|e| self.store_err(e))?;
        if updated != 1 {
            return Err(self.row_err(format!("workflow {workflow_id} not found")));
        }
        Ok(())
    }

    fn add_audit(&mut self, audit: &WorkflowAudit) -> Result<(), WorkflowError> {
        let row = NewAuditRow { audit_id: &audit.audit_id,
                                workflow_id: &audit.workflow_id,
                                acting_user_id: &audit.acting_user_id,
                                transition_event: &audit.transition_event,
                                source_state: &audit.source_state,
                                target_state: &audit.target_state,
                                event_id: &audit.event_id,
                                audit_metadata: &audit.audit_metadata,
                                created_at: audit.created_at };
        diesel::insert_into(workflow_audit::table).values(&row)
                                                  .execute(&mut **self.conn.borrow_mut())
                                                  .map_err(|e| self.store_err(e))?;
        Ok(())
    }

    fn list_audits(&self, workflow_id: Uuid) -> Result<Vec<WorkflowAudit>, WorkflowError> {
        let rows: Vec<AuditRow> =
            workflow_audit::table.filter(workflow_audit::workflow_id.eq(workflow_id))
                                 .order(workflow_audit::created_at.asc())
                                 .load(&mut **self.conn.borrow_mut())
                                 .map_err(|e| self.store_err(e))?;
        Ok(rows.into_iter().map(AuditRow::into_domain).collect())
    }

    fn add_approval(&mut self, approval: &WorkflowApproval) -> Result<(), WorkflowError> {
        let row = NewApprovalRow { approval_id: &approval.approval_id,
                                   workflow_id: &approval.workflow_id,
                                   approval_type: approval.approval_type.as_str(),
                                   approving_user_id: &approval.approving_user_id,
                                   approval_response_type:
                                       approval.approval_response_type.as_str(),
                                   comment: approval.comment.as_deref(),
                                   is_still_valid: approval.is_still_valid,
                                   created_at: approval.created_at };
        diesel::insert_into(workflow_approval::table).values(&row)
                                                     .execute(&mut **self.conn.borrow_mut())
                                                     .map_err(|e| self.store_err(e))?;
        Ok(())
    }

    fn list_approvals(&self, workflow_id: Uuid) -> Result<Vec<WorkflowApproval>, WorkflowError> {
        let rows: Vec<ApprovalRow> =
            workflow_approval::table.filter(workflow_approval::workflow_id.eq(workflow_id))
                                    .order(workflow_approval::created_at.asc())
                                    .load(&mut **self.conn.borrow_mut())
                                    .map_err(|e| self.store_err(e))?;
        rows.into_iter().map(ApprovalRow::into_domain).collect()
    }

    fn invalidate_approvals(&mut self, workflow_id: Uuid) -> Result<(), WorkflowError> {
        diesel::update(workflow_approval::table
                           .filter(workflow_approval::workflow_id.eq(workflow_id))
                           .filter(workflow_approval::is_still_valid.eq(true)))
            .set(workflow_approval::is_still_valid.eq(false))
            .execute(&mut **self.conn.borrow_mut())
            .map_err(|e| self.store_err(e))?;
        Ok(())
    }

    fn add_history_event(&mut self, event: &WorkflowEventHistory) -> Result<(), WorkflowError> {
        let row = NewHistoryRow { event_id: &event.event_id,
                                  payload: &event.payload,
                                  received_at: event.received_at,
                                  is_successfully_processed: event.is_successfully_processed };
        diesel::insert_into(workflow_event_history::table).values(&row)
                                                          .execute(&mut **self.conn.borrow_mut())
                                                          .map_err(|e| self.store_err(e))?;
        Ok(())
    }

    fn get_history_event(&self,
                         event_id: Uuid)
                         -> Result<Option<WorkflowEventHistory>, WorkflowError> {
        let row: Option<HistoryRow> = workflow_event_history::table.find(event_id)
                                                                   .first(&mut **self.conn.borrow_mut())
                                                                   .optional()
                                                                   .map_err(|e| self.store_err(e))?;
        Ok(row.map(HistoryRow::into_domain))
    }

    fn mark_history_processed(&mut self, event_id: Uuid) -> Result<(), WorkflowError> {
        let updated =
            diesel::update(workflow_event_history::table.find(event_id))
                .set(workflow_event_history::is_successfully_processed.eq(true))
                .execute(&mut **self.conn.borrow_mut())
                .map_err(|e| self.store_err(e))?;
        if updated != 1 {
            return Err(self.row_err(format!("history event {event_id} not found")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wrappers transaccionales
// ---------------------------------------------------------------------------

const MAX_RETRIES: u32 = 3;

enum TxError {
    /// Error de negocio del motor: jamás se reintenta.
    Workflow(WorkflowError),
    /// Error de store ya aplanado, con la retryability preservada desde la
    /// clase del `PersistenceError` original.
    Store { error: WorkflowError, retryable: bool },
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Db(e)
    }
}

fn should_retry(retryable: bool, attempts: u32) -> bool {
    retryable && attempts < MAX_RETRIES
}

/// Corre una unidad de trabajo en una transacción read-write, con retry y
/// backoff para errores transitorios de conexión/serialización. Los errores
/// de negocio y los errores de store determinísticos (unique/check/fila
/// faltante) nunca se reintentan.
fn run_in_transaction<P, T, F>(provider: &P, mut unit: F) -> Result<T, WorkflowError>
    where P: ConnectionProvider,
          F: FnMut(&mut PgConnection) -> Result<T, TxError>
{
    let mut attempts = 0;
    loop {
        let mut conn = match provider.connection() {
            Ok(conn) => conn,
            Err(e) if should_retry(is_retryable(&e), attempts) => {
                backoff(&mut attempts, &e.to_string());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match conn.build_transaction().read_write().run(|tx| unit(tx)) {
            Ok(value) => return Ok(value),
            Err(TxError::Workflow(e)) => return Err(e),
            Err(TxError::Store { error, retryable }) => {
                if should_retry(retryable, attempts) {
                    backoff(&mut attempts, &error.to_string());
                    continue;
                }
                return Err(error);
            }
            Err(TxError::Db(e)) => {
                let persistence = PersistenceError::from(e);
                if should_retry(is_retryable(&persistence), attempts) {
                    backoff(&mut attempts, &persistence.to_string());
                    continue;
                }
                return Err(persistence.into());
            }
        }
    }
}

fn backoff(attempts: &mut u32, cause: &str) {
    let delay_ms = 15 * (*attempts as u64 + 1);
    warn!("retryable error (attempt {}): {cause} -> sleeping {delay_ms}ms", *attempts + 1);
    std::thread::sleep(std::time::Duration::from_millis(delay_ms));
    *attempts += 1;
}

/// Ingesta durable de un envelope: la fila de historia se COMMITEA aunque
/// los chequeos advisory rechacen el envelope, que es exactamente el
/// contrato de "historia primero" del servicio del core.
pub fn ingest_event_in_transaction<P: ConnectionProvider>(provider: &P,
                                                          registry: &WorkflowRegistry,
                                                          envelope: &WorkflowEvent)
                                                          -> Result<Uuid, WorkflowError> {
    let verdict = run_in_transaction(provider, |tx| {
        let mut store = PgWorkflowStore::new(tx);
        match ingest_workflow_event(registry, &mut store, envelope) {
            Ok(event_id) => Ok(Ok(event_id)),
            // Fallo del store: rollback, no quedó historia que preservar.
            Err(e @ WorkflowError::Store(_)) => {
                Err(TxError::Store { retryable: store.last_error_retryable(), error: e })
            }
            // Rechazo advisory: Ok para que el commit preserve la historia.
            Err(other) => Ok(Err(other)),
        }
    })?;
    verdict
}

/// Procesa un evento ya ingresado dentro de UNA transacción: lock de la
/// fila de workflow, guards, estado, audit, approvals y el flag de
/// procesado viven o mueren juntos.
pub fn process_event_in_transaction<P: ConnectionProvider>(provider: &P,
                                                           registry: &WorkflowRegistry,
                                                           directory: &dyn Directory,
                                                           event_id: Uuid)
                                                           -> Result<ProcessOutcome, WorkflowError> {
    run_in_transaction(provider, |tx| {
        let mut store = PgWorkflowStore::new(tx);
        let outcome = process_workflow_event(registry, &mut store, directory, event_id);
        outcome.map_err(|e| match e {
            e @ WorkflowError::Store(_) => {
                TxError::Store { retryable: store.last_error_retryable(), error: e }
            }
            other => TxError::Workflow(other),
        })
    })
}

// ---------------------------------------------------------------------------
// Construcción de pool
// ---------------------------------------------------------------------------

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Valida y ajusta tamaños (si `min_size > max_size`, usa `min = max`) y
/// ejecuta migraciones inmediatamente tras el primer `get()`.
pub fn build_pool(database_url: &str,
                  min_size: u32,
                  max_size: u32)
                  -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| {
                                        PersistenceError::TransientIo(format!("pool build: {e}"))
                                    })?;
    {
        let mut conn = pool.get().map_err(|e| {
                                     PersistenceError::TransientIo(format!(
                                         "pool get for migrations: {e}"
                                     ))
                                 })?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
