//! grantflow-persistence
//!
//! Backend Postgres (Diesel) del motor de workflows: implementación durable
//! de `WorkflowStore` con paridad 1:1 respecto al backend en memoria de
//! grantflow-core, más utilidades de conexión, transacciones y migraciones.
//!
//! Módulos:
//! - `pg`: `PgWorkflowStore` y los wrappers transaccionales de ingesta y
//!   proceso (fila de workflow lockeada con `FOR UPDATE`).
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::init_dotenv;
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ingest_event_in_transaction,
             process_event_in_transaction, ConnectionProvider, PgPool, PgWorkflowStore,
             PoolProvider};
