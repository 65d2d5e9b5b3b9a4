//! grantflow-core: motor de workflows con transiciones guardadas
pub mod approval;
pub mod config;
pub mod directory;
pub mod errors;
pub mod handler;
pub mod listener;
pub mod machine;
pub mod machines;
pub mod persistence_model;
pub mod registry;
pub mod service;
pub mod store;

pub use config::{ApprovalConfig, WorkflowConfig};
pub use directory::{Directory, InMemoryDirectory};
pub use errors::{classify_error, ErrorClass, WorkflowError};
pub use handler::{EventHandler, ProcessWorkflowContext, StartWorkflowContext, WorkflowEvent,
                  WorkflowEventType};
pub use listener::{TransitionListener, WorkflowAuditListener};
pub use machine::{EffectContext, ExecutedTransition, GuardContext, StateMachine,
                  StateMachineDefinition, StateMachineEvent, Transition};
pub use persistence_model::{workflow_persistence_model, PersistenceModelFactory, StatePersistence,
                            WorkflowPersistenceModel};
pub use registry::WorkflowRegistry;
pub use service::{ingest_workflow_event, process_workflow_event, ProcessOutcome};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
