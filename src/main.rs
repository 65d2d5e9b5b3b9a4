//! Demo ejecutable del motor de workflows.
//!
//! Corre la máquina `InitialPrototype` completa contra el backend en
//! memoria (camino feliz + ciclo de rework) y, si `GRANTFLOW_RUN_PG_DEMO=1`
//! y hay `DATABASE_URL`, repite el camino feliz contra Postgres con los
//! wrappers transaccionales.

use serde_json::json;
use uuid::Uuid;

use grantflow_core::machines;
use grantflow_core::machines::initial_prototype::{EVENT_BUDGET_OFFICER_APPROVAL,
                                                  EVENT_PROGRAM_OFFICER_APPROVAL};
use grantflow_core::{ingest_workflow_event, process_workflow_event, InMemoryDirectory,
                     InMemoryWorkflowStore, ProcessWorkflowContext, StartWorkflowContext,
                     WorkflowEvent, WorkflowEventType, WorkflowRegistry, WorkflowStore};
use grantflow_domain::{Opportunity, Privilege, User, WorkflowEntityType, WorkflowType};

struct DemoWorld {
    registry: WorkflowRegistry,
    directory: InMemoryDirectory,
    program_officer: User,
    budget_officer: User,
    opportunity_id: Uuid,
}

fn build_world() -> DemoWorld {
    let mut registry = WorkflowRegistry::new();
    machines::register_workflows(&mut registry).expect("registrar workflows");

    let mut directory = InMemoryDirectory::new();
    let program_officer = User::new("demo.program.officer@agency.gov");
    let budget_officer = User::new("demo.budget.officer@agency.gov");
    directory.add_user(program_officer.clone());
    directory.add_user(budget_officer.clone());
    let opportunity_id = directory.add_opportunity(Opportunity::new(Some("AGY-DEMO")));
    directory.grant_privilege(program_officer.user_id,
                              "AGY-DEMO",
                              Privilege::ProgramOfficerApproval);
    directory.grant_privilege(budget_officer.user_id,
                              "AGY-DEMO",
                              Privilege::BudgetOfficerApproval);

    DemoWorld { registry, directory, program_officer, budget_officer, opportunity_id }
}

fn start_envelope(world: &DemoWorld) -> WorkflowEvent {
    WorkflowEvent { event_type: WorkflowEventType::StartWorkflow,
                    acting_user_id: world.program_officer.user_id,
                    metadata: json!({"channel": "demo"}),
                    start_workflow_context:
                        Some(StartWorkflowContext { workflow_type: WorkflowType::InitialPrototype,
                                                    entity_type: WorkflowEntityType::Opportunity,
                                                    entity_id: world.opportunity_id }),
                    process_workflow_context: None }
}

fn approval_envelope(actor: &User,
                     workflow_id: Uuid,
                     event: &str,
                     response: &str,
                     comment: Option<&str>)
                     -> WorkflowEvent {
    WorkflowEvent { event_type: WorkflowEventType::ProcessWorkflow,
                    acting_user_id: actor.user_id,
                    metadata: json!({"channel": "demo"}),
                    start_workflow_context: None,
                    process_workflow_context:
                        Some(ProcessWorkflowContext { workflow_id,
                                                      event_to_send: event.to_string(),
                                                      approval_response_type:
                                                          Some(response.to_string()),
                                                      comment: comment.map(str::to_string) }) }
}

fn deliver(world: &DemoWorld,
           store: &mut InMemoryWorkflowStore,
           envelope: &WorkflowEvent)
           -> grantflow_core::ProcessOutcome {
    let event_id =
        ingest_workflow_event(&world.registry, store, envelope).expect("ingesta del envelope");
    process_workflow_event(&world.registry, store, &world.directory, event_id)
        .expect("proceso del evento")
}

fn run_in_memory_demo(world: &DemoWorld) {
    let mut store = InMemoryWorkflowStore::new();

    println!("--- Demo en memoria: camino feliz ---");
    let outcome = deliver(world, &mut store, &start_envelope(world));
    let workflow_id = outcome.workflow.workflow_id;
    println!("workflow {workflow_id} iniciado en {}", outcome.workflow.current_workflow_state);

    let outcome = deliver(world,
                          &mut store,
                          &approval_envelope(&world.program_officer,
                                             workflow_id,
                                             EVENT_PROGRAM_OFFICER_APPROVAL,
                                             "approved",
                                             None));
    println!("program officer aprobó -> {}", outcome.workflow.current_workflow_state);

    let outcome = deliver(world,
                          &mut store,
                          &approval_envelope(&world.budget_officer,
                                             workflow_id,
                                             EVENT_BUDGET_OFFICER_APPROVAL,
                                             "approved",
                                             None));
    println!("budget officer aprobó -> {} (activo={})",
             outcome.workflow.current_workflow_state, outcome.workflow.is_active);

    let audits = store.list_audits(workflow_id).expect("audits");
    println!("transiciones auditadas: {}", audits.len());
    for audit in &audits {
        println!("  {} : {} -> {}", audit.transition_event, audit.source_state, audit.target_state);
    }

    println!("--- Demo en memoria: ciclo de rework ---");
    let outcome = deliver(world, &mut store, &start_envelope(world));
    let workflow_id = outcome.workflow.workflow_id;
    let outcome = deliver(world,
                          &mut store,
                          &approval_envelope(&world.program_officer,
                                             workflow_id,
                                             EVENT_PROGRAM_OFFICER_APPROVAL,
                                             "requires_modification",
                                             Some("falta el presupuesto")));
    println!("rework -> {} (activo={})",
             outcome.workflow.current_workflow_state, outcome.workflow.is_active);
    let approvals = store.list_approvals(workflow_id).expect("approvals");
    println!("aprobaciones registradas: {} (vigentes: {})",
             approvals.len(),
             approvals.iter().filter(|a| a.is_still_valid).count());
}

fn maybe_run_pg_demo(world: &DemoWorld) {
    use grantflow_persistence::pg::{ingest_event_in_transaction, process_event_in_transaction,
                                    PoolProvider};

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[PG DEMO] DATABASE_URL no definido; omitiendo demo PG");
        return;
    }
    let pool = match grantflow_persistence::build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[PG DEMO] Error construyendo pool: {e}");
            return;
        }
    };
    let provider = PoolProvider { pool };

    println!("--- Demo Postgres: camino feliz transaccional ---");
    let event_id = ingest_event_in_transaction(&provider, &world.registry, &start_envelope(world))
        .expect("ingesta start");
    let outcome =
        process_event_in_transaction(&provider, &world.registry, &world.directory, event_id)
            .expect("proceso start");
    let workflow_id = outcome.workflow.workflow_id;
    println!("workflow {workflow_id} iniciado en {}", outcome.workflow.current_workflow_state);

    for (actor, event) in [(&world.program_officer, EVENT_PROGRAM_OFFICER_APPROVAL),
                           (&world.budget_officer, EVENT_BUDGET_OFFICER_APPROVAL)]
    {
        let envelope = approval_envelope(actor, workflow_id, event, "approved", None);
        let event_id = ingest_event_in_transaction(&provider, &world.registry, &envelope)
            .expect("ingesta aprobación");
        let outcome =
            process_event_in_transaction(&provider, &world.registry, &world.directory, event_id)
                .expect("proceso aprobación");
        println!("{event} -> {}", outcome.workflow.current_workflow_state);
    }
}

fn main() {
    // Cargar variables de entorno desde .env si existe
    let _ = dotenvy::dotenv();

    let world = build_world();
    run_in_memory_demo(&world);

    if std::env::var("GRANTFLOW_RUN_PG_DEMO").ok().as_deref() == Some("1") {
        maybe_run_pg_demo(&world);
    } else {
        eprintln!("[PG DEMO] Skipping (set GRANTFLOW_RUN_PG_DEMO=1 to enable)");
    }
}
