//! Runtime genérico de máquina de estados con guards.
//!
//! `StateMachine` es el handle de ejecución de UNA instancia de workflow:
//! presta el store y el directorio, es dueño de la fila `Workflow` cargada y
//! ejecuta transiciones vía `send`. No hay reintentos internos: cualquier
//! fallo aborta el `send` completo y la transacción del caller decide.

pub mod context;
pub mod definition;

pub use context::{EffectContext, GuardContext, StateMachineEvent};
pub use definition::{EffectFn, GuardFn, StateMachineDefinition, StateMachineDefinitionBuilder, Transition};

use uuid::Uuid;

use grantflow_domain::Workflow;

use crate::config::WorkflowConfig;
use crate::directory::Directory;
use crate::errors::WorkflowError;
use crate::listener::TransitionListener;
use crate::store::WorkflowStore;

/// Transición ya ejecutada, para inspección post-proceso (tests, logging).
#[derive(Debug, Clone)]
pub struct ExecutedTransition {
    pub event: String,
    pub source_state: String,
    pub target_state: String,
    pub acting_user_id: Uuid,
}

pub struct StateMachine<'a> {
    definition: &'a StateMachineDefinition,
    config: &'a WorkflowConfig,
    store: &'a mut (dyn WorkflowStore + 'a),
    directory: &'a dyn Directory,
    workflow: Workflow,
    listeners: Vec<Box<dyn TransitionListener>>,
    executed: Vec<ExecutedTransition>,
}

impl std::fmt::Debug for StateMachine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
         .field("definition", &self.definition)
         .field("config", &self.config)
         .field("workflow", &self.workflow)
         .field("executed", &self.executed)
         .finish_non_exhaustive()
    }
}

impl<'a> StateMachine<'a> {
    pub fn new(definition: &'a StateMachineDefinition,
               config: &'a WorkflowConfig,
               store: &'a mut (dyn WorkflowStore + 'a),
               directory: &'a dyn Directory,
               workflow: Workflow)
               -> Self {
        Self { definition,
               config,
               store,
               directory,
               workflow,
               listeners: Vec::new(),
               executed: Vec::new() }
    }

    pub fn with_listener(mut self, listener: Box<dyn TransitionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }

    /// Transiciones ejecutadas por este handle, en orden.
    pub fn executed(&self) -> &[ExecutedTransition] {
        &self.executed
    }

    /// Ejecuta una transición guardada y retorna el estado resultante.
    ///
    /// Secuencia: lookup de candidatos por `(estado_actual, evento)`,
    /// evaluación de guards en orden (gana el primero que pase), escritura
    /// del estado destino vía el adapter, listeners (audit), efectos, y
    /// apagado de `is_active` si el destino es terminal. Este es el chequeo
    /// autoritativo de legalidad del evento: cualquier pre-check del caller
    /// es sólo diagnóstico.
    pub fn send(&mut self, event: &StateMachineEvent) -> Result<String, WorkflowError> {
        let source = self.workflow.current_workflow_state.clone();

        if !self.definition.has_state(&source) {
            return Err(WorkflowError::UnexpectedState(format!(
                "workflow record has an unexpected state: {source}"
            )));
        }

        let candidates = self.definition
                             .candidates(&source, &event.event_to_send)
                             .ok_or_else(Self::not_allowed)?;

        // Fase de guards: sólo lecturas, nada escrito todavía.
        let mut chosen: Option<&Transition> = None;
        {
            let guard_ctx = GuardContext { event,
                                           workflow: &self.workflow,
                                           config: self.config,
                                           store: &*self.store,
                                           directory: self.directory };
            for transition in candidates {
                let passes = match &transition.guard {
                    Some(guard) => guard(&guard_ctx)?,
                    None => true,
                };
                if passes {
                    chosen = Some(transition);
                    break;
                }
            }
        }
        let transition = chosen.ok_or_else(Self::not_allowed)?;
        let target = transition.target.clone();
        let effects = transition.effects.clone();

        // Fase de escritura: estado, listeners (audit), efectos, terminal.
        let mut model = (self.config.persistence_model)(&mut self.workflow, &mut *self.store);
        model.write_state(&target)?;
        {
            let mut effect_ctx = EffectContext { event,
                                                 config: self.config,
                                                 source_state: &source,
                                                 target_state: &target,
                                                 model: model.as_mut(),
                                                 directory: self.directory };
            for listener in &self.listeners {
                listener.on_transition(&mut effect_ctx)?;
            }
            for effect in &effects {
                effect(&mut effect_ctx)?;
            }
            if self.definition.is_terminal(&target) {
                effect_ctx.model.set_active(false)?;
            }
        }
        drop(model);

        self.executed.push(ExecutedTransition { event: event.event_to_send.clone(),
                                                source_state: source,
                                                target_state: target.clone(),
                                                acting_user_id: event.acting_user.user_id });
        Ok(target)
    }

    fn not_allowed() -> WorkflowError {
        // Guard denegado y transición inexistente son indistinguibles para
        // el caller: no se pueden sondear reglas de autorización mirando el
        // tipo de error.
        WorkflowError::InvalidEvent("event is not valid for current state of workflow".to_string())
    }
}
