//! Definición de máquina de estados como datos.
//!
//! Rol en el motor:
//! - Cada tipo de workflow registra UNA definición inmutable: estados (uno
//!   inicial, un subconjunto terminal) y transiciones.
//! - Una transición se indexa por `(estado_origen, evento)` y lleva un guard
//!   opcional, un estado destino y cero o más efectos.
//! - El despacho es un lookup en un mapa, no resolución virtual: varios
//!   candidatos por `(estado, evento)` se prueban en orden de declaración y
//!   gana el primero cuyo guard pase.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::errors::WorkflowError;
use crate::machine::context::{EffectContext, GuardContext};

/// Predicado de transición. `Ok(false)` significa "no permitido" (colapsa en
/// `InvalidEvent` si ningún candidato pasa); un `Err` aborta el `send`
/// completo con su propio tipo (p. ej. response type inválido).
pub type GuardFn = Arc<dyn Fn(&GuardContext<'_>) -> Result<bool, WorkflowError> + Send + Sync>;

/// Efecto ejecutado después de escribir el estado destino (p. ej. crear la
/// fila de aprobación). Corre dentro de la misma transacción.
pub type EffectFn = Arc<dyn Fn(&mut EffectContext<'_>) -> Result<(), WorkflowError> + Send + Sync>;

#[derive(Clone)]
pub struct Transition {
    pub target: String,
    pub guard: Option<GuardFn>,
    pub effects: Vec<EffectFn>,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
         .field("target", &self.target)
         .field("has_guard", &self.guard.is_some())
         .field("effect_count", &self.effects.len())
         .finish()
    }
}

impl Transition {
    pub fn to(target: &str) -> Self {
        Self { target: target.to_string(),
               guard: None,
               effects: Vec::new() }
    }

    pub fn guarded(mut self, guard: GuardFn) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_effect(mut self, effect: EffectFn) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Definición inmutable de una máquina. Vive en el registry por la vida del
/// proceso; segura para lecturas concurrentes sin sincronización.
#[derive(Debug)]
pub struct StateMachineDefinition {
    initial_state: String,
    start_event: String,
    states: BTreeSet<String>,
    terminal_states: BTreeSet<String>,
    transitions: HashMap<(String, String), Vec<Transition>>,
}

impl StateMachineDefinition {
    pub fn builder(initial_state: &str) -> StateMachineDefinitionBuilder {
        StateMachineDefinitionBuilder { initial_state: initial_state.to_string(),
                                        start_event: "start_workflow".to_string(),
                                        terminal_states: BTreeSet::new(),
                                        transitions: Vec::new() }
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    /// Evento designado que arranca la máquina desde su estado inicial.
    pub fn start_event(&self) -> &str {
        &self.start_event
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.terminal_states.contains(state)
    }

    /// Candidatos para `(estado, evento)` en orden de declaración.
    pub fn candidates(&self, state: &str, event: &str) -> Option<&[Transition]> {
        self.transitions
            .get(&(state.to_string(), event.to_string()))
            .map(Vec::as_slice)
    }

    /// Nombres de evento definidos en algún estado de la máquina. Usado por
    /// el pre-check advisory de ingesta.
    pub fn valid_events(&self) -> BTreeSet<&str> {
        self.transitions.keys().map(|(_, event)| event.as_str()).collect()
    }

    /// Un evento es estructuralmente legal si alguna transición lo define,
    /// sin importar el estado actual ni los guards.
    pub fn is_valid_event(&self, event: &str) -> bool {
        self.transitions.keys().any(|(_, e)| e == event)
    }
}

pub struct StateMachineDefinitionBuilder {
    initial_state: String,
    start_event: String,
    terminal_states: BTreeSet<String>,
    transitions: Vec<(String, String, Transition)>,
}

impl StateMachineDefinitionBuilder {
    pub fn start_event(mut self, event: &str) -> Self {
        self.start_event = event.to_string();
        self
    }

    pub fn terminal(mut self, state: &str) -> Self {
        self.terminal_states.insert(state.to_string());
        self
    }

    /// Transición sin guard ni efectos.
    pub fn transition(self, source: &str, event: &str, target: &str) -> Self {
        self.add(source, event, Transition::to(target))
    }

    /// Agrega un candidato para `(source, event)`; el orden de los `add`
    /// define el orden de evaluación de guards.
    pub fn add(mut self, source: &str, event: &str, transition: Transition) -> Self {
        self.transitions.push((source.to_string(), event.to_string(), transition));
        self
    }

    pub fn build(self) -> Result<StateMachineDefinition, WorkflowError> {
        let mut states: BTreeSet<String> = BTreeSet::new();
        states.insert(self.initial_state.clone());
        states.extend(self.terminal_states.iter().cloned());

        let mut transitions: HashMap<(String, String), Vec<Transition>> = HashMap::new();
        for (source, event, transition) in self.transitions {
            states.insert(source.clone());
            states.insert(transition.target.clone());
            transitions.entry((source, event)).or_default().push(transition);
        }

        // Estados terminales no pueden ser origen de ninguna transición.
        for (source, _) in transitions.keys() {
            if self.terminal_states.contains(source) {
                return Err(WorkflowError::InvalidWorkflowType(format!(
                    "terminal state {source} cannot have outgoing transitions"
                )));
            }
        }

        if !transitions.keys().any(|(s, e)| *s == self.initial_state && *e == self.start_event) {
            return Err(WorkflowError::InvalidWorkflowType(format!(
                "start event {} is not defined for initial state {}",
                self.start_event, self.initial_state
            )));
        }

        Ok(StateMachineDefinition { initial_state: self.initial_state,
                                    start_event: self.start_event,
                                    states,
                                    terminal_states: self.terminal_states,
                                    transitions })
    }
}
