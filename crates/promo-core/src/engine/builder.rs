//! Builder para `FlowEngine`.
//!
//! `EngineBuilderInit` contiene las stores; al fijar la definición se pasa a
//! `EngineBuilder`, donde se registran inyectores y la concurrencia máxima.
//!
//! ```ignore
//! let engine = FlowEngine::new()
//!     .definition(definition)
//!     .injector(Box::new(MyInjector))
//!     .max_parallel(2)
//!     .build();
//! ```
use std::sync::Arc;

use crate::constants::DEFAULT_MAX_PARALLEL;
use crate::engine::FlowEngine;
use crate::event::EventStore;
use crate::injection::ParamInjector;
use crate::repo::{FlowDefinition, FlowRepository};

#[derive(Debug)]
pub struct EngineBuilderInit<E: EventStore, R: FlowRepository> {
    pub event_store: E,
    pub repository: R,
}

impl<E: EventStore, R: FlowRepository> EngineBuilderInit<E, R> {
    /// Fija la definición por defecto del engine.
    pub fn definition(self, definition: FlowDefinition) -> EngineBuilder<E, R> {
        EngineBuilder { event_store: self.event_store,
                        repository: self.repository,
                        definition: Arc::new(definition),
                        injectors: Vec::new(),
                        max_parallel: DEFAULT_MAX_PARALLEL }
    }
}

#[derive(Debug)]
pub struct EngineBuilder<E: EventStore, R: FlowRepository> {
    event_store: E,
    repository: R,
    definition: Arc<FlowDefinition>,
    injectors: Vec<Box<dyn ParamInjector>>,
    max_parallel: usize,
}

impl<E: EventStore, R: FlowRepository> EngineBuilder<E, R> {
    /// Registra un inyector. El orden de registro es el orden de merge.
    pub fn injector(mut self, injector: Box<dyn ParamInjector>) -> Self {
        self.injectors.push(injector);
        self
    }

    /// Máximo de steps ejecutándose a la vez dentro de una ola (mínimo 1).
    pub fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    pub fn build(self) -> FlowEngine<E, R> {
        let mut engine = FlowEngine::new_with_stores(self.event_store, self.repository);
        engine.set_default_definition(self.definition);
        engine.set_max_parallel(self.max_parallel);
        for inj in self.injectors {
            engine.add_injector(inj);
        }
        engine
    }
}
