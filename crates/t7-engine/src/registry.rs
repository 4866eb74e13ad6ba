//! Explicit pipeline registry.
//!
//! One registry object is constructed at process start and handed to
//! whatever assembles and runs the instrument pipelines — there is no
//! ambient global map. Lookup is by symbol.

use std::sync::Arc;

use ahash::AHashMap;

use crate::pipeline::InstrumentPipeline;

/// Symbol → pipeline map, built once during assembly.
#[derive(Default)]
pub struct Registry {
    pipelines: AHashMap<String, Arc<InstrumentPipeline>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline. Replaces any previous pipeline for the symbol.
    pub fn insert(&mut self, pipeline: Arc<InstrumentPipeline>) {
        self.pipelines
            .insert(pipeline.symbol().to_string(), pipeline);
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<InstrumentPipeline>> {
        self.pipelines.get(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.pipelines.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InstrumentPipeline>> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
