//! Engine - the mix graph bound to a backend's output clock

use crate::audio::MixGraph;
use crate::backend::{AudioBackend, Renderer};
use crate::error::{MixerError, MixerResult};
use std::sync::Arc;

pub struct Engine {
    backend: Arc<dyn AudioBackend>,
    graph: Arc<MixGraph>,
}

impl Engine {
    /// Graph runs at the backend's output rate
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        let format = backend.output_format();
        log::debug!(
            "[Engine] Created on {} backend at {} Hz",
            backend.name(),
            format.sample_rate
        );
        Self {
            graph: Arc::new(MixGraph::new(format.sample_rate)),
            backend,
        }
    }

    pub fn graph(&self) -> &Arc<MixGraph> {
        &self.graph
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn sample_rate(&self) -> f64 {
        self.graph.sample_rate()
    }

    /// Start rendering if not already running
    pub fn ensure_running(&self) -> MixerResult<()> {
        if self.backend.is_running() {
            return Ok(());
        }
        let renderer: Arc<dyn Renderer> = self.graph.clone();
        self.backend.start(renderer).map_err(|e| {
            log::error!("[Engine] Failed to start: {}", e);
            MixerError::EngineStart(e.to_string())
        })?;
        log::info!("[Engine] Started");
        Ok(())
    }

    pub fn stop(&self) {
        if self.backend.is_running() {
            self.backend.stop();
            log::info!("[Engine] Stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.backend.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;

    #[test]
    fn test_start_failure_maps_to_engine_start() {
        let backend = Arc::new(OfflineBackend::new());
        let engine = Engine::new(backend.clone());
        backend.fail_next_start();
        assert!(matches!(engine.ensure_running(), Err(MixerError::EngineStart(_))));
        assert!(!engine.is_running());

        engine.ensure_running().unwrap();
        assert!(engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_graph_follows_output_rate() {
        let backend = Arc::new(OfflineBackend::new());
        let engine = Engine::new(backend);
        assert_eq!(engine.sample_rate(), 48000.0);
    }
}
