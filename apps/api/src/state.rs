use std::sync::Arc;

use crate::config::Config;
use crate::layout::{GuillotinePacker, LayoutConfig, RectanglePacker, StandardMetrics, TextMeasurer};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Server-wide layout defaults, derived from `config` once at startup.
    pub layout: LayoutConfig,
    /// Pluggable text measurer. Default: AFM tables for the standard Helvetica faces.
    pub measurer: Arc<dyn TextMeasurer>,
    /// Pluggable rectangle packer. Default: GuillotinePacker.
    pub packer: Arc<dyn RectanglePacker>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            layout: config.layout_config(),
            config,
            measurer: Arc::new(StandardMetrics),
            packer: Arc::new(GuillotinePacker),
        }
    }
}
