use model::execution::pipeline::PipelineConfig;

/// Decides before any preparation whether the run should happen at all.
pub trait SkipGate: Send + Sync {
    /// `Some(reason)` skips the whole run.
    fn skip_reason(&self, config: &PipelineConfig) -> Option<String>;
}

/// Skips when the configured marker file exists or no source provides a
/// declared table.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSkipGate;

impl SkipGate for DefaultSkipGate {
    fn skip_reason(&self, config: &PipelineConfig) -> Option<String> {
        if let Some(marker) = &config.skip_marker
            && marker.exists()
        {
            return Some(format!("skip marker {} is present", marker.display()));
        }

        if config.units().is_empty() {
            return Some("no (source, table) units are configured".to_string());
        }

        None
    }
}
