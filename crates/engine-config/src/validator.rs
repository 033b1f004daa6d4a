use model::execution::pipeline::{
    PipelineConfig, REJECT_REASONS_COLUMN, RUN_ID_COLUMN, SRC_ID_COLUMN, TableConfig,
};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Checks a parsed pipeline config for problems serde cannot catch.
/// Every problem is collected before failing.
pub struct ConfigValidator<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_settings(&mut errors);
        for table in self.config.tables.values() {
            Self::validate_table(table, &mut errors);
        }
        self.validate_sources(&mut errors);
        self.validate_downstream(&mut errors);

        if !errors.is_empty() {
            return Err(ConfigError::ValidationFailed(errors));
        }

        info!(
            pipeline = %self.config.pipeline_id,
            tables = self.config.tables.len(),
            sources = self.config.sources.len(),
            units = self.config.units().len(),
            "Pipeline config validated"
        );
        Ok(())
    }

    fn validate_settings(&self, errors: &mut Vec<String>) {
        if self.config.pipeline_id.trim().is_empty() {
            errors.push("pipeline_id must not be empty".into());
        }
        if self.config.batch_size == 0 {
            errors.push("batch_size must be greater than zero".into());
        }
        if self.config.overlap_secs < 0 {
            errors.push(format!(
                "overlap_secs must not be negative (got {})",
                self.config.overlap_secs
            ));
        }
        if self.config.retry.attempts == 0 {
            errors.push("retry.attempts must be at least 1".into());
        }
    }

    fn validate_table(table: &TableConfig, errors: &mut Vec<String>) {
        let name = &table.name;

        if table.increment_col.trim().is_empty() {
            errors.push(format!("table `{name}`: increment_col must not be empty"));
        } else if !table.columns.iter().any(|c| c.name == table.increment_col) {
            errors.push(format!(
                "table `{name}`: increment_col `{}` is not among its columns",
                table.increment_col
            ));
        }

        if table.tech_load_column.name.trim().is_empty() {
            errors.push(format!("table `{name}`: tech_load_column.name must not be empty"));
        }

        if table.columns.is_empty() {
            errors.push(format!("table `{name}`: at least one column is required"));
        }

        let mut seen = HashSet::new();
        let reserved = [SRC_ID_COLUMN, RUN_ID_COLUMN, REJECT_REASONS_COLUMN];
        for column in table.columns.iter().chain([&table.tech_load_column]) {
            if column.sql_type.trim().is_empty() {
                errors.push(format!(
                    "table `{name}`: column `{}` has no sql_type",
                    column.name
                ));
            }
            if reserved.contains(&column.name.as_str()) {
                errors.push(format!(
                    "table `{name}`: column `{}` is reserved for provenance",
                    column.name
                ));
            }
            if !seen.insert(column.name.to_lowercase()) {
                errors.push(format!(
                    "table `{name}`: column `{}` is declared twice",
                    column.name
                ));
            }
        }

        if table.check_list.is_empty() {
            warn!(table = %name, "Table has no checks; every row will be loaded into stg");
        }
    }

    fn validate_sources(&self, errors: &mut Vec<String>) {
        let mut used = HashSet::new();

        for source in self.config.sources.values() {
            if source.url.trim().is_empty() {
                errors.push(format!("source `{}`: url must not be empty", source.id));
            }
            if source.city_name.trim().is_empty() {
                errors.push(format!("source `{}`: city_name must not be empty", source.id));
            }
            for table in &source.tables {
                if self.config.table(table).is_none() {
                    errors.push(format!(
                        "source `{}`: table `{table}` is not declared under `tables`",
                        source.id
                    ));
                }
                used.insert(table.as_str());
            }
        }

        for name in self.config.tables.keys() {
            if !used.contains(name.as_str()) {
                warn!(table = %name, "Table is not provided by any source");
            }
        }
    }

    fn validate_downstream(&self, errors: &mut Vec<String>) {
        if let Some(downstream) = &self.config.downstream
            && downstream.command.is_empty()
        {
            errors.push(format!(
                "downstream `{}`: command must name a program",
                downstream.name
            ));
        }
    }
}
