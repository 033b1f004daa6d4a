use model::execution::pipeline::{
    ColumnDef, LoadTarget, REJECT_REASONS_COLUMN, RUN_ID_COLUMN, SRC_ID_COLUMN, TableConfig,
};

const PROVENANCE_TYPE: &str = "text";

/// Column list of `{target}.{table}`: the configured columns, the
/// provenance columns, `reject_reasons` for the DLQ, and the tech load
/// column last.
pub fn target_columns(table: &TableConfig, target: LoadTarget) -> Vec<ColumnDef> {
    let mut columns = table.columns.clone();
    columns.push(ColumnDef::new(SRC_ID_COLUMN, PROVENANCE_TYPE));
    columns.push(ColumnDef::new(RUN_ID_COLUMN, PROVENANCE_TYPE));
    if target == LoadTarget::DeadLetter {
        columns.push(ColumnDef::new(REJECT_REASONS_COLUMN, PROVENANCE_TYPE));
    }
    columns.push(table.tech_load_column.clone());
    columns
}
