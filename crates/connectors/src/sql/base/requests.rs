use chrono::NaiveDateTime;

/// Incremental read of one source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementRequest {
    pub table: String,
    pub increment_col: String,
    /// Lower bound, exclusive. `None` selects the whole table.
    pub since: Option<NaiveDateTime>,
}

impl IncrementRequest {
    pub fn full(table: &str, increment_col: &str) -> Self {
        IncrementRequest {
            table: table.to_string(),
            increment_col: increment_col.to_string(),
            since: None,
        }
    }

    pub fn since(table: &str, increment_col: &str, since: NaiveDateTime) -> Self {
        IncrementRequest {
            since: Some(since),
            ..Self::full(table, increment_col)
        }
    }
}
