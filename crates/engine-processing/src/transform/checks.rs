use model::{core::value::Value, execution::check::CheckCode, records::row::RowData};
use std::{collections::HashMap, fmt};

/// A row check: `true` when the row passes.
pub type CheckFn = fn(&RowData) -> bool;

/// Maps every check code to the function that implements it.
///
/// `CheckRegistry::default()` holds the built-in checks; [`register`]
/// adds a new implementation or replaces an existing one.
///
/// [`register`]: CheckRegistry::register
#[derive(Clone)]
pub struct CheckRegistry {
    checks: HashMap<CheckCode, CheckFn>,
}

impl CheckRegistry {
    pub fn empty() -> Self {
        CheckRegistry {
            checks: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(CheckCode::NotNull, not_null);
        registry.register(CheckCode::NonNegative, non_negative);
        registry.register(CheckCode::NonBlank, non_blank);
        registry
    }

    /// Returns the function previously registered for `code`, if any.
    pub fn register(&mut self, code: CheckCode, check: CheckFn) -> Option<CheckFn> {
        self.checks.insert(code, check)
    }

    pub fn get(&self, code: CheckCode) -> Option<CheckFn> {
        self.checks.get(&code).copied()
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<_> = self.checks.keys().collect();
        codes.sort();
        f.debug_struct("CheckRegistry").field("codes", &codes).finish()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// No field is null.
pub fn not_null(row: &RowData) -> bool {
    row.values().all(|value| !value.is_null())
}

/// No numeric field is below zero. Fields that are not numbers are ignored.
pub fn non_negative(row: &RowData) -> bool {
    row.values()
        .all(|value| value.as_f64().is_none_or(|n| n >= 0.0 || n.is_nan()))
}

/// No text field consists of whitespace only.
pub fn non_blank(row: &RowData) -> bool {
    row.values().all(|value| match value {
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}
