use crate::{error::StageError, transform::checks::{CheckFn, CheckRegistry}};
use model::{execution::check::CheckCode, records::row::RowData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Every failing code, in check-list order.
    Reject(Vec<CheckCode>),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Runs a table's check list against single rows.
pub struct RowValidator {
    checks: Vec<(CheckCode, CheckFn)>,
}

impl RowValidator {
    /// Fails when a code in `check_list` has no registered function.
    /// A code listed twice is run once.
    pub fn new(registry: &CheckRegistry, check_list: &[CheckCode]) -> Result<Self, StageError> {
        let mut checks: Vec<(CheckCode, CheckFn)> = Vec::with_capacity(check_list.len());
        for &code in check_list {
            if checks.iter().any(|(seen, _)| *seen == code) {
                continue;
            }
            let check = registry
                .get(code)
                .ok_or(StageError::UnregisteredCheck(code))?;
            checks.push((code, check));
        }
        Ok(RowValidator { checks })
    }

    /// Every check runs, so a rejected row lists all the codes it failed.
    pub fn validate(&self, row: &RowData) -> Verdict {
        let failed: Vec<CheckCode> = self
            .checks
            .iter()
            .filter(|(_, check)| !check(row))
            .map(|(code, _)| *code)
            .collect();

        if failed.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Reject(failed)
        }
    }
}
