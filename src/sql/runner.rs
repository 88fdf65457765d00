use crate::error::{BillingError, SqlFailure};
use crate::sql::connection::SqlExecutor;
use std::time::Duration;
use tracing::{info, warn};

const PREVIEW_CHARS: usize = 150;

/// One named SQL batch in a provisioning sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStep {
    pub label: String,
    pub sql: String,
}

impl SqlStep {
    pub fn new(label: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sql: sql.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded,
    /// The object was already in place.
    Skipped(SqlFailure),
    Failed { failure: SqlFailure, message: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<(String, StepOutcome)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Distinct failure kinds, in the order they were first seen.
    pub fn failures(&self) -> Vec<SqlFailure> {
        let mut kinds = Vec::new();
        for (_, outcome) in &self.outcomes {
            if let StepOutcome::Failed { failure, .. } = outcome
                && !kinds.contains(failure)
            {
                kinds.push(*failure);
            }
        }
        kinds
    }

    fn count(&self, pred: impl Fn(&StepOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Single-line preview of a statement for logs.
pub fn preview(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

/// Run every step in order; a failing step never stops the batch.
///
/// `pause` is slept between steps; the serverless pool sometimes rejects a
/// statement that references an object created by the previous one.
pub async fn execute_batch<E: SqlExecutor>(
    executor: &mut E,
    steps: &[SqlStep],
    pause: Duration,
) -> BatchReport {
    let mut report = BatchReport::default();

    for (i, step) in steps.iter().enumerate() {
        if step.sql.trim().is_empty() {
            continue;
        }
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        info!(
            step = i + 1,
            label = %step.label,
            sql = %preview(&step.sql, PREVIEW_CHARS),
            "executing"
        );
        let outcome = match executor.execute(&step.sql).await {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => outcome_for(&step.label, e),
        };
        report.outcomes.push((step.label.clone(), outcome));
    }

    info!(
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "batch finished"
    );
    report
}

fn outcome_for(label: &str, err: BillingError) -> StepOutcome {
    let failure = err.failure();
    if failure.is_benign() {
        warn!(label, failure = failure.label(), "already in place, skipping");
        StepOutcome::Skipped(failure)
    } else {
        warn!(label, failure = failure.label(), error = %err, "step failed");
        StepOutcome::Failed {
            failure,
            message: err.to_string(),
        }
    }
}
