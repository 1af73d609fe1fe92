// src/executor.rs

//! Executor (C9): runs a plan's batches, recording each success in the
//! checkpoint ledger and rolling everything back on the first failure.

use crate::checkpoint::{self, Checkpoint};
use crate::error::{Error, Result};
use crate::filesystem::{CancelToken, Filesystem};
use crate::graph::Plan;
use crate::operation::OperationID;
use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Upper bound on operations run concurrently within a batch.
    pub parallelism: usize,
    /// Directory to mirror the checkpoint ledger into as a journal file,
    /// so a crash mid-execution leaves a trail an operator can inspect.
    /// `None` runs with an in-memory-only checkpoint.
    pub journal_dir: Option<PathBuf>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { parallelism: 4, journal_dir: None }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExecuteResult {
    pub executed: Vec<OperationID>,
    pub failed: Vec<OperationID>,
    pub rolled_back: Vec<OperationID>,
}

/// Run `plan` to completion, or roll back everything that succeeded so
/// far on the first failure.
pub fn execute(
    plan: &Plan,
    fs: &dyn Filesystem,
    cancel: &CancelToken,
    options: ExecutorOptions,
) -> Result<ExecuteResult> {
    if plan.operations.is_empty() {
        return Err(Error::EmptyPlan);
    }

    let by_id: HashMap<&OperationID, &crate::operation::Operation> =
        plan.operations.iter().map(|op| (op.id(), op)).collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.parallelism.max(1))
        .build()
        .map_err(|e| Error::Manifest(format!("failed to build executor thread pool: {e}")))?;

    let mut checkpoint = match &options.journal_dir {
        Some(dir) => match Checkpoint::with_journal(checkpoint::journal_path_in(dir)) {
            Ok(cp) => cp,
            Err(e) => {
                warn!(error = %e, "failed to open execution journal, continuing without one");
                Checkpoint::new()
            }
        },
        None => Checkpoint::new(),
    };
    let mut executed = Vec::new();
    let mut failure: Option<String> = None;

    'batches: for batch in &plan.batches {
        cancel.check("execute")?;

        let results: Vec<(OperationID, Result<()>)> = pool.install(|| {
            batch
                .par_iter()
                .map(|id| {
                    let op = by_id.get(id).expect("operation id present in plan");
                    let outcome = catch_unwind(AssertUnwindSafe(|| op.execute(fs, cancel)))
                        .unwrap_or_else(|_| Err(Error::Manifest(format!("operation {id} panicked"))));
                    (id.clone(), outcome)
                })
                .collect()
        });

        for (id, outcome) in results {
            match outcome {
                Ok(()) => {
                    info!(operation = %id, "executed");
                    let op = (*by_id.get(&id).expect("operation id present in plan")).clone();
                    checkpoint.record(op);
                    executed.push(id);
                }
                Err(e) => {
                    error!(operation = %id, error = %e, "operation failed");
                    cancel.cancel();
                    failure = Some(e.to_string());
                    break 'batches;
                }
            }
        }
    }

    let Some(cause) = failure else {
        return Ok(ExecuteResult { executed, failed: Vec::new(), rolled_back: Vec::new() });
    };

    let fresh_cancel = CancelToken::new();
    let mut rolled_back = Vec::new();
    for operation in checkpoint.iter_reverse() {
        if let Err(e) = operation.rollback(fs, &fresh_cancel) {
            warn!(operation = %operation.id(), error = %e, "rollback failed, continuing");
        } else {
            rolled_back.push(operation.id().clone());
        }
    }

    let failed: Vec<OperationID> = plan
        .operations
        .iter()
        .map(|op| op.id().clone())
        .filter(|id| !executed.contains(id))
        .collect();

    Err(Error::ExecutionFailed { executed, failed, rolled_back, cause })
}
