// src/graph.rs

//! Dependency graph & sort (C7): orders a flat set of operations into
//! batches of mutually-independent work, via Kahn's algorithm with a
//! deterministic tie-break so identical inputs always yield the same
//! plan (Testable Property 1).

use crate::error::{Error, Result};
use crate::operation::{Operation, OperationID};
use crate::reconcile::{Conflict, Warning};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// A topologically-ordered plan: a flat operation list plus its
/// partition into maximal antichains ("batches").
#[derive(Debug, Default, Clone)]
pub struct Plan {
    pub operations: Vec<Operation>,
    pub batches: Vec<Vec<OperationID>>,
    /// Which operations belong to which package, for reporting
    /// (§3's `package_operations`). Populated by the facade once it
    /// knows the package each operation came from; `build_plan` itself
    /// has no package attribution to work with.
    pub package_operations: BTreeMap<String, Vec<OperationID>>,
    pub metadata: PlanMetadata,
}

/// The conflicts and warnings the reconciler produced alongside this
/// plan's operations (§3's `Plan.metadata`).
#[derive(Debug, Default, Clone)]
pub struct PlanMetadata {
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<Warning>,
}

/// Invert a flat `(operation id, package name)` listing into the
/// `package_operations` map shape, preserving each package's operations
/// in the order they were pushed.
pub fn package_operations_from(
    pairs: impl IntoIterator<Item = (OperationID, String)>,
) -> BTreeMap<String, Vec<OperationID>> {
    let mut map: BTreeMap<String, Vec<OperationID>> = BTreeMap::new();
    for (id, package_name) in pairs {
        map.entry(package_name).or_default().push(id);
    }
    map
}

/// Build the dependency DAG over `operations` and return it partitioned
/// into batches. Edges come from `Operation::depends_on` (§4.6): a
/// `DirCreate(P)` precedes anything strictly under `P`; a delete of a
/// path precedes a create at the same path.
pub fn build_plan(operations: Vec<Operation>) -> Result<Plan> {
    let n = operations.len();

    // adjacency[i] = indices that depend on operations[i] (i.e. edges i -> j)
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree: Vec<usize> = vec![0; n];

    for (j, op) in operations.iter().enumerate() {
        for (i, candidate) in operations.iter().enumerate() {
            if i == j {
                continue;
            }
            if op.depends_on(candidate) {
                adjacency[i].push(j);
                in_degree[j] += 1;
            }
        }
    }

    let mut batches: Vec<Vec<OperationID>> = Vec::new();
    let mut remaining = in_degree.clone();
    let mut resolved = vec![false; n];
    let mut resolved_count = 0;

    while resolved_count < n {
        let mut ready: BinaryHeap<Reverse<(OperationID, usize)>> = BinaryHeap::new();
        for (i, op) in operations.iter().enumerate() {
            if !resolved[i] && remaining[i] == 0 {
                ready.push(Reverse((op.id().clone(), i)));
            }
        }

        if ready.is_empty() {
            let cycle: Vec<OperationID> = (0..n)
                .filter(|&i| !resolved[i])
                .map(|i| operations[i].id().clone())
                .collect();
            return Err(Error::CyclicDependency { cycle });
        }

        let mut batch = Vec::new();
        let mut this_round = Vec::new();
        while let Some(Reverse((id, i))) = ready.pop() {
            batch.push(id);
            this_round.push(i);
        }

        for &i in &this_round {
            resolved[i] = true;
            resolved_count += 1;
            for &j in &adjacency[i] {
                remaining[j] -= 1;
            }
        }

        batches.push(batch);
    }

    Ok(Plan { operations, batches, ..Default::default() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn independent_operations_form_one_batch() {
        let ops = vec![
            Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/pkg/vim/dot-vimrc".into()),
            Operation::link_create(PathBuf::from("/home/u/.bashrc"), "/pkg/sh/dot-bashrc".into()),
        ];
        let plan = build_plan(ops).unwrap();
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.batches[0].len(), 2);
    }

    #[test]
    fn dir_create_precedes_nested_link_create() {
        let ops = vec![
            Operation::link_create(PathBuf::from("/home/u/.config/nvim/init.vim"), "/pkg/nvim/init.vim".into()),
            Operation::dir_create(PathBuf::from("/home/u/.config/nvim"), 0o755),
        ];
        let plan = build_plan(ops).unwrap();
        assert_eq!(plan.batches.len(), 2);
        assert!(plan.batches[0][0].as_str().starts_with("dir_create"));
    }

    #[test]
    fn deterministic_tie_break_by_id() {
        let ops = vec![
            Operation::link_create(PathBuf::from("/home/u/.zshrc"), "/pkg/sh/dot-zshrc".into()),
            Operation::link_create(PathBuf::from("/home/u/.aliases"), "/pkg/sh/dot-aliases".into()),
        ];
        let plan_a = build_plan(ops.clone()).unwrap();
        let plan_b = build_plan(ops).unwrap();
        assert_eq!(plan_a.batches, plan_b.batches);
        assert_eq!(plan_a.batches[0][0].as_str(), plan_b.batches[0][0].as_str());
    }

    #[test]
    fn delete_before_create_same_target() {
        let ops = vec![
            Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/pkg/vim/dot-vimrc".into()),
            Operation::link_delete(PathBuf::from("/home/u/.vimrc"), "/old/target".into()),
        ];
        let plan = build_plan(ops).unwrap();
        assert_eq!(plan.batches.len(), 2);
        assert!(plan.batches[0][0].as_str().starts_with("link_delete"));
    }
}
