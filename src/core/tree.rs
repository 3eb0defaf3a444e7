//! Tree listing budget

/// Default number of tree entries kept in a snapshot
pub const DEFAULT_TREE_CAP: usize = 1000;

/// A tree listing cut down to the budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetedTree {
    pub paths: Vec<String>,
    pub is_truncated: bool,
}

/// Keep the first `cap` paths in their original order.
///
/// Only bounds the listing embedded in the document, selection works on
/// the full list.
pub fn budget(paths: &[String], cap: usize) -> BudgetedTree {
    if paths.len() <= cap {
        return BudgetedTree {
            paths: paths.to_vec(),
            is_truncated: false,
        };
    }

    BudgetedTree {
        paths: paths[..cap].to_vec(),
        is_truncated: true,
    }
}
