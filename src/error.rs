// This module defines error types for the cfssa analysis pipeline using the thiserror
// crate for idiomatic Rust error handling. FlowError is the main error enum covering
// the failure scenarios of control-flow analysis: source programs rejected with
// diagnostic errors, malformed statement trees, and internal invariant violations
// (missing or ambiguous immediate dominators, unresolved names during SSA renaming,
// missing block scopes). Internal variants always indicate a defect in the analysis
// itself rather than bad input and are never retried. The module also provides
// FlowResult<T> as a convenience type alias for Result<T, FlowError>.

//! Error types for the control-flow analysis pipeline.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use crate::warnings::MessageCollection;

/// Main error type for control-flow analysis and SSA construction.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The source function was rejected; the collection holds the
    /// accumulated diagnostics, at least one of which is an error.
    #[error("analysis rejected the function with {errors} error(s)")]
    SourceErrors {
        errors: usize,
        diagnostics: MessageCollection,
    },

    #[error("malformed statement tree: {reason}")]
    MalformedAst { reason: String },

    /// A reachable non-entry block has no immediate dominator. Indicates a
    /// CFG builder defect, not a user error.
    #[error("no immediate dominator for reachable block {block}")]
    MissingIdom { block: usize },

    /// Two incomparable dominators tied for the immediate dominator of a
    /// block. Structurally impossible in a correct CFG.
    #[error("ambiguous immediate dominator for block {block}")]
    AmbiguousIdom { block: usize },

    #[error("no scope recorded for block {block} during SSA construction")]
    MissingScope { block: usize },

    #[error("no visible definition of '{name}' during SSA renaming")]
    UnresolvedName { name: String },
}

/// Result type alias for analysis operations.
pub type FlowResult<T> = Result<T, FlowError>;
