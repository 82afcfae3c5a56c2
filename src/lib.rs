//! cfssa - Control-flow analysis and SSA construction.
//!
//! cfssa builds a basic-block graph from a function's statement tree, runs a
//! bit-vector reaching-definitions analysis over it, and converts the result
//! to SSA form (dominators, dominance frontiers, phi placement, renaming,
//! pruning). Along the way it reports control-flow diagnostics: uninitialized
//! and maybe-uninitialized reads, unused variables and definitions, and
//! unreachable code.
//!
//! # Primary Usage
//!
//! ```
//! use cfssa::{analyze_function, Expr, FunctionDef, Pos, Stmt, WarningDirectives};
//!
//! // def f(a): x = a; return x
//! let pos = Pos::new(1, 0);
//! let func = FunctionDef::new(
//!     "f",
//!     vec!["a".into()],
//!     vec![
//!         Stmt::Assign { target: "x".into(), value: Expr::name("a", pos), pos },
//!         Stmt::Return { value: Some(Expr::name("x", pos)), pos },
//!     ],
//! );
//!
//! let out = analyze_function(&func, WarningDirectives::default()).unwrap();
//! assert!(out.diagnostics().is_empty());
//! ```
//!
//! # Architecture
//!
//! - [`ast`] - Statement and expression tree the analysis consumes
//! - [`graph`] - Basic-block arena and the committed block list
//! - [`builder`] - CFG construction from the statement tree
//! - [`reaching`] - Bit-vector reaching-definitions solver
//! - [`dominators`] - Dominator sets, tree and dominance frontiers
//! - [`ssa`] - Phi placement, renaming and pruning
//! - [`pipeline`] - The phases wired together behind [`analyze_function`]

pub mod ast;
pub mod bits;
pub mod builder;
pub mod defs;
pub mod dominators;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod reaching;
pub mod ssa;
pub mod symtab;
pub mod warnings;

pub use ast::{Expr, FunctionDef, Pos, Stmt};
pub use builder::{CfaTracker, CfgBuilder, FlowTracker};
pub use defs::{
    AssignId, CfStat, Defs, GenDef, NameAssignment, NameReference, PhiId, PhiNode, ReachedDef,
    RefId, SsaDef, SsaUse, SsaVar, SsaVarId, VarId, Variable,
};
pub use error::{FlowError, FlowResult};
pub use graph::{BasicBlock, BlockId, FlowGraph};
pub use pipeline::{analyze_function, SsaFunction};
pub use reaching::ReachingDefs;
pub use ssa::SsaBuilder;
pub use warnings::{
    CfWarner, Diagnostic, DiagnosticKind, MessageCollection, Severity, WarningDirectives,
};
