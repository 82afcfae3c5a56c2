// This module wires the analysis phases into the single entry point callers
// use: CFG construction, graph normalization, reaching definitions with
// diagnostics, dominance computation, and SSA construction. Phase order
// matters: diagnostics come from the reaching pass over the normalized graph,
// and the run aborts before SSA if any were errors, so SSA construction only
// ever sees well-formed functions.

use crate::builder::{CfaTracker, CfgBuilder};
use crate::defs::{Defs, PhiId, VarId};
use crate::dominators;
use crate::error::{FlowError, FlowResult};
use crate::graph::{BlockId, FlowGraph};
use crate::reaching::ReachingDefs;
use crate::ssa::SsaBuilder;
use crate::warnings::{CfWarner, Diagnostic, MessageCollection, WarningDirectives};

use crate::ast::FunctionDef;

/// The result of analyzing one function: the normalized CFG in SSA form,
/// the def-use tables, and everything the run reported.
#[derive(Debug)]
pub struct SsaFunction {
    pub graph: FlowGraph,
    pub defs: Defs,
    pub messages: MessageCollection,
    /// Sweeps the reaching-definitions fixpoint needed, for regression
    /// checks on convergence.
    pub reaching_sweeps: usize,
}

impl SsaFunction {
    /// First committed block carrying `label`, if any survived
    /// normalization.
    pub fn find_block(&self, label: &str) -> Option<BlockId> {
        self.graph
            .blocks
            .iter()
            .copied()
            .find(|&b| self.graph.block(b).label == label)
    }

    /// Live phi nodes of a block.
    pub fn phis_in(&self, block: BlockId) -> &[PhiId] {
        &self.graph.block(block).phis
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.defs.lookup_var(name)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.messages.diagnostics()
    }
}

/// Analyze a function and construct its SSA form.
///
/// Fails with [`FlowError::SourceErrors`] when the function itself is
/// invalid (reads that are definitely uninitialized, break or continue
/// outside a loop); warnings alone do not abort and are returned on the
/// result.
pub fn analyze_function(
    func: &FunctionDef,
    directives: WarningDirectives,
) -> FlowResult<SsaFunction> {
    log::debug!("analyzing function '{}'", func.name);

    let mut messages = MessageCollection::new();
    let (mut graph, mut defs) = CfgBuilder::build(func, CfaTracker, &mut messages)?;
    graph.normalize();

    let mut reaching = ReachingDefs::new();
    reaching.initialize(&mut graph, &mut defs);
    reaching.solve(&mut graph);
    {
        let mut warner = CfWarner::new(&mut messages, directives);
        reaching.check_definitions(&graph, &mut defs, &mut warner);
    }

    if messages.has_errors() {
        return Err(FlowError::SourceErrors {
            errors: messages.error_count(),
            diagnostics: messages,
        });
    }

    dominators::compute_dominator_sets(&mut graph);
    dominators::compute_immediate_dominators(&mut graph)?;
    dominators::compute_dominance_frontiers(&mut graph);

    let mut ssa = SsaBuilder::new();
    ssa.run(&mut graph, &mut defs)?;

    Ok(SsaFunction {
        graph,
        defs,
        messages,
        reaching_sweeps: reaching.sweeps(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Pos, Stmt};
    use crate::warnings::DiagnosticKind;

    fn p(line: u32) -> Pos {
        Pos::new(line, 0)
    }

    #[test]
    fn empty_function_analyzes_to_a_bare_exit() {
        let func = FunctionDef::new("f", vec![], vec![]);
        let out = analyze_function(&func, WarningDirectives::default()).unwrap();
        assert_eq!(out.graph.blocks, vec![out.graph.exit_point]);
        assert!(out.diagnostics().is_empty());
    }

    #[test]
    fn source_errors_abort_before_ssa() {
        let func = FunctionDef::new("f", vec![], vec![Stmt::Break { pos: p(1) }]);
        let err = analyze_function(&func, WarningDirectives::default()).unwrap_err();
        match err {
            FlowError::SourceErrors { errors, diagnostics } => {
                assert_eq!(errors, 1);
                assert!(diagnostics
                    .diagnostics()
                    .iter()
                    .any(|d| d.kind == DiagnosticKind::BreakOutsideLoop));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn warnings_do_not_abort() {
        // x assigned but never read.
        let func = FunctionDef::new(
            "f",
            vec![],
            vec![Stmt::Assign {
                target: "x".into(),
                value: Expr::constant(p(1)),
                pos: p(1),
            }],
        );
        let out = analyze_function(&func, WarningDirectives::default()).unwrap();
        assert!(out.diagnostics().iter().any(|d| matches!(
            &d.kind,
            DiagnosticKind::UnusedVariable { name } if name == "x"
        )));
    }
}
