// This module implements the CFG builder: a single forward walk over the
// statement tree that allocates basic blocks in topological dominator order and
// wires control edges for branches, loops and exceptions. Merge blocks are
// allocated floating before their feeding branches are visited and committed
// once parented, which is what keeps the block list topological without a
// separate sorting pass. Loop and exception constructs push transient
// descriptor frames that break/continue/return consult to find their targets,
// walking enclosing finally suites first. Per-block variable bookkeeping (gen
// maps, bound sets, statement records) goes through the FlowTracker trait so
// the same walk can drive other lowerings.

use crate::ast::{Expr, FunctionDef, Pos, Stmt};
use crate::defs::{AssignId, CfStat, Defs, GenDef, VarId};
use crate::error::{FlowError, FlowResult};
use crate::graph::{BlockId, FlowGraph};
use crate::warnings::{DiagnosticKind, MessageCollection};

/// Strategy object for per-statement bookkeeping during the CFG walk.
///
/// The builder decides *where* control flows; the tracker decides *what* is
/// recorded about each name occurrence.
pub trait FlowTracker {
    fn mark_assignment(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
        block: BlockId,
        var: VarId,
        pos: Pos,
        is_arg: bool,
        warn_unused: bool,
    ) -> Option<AssignId>;

    fn mark_deletion(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
        block: BlockId,
        var: VarId,
        pos: Pos,
    );

    fn mark_reference(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
        block: BlockId,
        var: VarId,
        pos: Pos,
    );
}

/// Tracker used by the analysis pipeline: records abstract assignment,
/// reference and deletion statements for the reaching-definitions pass.
#[derive(Default)]
pub struct CfaTracker;

impl FlowTracker for CfaTracker {
    fn mark_assignment(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
        block: BlockId,
        var: VarId,
        pos: Pos,
        is_arg: bool,
        warn_unused: bool,
    ) -> Option<AssignId> {
        let a = defs.add_assignment(var, block, pos, false, is_arg, warn_unused);
        let b = graph.block_mut(block);
        b.stats.push(CfStat::Assignment(a));
        b.gen.insert(var, GenDef::Assignment(a));
        if !is_arg && defs.var(var).pos.is_none() {
            defs.var_mut(var).pos = Some(pos);
        }
        Some(a)
    }

    fn mark_deletion(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
        block: BlockId,
        var: VarId,
        pos: Pos,
    ) {
        let a = defs.add_assignment(var, block, pos, true, false, false);
        let b = graph.block_mut(block);
        b.stats.push(CfStat::Assignment(a));
        b.gen.insert(var, GenDef::Uninitialized);
    }

    fn mark_reference(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
        block: BlockId,
        var: VarId,
        pos: Pos,
    ) {
        let r = defs.add_reference(var, block, pos);
        let b = graph.block_mut(block);
        b.stats.push(CfStat::Reference(r));
        // A read proves the binding for the rest of this block: control
        // cannot leave the statement without the variable being bound.
        b.bound.insert(var);
    }
}

/// Loop descriptor, alive while the loop body is being walked.
#[derive(Clone, Copy)]
struct LoopFrame {
    exit: BlockId,
    continue_target: BlockId,
    /// Depth of the exception stack when the loop was entered; break and
    /// continue only route through finally suites pushed above this.
    try_depth: usize,
}

/// Exception descriptor, alive while the try construct is being walked.
struct TryFrame {
    handler_entry: BlockId,
    finally_enter: Option<BlockId>,
    /// Control-transfer targets that must be reached through the finally
    /// suite (loop exits, the function exit point), each with the
    /// exception-stack depth its transfer may not walk below. The suite
    /// forwards them onward when it completes, so transfers keep walking
    /// outer finally suites one at a time.
    pending: Vec<(usize, BlockId)>,
}

/// Walks a function's statement tree and produces the block graph plus the
/// recorded definitions and uses.
pub struct CfgBuilder<'a, T: FlowTracker> {
    graph: FlowGraph,
    defs: Defs,
    tracker: T,
    messages: &'a mut MessageCollection,
    loops: Vec<LoopFrame>,
    tries: Vec<TryFrame>,
    /// Current block; `None` after a terminator, making subsequent
    /// statements unreachable.
    block: Option<BlockId>,
}

impl<'a, T: FlowTracker> CfgBuilder<'a, T> {
    pub fn build(
        func: &FunctionDef,
        tracker: T,
        messages: &'a mut MessageCollection,
    ) -> FlowResult<(FlowGraph, Defs)> {
        let mut builder = Self {
            graph: FlowGraph::new(),
            defs: Defs::new(),
            tracker,
            messages,
            loops: Vec::new(),
            tries: Vec::new(),
            block: None,
        };
        builder.collect_locals(func);

        let entry_point = builder.graph.entry_point;
        let entry = builder.graph.new_block("entry", func.pos);
        builder.graph.add_child(entry_point, entry);
        builder.block = Some(entry);

        // Function body block; arguments are bound here.
        let body_block = builder.nextblock("function_body", func.pos, None);
        for arg in &func.args {
            let var = builder.lookup(arg)?;
            let _ = builder.tracker.mark_assignment(
                &mut builder.graph,
                &mut builder.defs,
                body_block,
                var,
                func.pos,
                true,
                false,
            );
        }

        builder.visit_body(&func.body)?;

        if let Some(cur) = builder.block {
            let exit = builder.graph.exit_point;
            builder.graph.add_child(cur, exit);
        }
        let exit = builder.graph.exit_point;
        builder.graph.commit_floating(exit);

        Ok((builder.graph, builder.defs))
    }

    /// Register every local name up front: arguments plus all assignment
    /// and deletion targets. Reads of unregistered names are non-local and
    /// not tracked.
    fn collect_locals(&mut self, func: &FunctionDef) {
        for arg in &func.args {
            let renameable = !func.pinned.contains(arg);
            self.defs.add_var(arg, renameable, true);
        }
        let mut names = Vec::new();
        collect_store_names(&func.body, &mut names);
        for name in names {
            if self.defs.lookup_var(&name).is_none() {
                let renameable = !func.pinned.contains(&name);
                self.defs.add_var(&name, renameable, false);
            }
        }
    }

    fn lookup(&self, name: &str) -> FlowResult<VarId> {
        self.defs
            .lookup_var(name)
            .ok_or_else(|| FlowError::MalformedAst {
                reason: format!("write to uncollected local '{name}'"),
            })
    }

    /// Create a committed block linked to `parent`, or to the current block
    /// when no parent is given, and make it current.
    fn nextblock(&mut self, label: &'static str, pos: Pos, parent: Option<BlockId>) -> BlockId {
        let block = self.graph.new_block(label, pos);
        match parent.or(self.block) {
            Some(p) => self.graph.add_child(p, block),
            None => {}
        }
        self.block = Some(block);
        block
    }

    fn visit_body(&mut self, stmts: &[Stmt]) -> FlowResult<()> {
        for (i, stmt) in stmts.iter().enumerate() {
            if self.block.is_none() {
                // Everything from here on is unreachable; flag once and
                // drop the rest from linkage.
                self.messages
                    .warning(DiagnosticKind::UnreachableCode, stmt.pos());
                log::debug!("dropping {} unreachable statement(s)", stmts.len() - i);
                break;
            }
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> FlowResult<()> {
        match stmt {
            Stmt::Assign { target, value, pos } => {
                self.visit_expr(value);
                self.mark_assignment_stmt(target, *pos, true)?;
            }
            Stmt::Del { name, pos } => {
                if let (Some(var), Some(cur)) = (self.defs.lookup_var(name), self.block) {
                    self.tracker
                        .mark_deletion(&mut self.graph, &mut self.defs, cur, var, *pos);
                }
            }
            Stmt::Expr { value, .. } => self.visit_expr(value),
            Stmt::If { test, body, orelse, pos } => self.visit_if(test, body, orelse, *pos)?,
            Stmt::While { test, body, orelse, pos } => {
                self.visit_while(test, body, orelse, *pos)?
            }
            Stmt::For { target, iter, body, orelse, pos } => {
                self.visit_for(target, iter, body, orelse, *pos)?
            }
            Stmt::Break { pos } => self.visit_break(*pos),
            Stmt::Continue { pos } => self.visit_continue(*pos),
            Stmt::Return { value, pos } => self.visit_return(value.as_ref(), *pos),
            Stmt::Raise { value, pos } => self.visit_raise(value.as_ref(), *pos),
            Stmt::Try { body, handler, orelse, finally, pos } => {
                self.visit_try(body, handler, orelse, finally, *pos)?
            }
        }
        Ok(())
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name { name, pos } => {
                if let (Some(var), Some(cur)) = (self.defs.lookup_var(name), self.block) {
                    self.tracker
                        .mark_reference(&mut self.graph, &mut self.defs, cur, var, *pos);
                }
            }
            Expr::Const { .. } => {}
            Expr::BinOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryOp { operand, .. } => self.visit_expr(operand),
            Expr::Call { args, .. } => {
                for arg in args {
                    self.visit_expr(arg);
                }
            }
        }
    }

    /// Record a write of `target` in the current block. Inside a try
    /// construct the block is split around the write, since the statement
    /// may transfer to the handler.
    fn mark_assignment_stmt(
        &mut self,
        target: &str,
        pos: Pos,
        warn_unused: bool,
    ) -> FlowResult<()> {
        self.exception_split(pos);
        let var = self.lookup(target)?;
        if let Some(cur) = self.block {
            let _ = self.tracker.mark_assignment(
                &mut self.graph,
                &mut self.defs,
                cur,
                var,
                pos,
                false,
                warn_unused,
            );
        }
        self.exception_split(pos);
        Ok(())
    }

    fn exception_split(&mut self, pos: Pos) {
        let Some(handler) = self.tries.last().map(|f| f.handler_entry) else {
            return;
        };
        if let Some(cur) = self.block {
            self.graph.add_child(cur, handler);
            self.nextblock("try_cont", pos, None);
        }
    }

    fn visit_if(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
        pos: Pos,
    ) -> FlowResult<()> {
        // The exit block floats until we know which branches reach it.
        let exit = self.graph.new_floating("exit_if", pos);

        let cond = self.nextblock("if_cond", test.pos(), None);
        self.visit_expr(test);

        self.nextblock("if_body", pos, None);
        self.visit_body(body)?;
        if let Some(b) = self.block {
            self.graph.add_child(b, exit);
        }

        if !orelse.is_empty() {
            self.nextblock("else_body", pos, Some(cond));
            self.visit_body(orelse)?;
            if let Some(b) = self.block {
                self.graph.add_child(b, exit);
            }
        } else {
            self.graph.add_child(cond, exit);
        }

        self.block = self.graph.commit_floating(exit).then_some(exit);
        Ok(())
    }

    fn visit_while(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
        pos: Pos,
    ) -> FlowResult<()> {
        let exit = self.graph.new_floating("exit_while", pos);
        let cond = self.nextblock("while_condition", test.pos(), None);
        self.loops.push(LoopFrame {
            exit,
            continue_target: cond,
            try_depth: self.tries.len(),
        });
        self.visit_expr(test);

        self.nextblock("while_body", pos, None);
        self.visit_body(body)?;
        self.loops.pop();

        // Fall-through closes the loop.
        if let Some(b) = self.block {
            self.graph.add_child(b, cond);
        }
        self.handle_loop_else(cond, exit, orelse)?;

        self.block = self.graph.commit_floating(exit).then_some(exit);
        Ok(())
    }

    fn visit_for(
        &mut self,
        target: &str,
        iter: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
        pos: Pos,
    ) -> FlowResult<()> {
        // The iterator is evaluated in the preceding block.
        self.visit_expr(iter);

        let cond = self.nextblock("for_condition", iter.pos(), None);
        let exit = self.graph.new_floating("exit_for", pos);
        // Per-iteration advance. Floating so it lands after every block the
        // body creates, keeping the list topological.
        let incr = self.graph.new_floating("for_increment", pos);
        self.loops.push(LoopFrame {
            exit,
            continue_target: incr,
            try_depth: self.tries.len(),
        });

        self.nextblock("for_body", pos, None);
        // The iteration variable is bound at the top of each iteration.
        self.mark_assignment_stmt(target, pos, false)?;
        self.visit_body(body)?;
        self.loops.pop();

        if let Some(b) = self.block {
            self.graph.add_child(b, incr);
        }
        if self.graph.commit_floating(incr) {
            self.graph.add_child(incr, cond);
        }

        self.block = None;
        self.handle_loop_else(cond, exit, orelse)?;

        self.block = self.graph.commit_floating(exit).then_some(exit);
        Ok(())
    }

    /// The else clause runs when the loop completes without `break`; it is
    /// a child of the condition block feeding the shared exit.
    fn handle_loop_else(
        &mut self,
        cond: BlockId,
        exit: BlockId,
        orelse: &[Stmt],
    ) -> FlowResult<()> {
        if !orelse.is_empty() {
            let else_pos = self.graph.block(cond).pos;
            self.nextblock("loop_else", else_pos, Some(cond));
            self.visit_body(orelse)?;
            if let Some(b) = self.block {
                self.graph.add_child(b, exit);
            }
        } else {
            self.graph.add_child(cond, exit);
        }
        Ok(())
    }

    fn visit_break(&mut self, pos: Pos) {
        let Some(frame) = self.loops.last().copied() else {
            self.messages.error(DiagnosticKind::BreakOutsideLoop, pos);
            return;
        };
        self.leave_via_finally(frame.try_depth, frame.exit);
    }

    fn visit_continue(&mut self, pos: Pos) {
        let Some(frame) = self.loops.last().copied() else {
            self.messages.error(DiagnosticKind::ContinueOutsideLoop, pos);
            return;
        };
        self.leave_via_finally(frame.try_depth, frame.continue_target);
    }

    fn visit_return(&mut self, value: Option<&Expr>, _pos: Pos) {
        if let Some(v) = value {
            self.visit_expr(v);
        }
        let exit = self.graph.exit_point;
        self.leave_via_finally(0, exit);
    }

    fn visit_raise(&mut self, value: Option<&Expr>, _pos: Pos) {
        if let Some(v) = value {
            self.visit_expr(v);
        }
        let Some(cur) = self.block.take() else { return };
        let target = match self.tries.last() {
            Some(frame) => frame.handler_entry,
            None => self.graph.exit_point,
        };
        self.graph.add_child(cur, target);
    }

    /// Transfer control out of the current block to `target`, routing
    /// through the innermost enclosing finally suite above `try_depth` if
    /// one exists. The current block becomes unreachable afterwards.
    fn leave_via_finally(&mut self, try_depth: usize, target: BlockId) {
        let Some(cur) = self.block.take() else { return };
        let finally = self.tries[try_depth..]
            .iter()
            .rposition(|f| f.finally_enter.is_some())
            .map(|i| i + try_depth);
        if let Some(i) = finally {
            if let Some(enter) = self.tries[i].finally_enter {
                self.graph.add_child(cur, enter);
                self.tries[i].pending.push((try_depth, target));
                return;
            }
        }
        self.graph.add_child(cur, target);
    }

    fn visit_try(
        &mut self,
        body: &[Stmt],
        handler: &[Stmt],
        orelse: &[Stmt],
        finally: &[Stmt],
        pos: Pos,
    ) -> FlowResult<()> {
        let handler_entry = self.graph.new_floating("except_body", pos);
        let finally_enter = (!finally.is_empty())
            .then(|| self.graph.new_floating("finally_body", pos));
        let exit = self.graph.new_floating("exit_try", pos);

        self.tries.push(TryFrame {
            handler_entry,
            finally_enter,
            pending: Vec::new(),
        });

        let body_block = self.nextblock("try_body", pos, None);
        // Any statement in the body may transfer to the handler.
        self.graph.add_child(body_block, handler_entry);
        self.visit_body(body)?;

        if !orelse.is_empty() {
            if self.block.is_some() {
                self.nextblock("try_else", pos, None);
            }
            self.visit_body(orelse)?;
        }

        let Some(frame) = self.tries.pop() else {
            return Err(FlowError::MalformedAst {
                reason: "exception frame stack underflow".into(),
            });
        };
        let after_body = self.block.take();

        self.block = self.graph.commit_floating(handler_entry).then_some(handler_entry);
        self.visit_body(handler)?;
        let after_handler = self.block.take();

        match finally_enter {
            Some(enter) => {
                if let Some(b) = after_body {
                    self.graph.add_child(b, enter);
                }
                if let Some(b) = after_handler {
                    self.graph.add_child(b, enter);
                }
                self.block = self.graph.commit_floating(enter).then_some(enter);
                self.visit_body(finally)?;
                if let Some(fin_end) = self.block.take() {
                    // Queued transfers resume their walk from here, through
                    // any finally suite still enclosing them.
                    for (depth, target) in frame.pending.iter().copied() {
                        self.block = Some(fin_end);
                        self.leave_via_finally(depth, target);
                    }
                    self.block = None;
                    self.graph.add_child(fin_end, exit);
                }
            }
            None => {
                if let Some(b) = after_body {
                    self.graph.add_child(b, exit);
                }
                if let Some(b) = after_handler {
                    self.graph.add_child(b, exit);
                }
            }
        }

        self.block = self.graph.commit_floating(exit).then_some(exit);
        Ok(())
    }
}

fn collect_store_names(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { target, .. } => out.push(target.clone()),
            Stmt::Del { name, .. } => out.push(name.clone()),
            Stmt::For { target, body, orelse, .. } => {
                out.push(target.clone());
                collect_store_names(body, out);
                collect_store_names(orelse, out);
            }
            Stmt::If { body, orelse, .. } | Stmt::While { body, orelse, .. } => {
                collect_store_names(body, out);
                collect_store_names(orelse, out);
            }
            Stmt::Try { body, handler, orelse, finally, .. } => {
                collect_store_names(body, out);
                collect_store_names(handler, out);
                collect_store_names(orelse, out);
                collect_store_names(finally, out);
            }
            _ => {}
        }
    }
}
