// This module generates control-flow diagnostics as structured records. The
// warner consumes reaching-definitions results and flags uninitialized and
// maybe-uninitialized references, unused variables and arguments, and unused
// assignment results; the CFG builder reports unreachable code and misplaced
// break/continue through the same collection. Rendering diagnostics to text is
// a presentation concern that lives outside this crate.

use crate::ast::Pos;
use crate::defs::{AssignId, Defs, ReachedDef, RefId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnreachableCode,
    UnusedVariable { name: String },
    UnusedArgument { name: String },
    UnusedAssignmentResult { name: String },
    /// The read is definitely unassigned on every path.
    UninitializedReference { name: String },
    /// The read is unassigned on some path.
    MaybeUninitializedReference { name: String },
    BreakOutsideLoop,
    ContinueOutsideLoop,
}

/// One structured warning or error record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub pos: Pos,
}

/// Accumulates diagnostics across all phases; reported after analysis
/// completes.
#[derive(Debug, Default)]
pub struct MessageCollection {
    diags: Vec<Diagnostic>,
}

impl MessageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, kind: DiagnosticKind, pos: Pos) {
        self.diags.push(Diagnostic {
            kind,
            severity: Severity::Warning,
            pos,
        });
    }

    pub fn error(&mut self, kind: DiagnosticKind, pos: Pos) {
        self.diags.push(Diagnostic {
            kind,
            severity: Severity::Error,
            pos,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diags
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }
}

/// Per-run toggles for the warning categories. Passed by value into the
/// pipeline; there is no ambient configuration.
#[derive(Debug, Clone, Copy)]
pub struct WarningDirectives {
    pub warn_maybe_uninitialized: bool,
    pub warn_unused: bool,
    pub warn_unused_arg: bool,
    pub warn_unused_result: bool,
}

impl Default for WarningDirectives {
    fn default() -> Self {
        Self {
            warn_maybe_uninitialized: true,
            warn_unused: true,
            warn_unused_arg: true,
            warn_unused_result: true,
        }
    }
}

/// Generates control-flow related warnings from analysis results.
pub struct CfWarner<'a> {
    pub messages: &'a mut MessageCollection,
    directives: WarningDirectives,
}

impl<'a> CfWarner<'a> {
    pub fn new(messages: &'a mut MessageCollection, directives: WarningDirectives) -> Self {
        Self { messages, directives }
    }

    /// Flag references whose reaching-definition set contains the
    /// uninitialized sentinel, and record the null hints on each reference.
    pub fn check_uninitialized(&mut self, defs: &mut Defs, references: &[RefId]) {
        for &r in references {
            let (maybe_null, only_null) = {
                let node = defs.reference(r);
                let maybe = node.cf_state.contains(&ReachedDef::Uninitialized);
                (maybe, maybe && node.cf_state.len() == 1)
            };
            let var = defs.reference(r).var;
            let name = defs.var(var).name.clone();
            let renameable = defs.var(var).renameable;
            let pos = defs.reference(r).pos;

            let node = defs.reference_mut(r);
            node.cf_maybe_null = maybe_null;
            node.cf_is_null = only_null;

            if !maybe_null {
                continue;
            }
            if only_null {
                // Definitely unassigned: hard error for renameable locals,
                // a warning for pinned storage the runtime may fill in.
                let kind = DiagnosticKind::UninitializedReference { name };
                if renameable {
                    self.messages.error(kind, pos);
                } else {
                    self.messages.warning(kind, pos);
                }
            } else if self.directives.warn_maybe_uninitialized {
                self.messages.warning(
                    DiagnosticKind::MaybeUninitializedReference { name },
                    pos,
                );
            }
        }
    }

    /// Warn about variables or arguments unused in the entire function.
    ///
    /// Pinned locals are exempt: their storage may be read externally. An
    /// unused argument is reported either way, pinned or not.
    pub fn warn_unused_entries(&mut self, defs: &Defs) {
        for var in &defs.vars {
            if !var.cf_references.is_empty() {
                continue;
            }
            let pos = var.pos.unwrap_or_default();
            if var.is_arg {
                if self.directives.warn_unused_arg {
                    self.messages.warning(
                        DiagnosticKind::UnusedArgument { name: var.name.clone() },
                        pos,
                    );
                }
            } else if var.renameable
                && self.directives.warn_unused
                && var.warn_unused
                && var.pos.is_some()
            {
                self.messages.warning(
                    DiagnosticKind::UnusedVariable { name: var.name.clone() },
                    pos,
                );
            }
        }
    }

    /// Warn about individual definitions that reach no reference, for
    /// variables that are otherwise used:
    ///
    /// ```text
    /// i = 0   // this definition generates a warning
    /// i = 1
    /// use(i)
    /// ```
    pub fn warn_unused_result(&mut self, defs: &Defs, assignments: &[AssignId]) {
        if !self.directives.warn_unused_result {
            return;
        }
        for &a in assignments {
            let assmt = defs.assignment(a);
            if !assmt.refs.is_empty() || assmt.is_deletion || !assmt.warn_unused {
                continue;
            }
            if defs.var(assmt.var).cf_references.is_empty() {
                // Entirely unused variable; warn_unused_entries covers it.
                continue;
            }
            self.messages.warning(
                DiagnosticKind::UnusedAssignmentResult {
                    name: defs.var(assmt.var).name.clone(),
                },
                assmt.pos,
            );
        }
    }

    pub fn warn_unreachable(&mut self, pos: Pos) {
        self.messages.warning(DiagnosticKind::UnreachableCode, pos);
    }
}
