// This module defines the data model shared by every analysis pass: source-level
// variables, the abstract control-flow statements recorded per block (assignments,
// references, deletions), phi nodes, and the SSA variable versions produced by
// renaming. Everything is stored in id-indexed tables owned by a single Defs
// value; blocks, statements and variables point at each other through these ids,
// which keeps def-use and use-def chains navigable in O(1) without reference
// cycles.

use hashbrown::{HashMap, HashSet};

use crate::ast::Pos;
use crate::graph::BlockId;

macro_rules! table_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

table_id!(VarId);
table_id!(AssignId);
table_id!(RefId);
table_id!(PhiId);
table_id!(SsaVarId);

/// A named source-level binding.
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    /// False for variables whose storage identity must be preserved; those
    /// are excluded from SSA renaming.
    pub renameable: bool,
    pub is_arg: bool,
    pub warn_unused: bool,
    /// Position of the first write, once seen.
    pub pos: Option<Pos>,
    /// Def chain: every assignment of this variable, in analysis order.
    pub cf_assignments: Vec<AssignId>,
    /// Use chain: every read of this variable, in analysis order.
    pub cf_references: Vec<RefId>,
}

/// What a block's `gen` map records for a variable: its last definition in
/// the block, or the killed/uninitialized sentinel left by a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenDef {
    Assignment(AssignId),
    Uninitialized,
}

/// One definition that may reach a program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachedDef {
    Uninitialized,
    Assignment(AssignId),
}

/// A write of a variable inside a block. Deletions are assignments of the
/// uninitialized sentinel.
#[derive(Debug)]
pub struct NameAssignment {
    pub var: VarId,
    pub block: BlockId,
    pub pos: Pos,
    pub is_deletion: bool,
    pub is_arg: bool,
    pub warn_unused: bool,
    /// Whether SSA renaming gives this definition a fresh version. False
    /// for argument bindings (they keep the seed version) and deletions.
    pub renames: bool,
    /// Unique dataflow bit, assigned by the reaching-definitions pass.
    pub bit: usize,
    /// References this definition reaches (filled by reaching-definitions).
    pub refs: HashSet<RefId>,
    /// Definitions reaching the program point just before this one.
    pub cf_state: Vec<ReachedDef>,
    pub cf_maybe_null: bool,
    pub cf_is_null: bool,
    /// SSA version defined here, once renamed.
    pub ssa_var: Option<SsaVarId>,
}

/// A read of a variable inside a block.
#[derive(Debug)]
pub struct NameReference {
    pub var: VarId,
    pub block: BlockId,
    pub pos: Pos,
    /// Definitions that may reach this read.
    pub cf_state: Vec<ReachedDef>,
    pub cf_maybe_null: bool,
    pub cf_is_null: bool,
    /// Use-def pointer: the unique SSA version this read resolves to.
    pub ssa_var: Option<SsaVarId>,
}

/// Synthetic merge-point definition.
#[derive(Debug)]
pub struct PhiNode {
    pub block: BlockId,
    pub var: VarId,
    /// SSA version this phi defines, once renamed.
    pub ssa_var: Option<SsaVarId>,
    /// Incoming versions, one reachable per predecessor path, deduplicated.
    pub incoming: Vec<SsaVarId>,
    /// Set when pruning removes the phi.
    pub dead: bool,
}

/// What defines an SSA version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsaDef {
    /// Seed version at function entry (uninitialized unless an argument).
    Initial,
    Assignment(AssignId),
    Phi(PhiId),
}

/// A consumer of an SSA version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsaUse {
    Reference(RefId),
    Phi(PhiId),
}

/// A renamed variable version with exactly one defining point.
#[derive(Debug)]
pub struct SsaVar {
    pub source: VarId,
    pub version: u32,
    /// Human-readable renamed identity, e.g. `x.2`.
    pub renamed: String,
    pub def: SsaDef,
    /// True if an execution path can reach a use of this version without
    /// passing a real definition.
    pub uninitialized: bool,
    /// Def-use chain of this version.
    pub cf_references: Vec<SsaUse>,
}

/// A statement slot inside a block, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfStat {
    Assignment(AssignId),
    Reference(RefId),
}

/// Id-indexed tables for variables, definitions, uses, phis and SSA
/// versions. One instance per analyzed function.
#[derive(Debug, Default)]
pub struct Defs {
    pub vars: Vec<Variable>,
    pub assignments: Vec<NameAssignment>,
    pub references: Vec<NameReference>,
    pub phis: Vec<PhiNode>,
    pub ssa_vars: Vec<SsaVar>,
    by_name: HashMap<String, VarId>,
}

impl Defs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: &str, renameable: bool, is_arg: bool) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Variable {
            name: name.to_string(),
            renameable,
            is_arg,
            warn_unused: true,
            pos: None,
            cf_assignments: Vec::new(),
            cf_references: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup_var(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.index()]
    }

    pub fn add_assignment(
        &mut self,
        var: VarId,
        block: BlockId,
        pos: Pos,
        is_deletion: bool,
        is_arg: bool,
        warn_unused: bool,
    ) -> AssignId {
        let id = AssignId(self.assignments.len() as u32);
        let renameable = self.var(var).renameable;
        self.assignments.push(NameAssignment {
            var,
            block,
            pos,
            is_deletion,
            is_arg,
            warn_unused,
            renames: renameable && !is_arg && !is_deletion,
            bit: usize::MAX,
            refs: HashSet::new(),
            cf_state: Vec::new(),
            cf_maybe_null: false,
            cf_is_null: false,
            ssa_var: None,
        });
        id
    }

    pub fn assignment(&self, id: AssignId) -> &NameAssignment {
        &self.assignments[id.index()]
    }

    pub fn assignment_mut(&mut self, id: AssignId) -> &mut NameAssignment {
        &mut self.assignments[id.index()]
    }

    pub fn add_reference(&mut self, var: VarId, block: BlockId, pos: Pos) -> RefId {
        let id = RefId(self.references.len() as u32);
        self.references.push(NameReference {
            var,
            block,
            pos,
            cf_state: Vec::new(),
            cf_maybe_null: true,
            cf_is_null: false,
            ssa_var: None,
        });
        id
    }

    pub fn reference(&self, id: RefId) -> &NameReference {
        &self.references[id.index()]
    }

    pub fn reference_mut(&mut self, id: RefId) -> &mut NameReference {
        &mut self.references[id.index()]
    }

    pub fn add_phi(&mut self, block: BlockId, var: VarId) -> PhiId {
        let id = PhiId(self.phis.len() as u32);
        self.phis.push(PhiNode {
            block,
            var,
            ssa_var: None,
            incoming: Vec::new(),
            dead: false,
        });
        id
    }

    pub fn phi(&self, id: PhiId) -> &PhiNode {
        &self.phis[id.index()]
    }

    pub fn phi_mut(&mut self, id: PhiId) -> &mut PhiNode {
        &mut self.phis[id.index()]
    }

    pub fn add_ssa_var(&mut self, source: VarId, version: u32, def: SsaDef) -> SsaVarId {
        let id = SsaVarId(self.ssa_vars.len() as u32);
        let renamed = format!("{}.{}", self.var(source).name, version);
        self.ssa_vars.push(SsaVar {
            source,
            version,
            renamed,
            def,
            uninitialized: false,
            cf_references: Vec::new(),
        });
        id
    }

    pub fn ssa(&self, id: SsaVarId) -> &SsaVar {
        &self.ssa_vars[id.index()]
    }

    pub fn ssa_mut(&mut self, id: SsaVarId) -> &mut SsaVar {
        &mut self.ssa_vars[id.index()]
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }
}
