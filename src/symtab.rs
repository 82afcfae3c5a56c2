//! Block-local symbol tables for SSA renaming.
//!
//! Each block gets a scope chained to its immediate dominator's scope, so
//! "most recent definition visible here" is a walk up the dominator tree.
//! Version counters live on the tree and are global per variable; renaming a
//! variable allocates the next version and binds it in the given scope.

use hashbrown::HashMap;

use crate::defs::{Defs, SsaDef, SsaVarId, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    bindings: HashMap<VarId, SsaVarId>,
}

/// Arena of scopes plus the per-variable version counters.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    counters: HashMap<VarId, u32>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            bindings: HashMap::new(),
        });
        id
    }

    /// Allocate the next version of `var`, record it in `defs`, and bind it
    /// in `scope`.
    pub fn rename(
        &mut self,
        defs: &mut Defs,
        scope: ScopeId,
        var: VarId,
        def: SsaDef,
    ) -> SsaVarId {
        let counter = self.counters.entry(var).or_insert(0);
        let version = *counter;
        *counter += 1;
        let ssa = defs.add_ssa_var(var, version, def);
        self.scopes[scope.index()].bindings.insert(var, ssa);
        ssa
    }

    /// Most recent version of `var` visible from `scope`, walking the
    /// dominator-tree scope chain.
    pub fn lookup_most_recent(&self, scope: ScopeId, var: VarId) -> Option<SsaVarId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = &self.scopes[id.index()];
            if let Some(&ssa) = s.bindings.get(&var) {
                return Some(ssa);
            }
            cur = s.parent;
        }
        None
    }

    /// Drop the binding of `var` in `scope` if it still names `ssa`. Used
    /// when pruning a dead phi.
    pub fn unbind(&mut self, scope: ScopeId, var: VarId, ssa: SsaVarId) {
        let bindings = &mut self.scopes[scope.index()].bindings;
        if bindings.get(&var) == Some(&ssa) {
            bindings.remove(&var);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_lookup_finds_dominating_definition() {
        let mut defs = Defs::new();
        let x = defs.add_var("x", true, false);

        let mut tree = ScopeTree::new();
        let root = tree.new_scope(None);
        let child = tree.new_scope(Some(root));

        let v0 = tree.rename(&mut defs, root, x, SsaDef::Initial);
        assert_eq!(tree.lookup_most_recent(child, x), Some(v0));

        let v1 = tree.rename(&mut defs, child, x, SsaDef::Initial);
        assert_eq!(tree.lookup_most_recent(child, x), Some(v1));
        assert_eq!(tree.lookup_most_recent(root, x), Some(v0));
        assert_eq!(defs.ssa(v1).renamed, "x.1");
    }

    #[test]
    fn unbind_only_removes_matching_version() {
        let mut defs = Defs::new();
        let x = defs.add_var("x", true, false);

        let mut tree = ScopeTree::new();
        let root = tree.new_scope(None);
        let v0 = tree.rename(&mut defs, root, x, SsaDef::Initial);
        let v1 = tree.rename(&mut defs, root, x, SsaDef::Initial);

        tree.unbind(root, x, v0); // stale version, binding stays
        assert_eq!(tree.lookup_most_recent(root, x), Some(v1));
        tree.unbind(root, x, v1);
        assert_eq!(tree.lookup_most_recent(root, x), None);
    }
}
