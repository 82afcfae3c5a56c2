// This module turns the analyzed CFG into SSA form: phi placement over
// dominance frontiers, version renaming in a single pass over the block list,
// phi input resolution through the finalized block scopes, and pruning of phi
// nodes nothing reads. Renaming leans on the block list being in topological
// dominator order: every block's immediate dominator appears earlier, so its
// scope is complete by the time a block chains onto it, and one forward pass
// suffices. Phi inputs are resolved afterwards, once every predecessor's
// scope is final, which is what makes loop back-edges work.

use hashbrown::HashSet;

use crate::defs::{CfStat, Defs, PhiId, SsaDef, SsaUse, VarId};
use crate::error::{FlowError, FlowResult};
use crate::graph::{BlockId, FlowGraph};
use crate::symtab::ScopeTree;

/// Drives the SSA construction phases. Owns the scope tree so tests can
/// inspect bindings after a run.
#[derive(Debug, Default)]
pub struct SsaBuilder {
    scopes: ScopeTree,
}

impl SsaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all four phases. Requires dominators and dominance frontiers to
    /// be computed.
    pub fn run(&mut self, graph: &mut FlowGraph, defs: &mut Defs) -> FlowResult<()> {
        self.place_phis(graph, defs);
        self.rename(graph, defs)?;
        self.resolve_incoming(graph, defs)?;
        self.prune(graph, defs);
        Ok(())
    }

    /// Insert a phi node for each renameable variable in every block of the
    /// iterated dominance frontier of the variable's defining blocks.
    pub fn place_phis(&mut self, graph: &mut FlowGraph, defs: &mut Defs) {
        for v in 0..defs.var_count() {
            let var = VarId(v as u32);
            if !defs.var(var).renameable {
                continue;
            }
            let mut worklist: Vec<BlockId> = graph
                .blocks
                .iter()
                .copied()
                .filter(|&b| graph.block(b).gen.contains_key(&var))
                .collect();
            let mut has_phi: HashSet<BlockId> = HashSet::new();

            while let Some(b) = worklist.pop() {
                for df in graph.block(b).dominance_frontier.clone() {
                    if has_phi.insert(df) {
                        let phi = defs.add_phi(df, var);
                        graph.block_mut(df).phis.push(phi);
                        log::trace!(
                            "phi for '{}' at {}",
                            defs.var(var).name,
                            graph.block(df).label
                        );
                        // The phi is itself a definition and cascades.
                        worklist.push(df);
                    }
                }
            }
        }
    }

    /// Assign SSA versions in one forward pass over the block list.
    ///
    /// The entry sentinel's scope seeds version 0 of every renameable
    /// variable; the seed is the uninitialized sentinel except for
    /// arguments, which are bound on entry. Hanging the seeds off the
    /// sentinel (rather than the first block) lets phi input resolution
    /// treat an entry predecessor like any other, which matters when a
    /// loop header ends up first in the list. Argument bindings keep the
    /// seed version instead of renaming.
    pub fn rename(&mut self, graph: &mut FlowGraph, defs: &mut Defs) -> FlowResult<()> {
        let root = self.scopes.new_scope(None);
        for v in 0..defs.var_count() {
            let var = VarId(v as u32);
            if !defs.var(var).renameable {
                continue;
            }
            let ssa = self.scopes.rename(defs, root, var, SsaDef::Initial);
            defs.ssa_mut(ssa).uninitialized = !defs.var(var).is_arg;
        }
        let entry = graph.entry_point;
        graph.block_mut(entry).scope = Some(root);

        for i in 0..graph.blocks.len() {
            let bid = graph.blocks[i];
            let scope = if i == 0 {
                self.scopes.new_scope(Some(root))
            } else {
                let idom = graph
                    .block(bid)
                    .idom
                    .ok_or(FlowError::MissingIdom { block: bid.index() })?;
                let parent =
                    graph
                        .block(idom)
                        .scope
                        .ok_or(FlowError::MissingScope {
                            block: idom.index(),
                        })?;
                self.scopes.new_scope(Some(parent))
            };
            graph.block_mut(bid).scope = Some(scope);

            // Phi definitions precede every statement of the block.
            for phi in graph.block(bid).phis.clone() {
                let var = defs.phi(phi).var;
                let ssa = self.scopes.rename(defs, scope, var, SsaDef::Phi(phi));
                defs.phi_mut(phi).ssa_var = Some(ssa);
            }

            for stat in graph.block(bid).stats.clone() {
                match stat {
                    CfStat::Assignment(a) => {
                        let var = defs.assignment(a).var;
                        if defs.assignment(a).renames {
                            let ssa =
                                self.scopes
                                    .rename(defs, scope, var, SsaDef::Assignment(a));
                            defs.assignment_mut(a).ssa_var = Some(ssa);
                        } else if defs.assignment(a).is_arg {
                            // Arguments bind the seed version.
                            let ssa = self.scopes.lookup_most_recent(scope, var);
                            defs.assignment_mut(a).ssa_var = ssa;
                        }
                    }
                    CfStat::Reference(r) => {
                        let var = defs.reference(r).var;
                        if !defs.var(var).renameable {
                            continue;
                        }
                        let ssa = self
                            .scopes
                            .lookup_most_recent(scope, var)
                            .ok_or_else(|| FlowError::UnresolvedName {
                                name: defs.var(var).name.clone(),
                            })?;
                        defs.reference_mut(r).ssa_var = Some(ssa);
                        defs.ssa_mut(ssa).cf_references.push(SsaUse::Reference(r));
                    }
                }
            }
        }
        Ok(())
    }

    /// Fill in every phi's incoming versions from its predecessors' final
    /// scopes, deduplicated, and propagate the uninitialized flag through
    /// phi chains.
    pub fn resolve_incoming(
        &mut self,
        graph: &mut FlowGraph,
        defs: &mut Defs,
    ) -> FlowResult<()> {
        for &bid in &graph.blocks {
            for phi in graph.block(bid).phis.clone() {
                let var = defs.phi(phi).var;
                let mut incoming = Vec::new();
                for p in graph.block(bid).parents.clone() {
                    let pscope =
                        graph
                            .block(p)
                            .scope
                            .ok_or(FlowError::MissingScope { block: p.index() })?;
                    let ssa = self
                        .scopes
                        .lookup_most_recent(pscope, var)
                        .ok_or_else(|| FlowError::UnresolvedName {
                            name: defs.var(var).name.clone(),
                        })?;
                    if !incoming.contains(&ssa) {
                        incoming.push(ssa);
                        defs.ssa_mut(ssa).cf_references.push(SsaUse::Phi(phi));
                    }
                }
                defs.phi_mut(phi).incoming = incoming;
            }
        }

        // An uninitialized input makes the phi's output uninitialized;
        // iterate for chains through loop back-edges.
        let mut changed = true;
        while changed {
            changed = false;
            for p in 0..defs.phis.len() {
                let phi = PhiId(p as u32);
                let Some(out) = defs.phi(phi).ssa_var else { continue };
                if defs.ssa(out).uninitialized {
                    continue;
                }
                let tainted = defs
                    .phi(phi)
                    .incoming
                    .iter()
                    .any(|&i| defs.ssa(i).uninitialized);
                if tainted {
                    defs.ssa_mut(out).uninitialized = true;
                    changed = true;
                }
            }
        }
        Ok(())
    }

    /// Remove phi nodes whose output has no consumers. Removing one phi can
    /// orphan another that fed it, so sweep in reverse list order until a
    /// full pass removes nothing.
    pub fn prune(&mut self, graph: &mut FlowGraph, defs: &mut Defs) {
        loop {
            let mut removed = false;
            for i in (0..graph.blocks.len()).rev() {
                let bid = graph.blocks[i];
                for phi in graph.block(bid).phis.clone() {
                    let Some(out) = defs.phi(phi).ssa_var else { continue };
                    if !defs.ssa(out).cf_references.is_empty() {
                        continue;
                    }
                    log::trace!(
                        "pruning dead phi for '{}' at {}",
                        defs.var(defs.phi(phi).var).name,
                        graph.block(bid).label
                    );
                    defs.phi_mut(phi).dead = true;
                    graph.block_mut(bid).phis.retain(|&p| p != phi);
                    if let Some(scope) = graph.block(bid).scope {
                        self.scopes.unbind(scope, defs.phi(phi).var, out);
                    }
                    for inc in defs.phi(phi).incoming.clone() {
                        defs.ssa_mut(inc)
                            .cf_references
                            .retain(|&u| u != SsaUse::Phi(phi));
                    }
                    removed = true;
                }
            }
            if !removed {
                break;
            }
        }
    }
}
