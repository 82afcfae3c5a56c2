// This module implements reaching definitions as a forward bit-vector dataflow
// problem. Every variable owns one base bit standing for "uninitialized" plus
// one bit per assignment; a variable's mask is the union of all its bits. The
// entry sentinel generates every base bit, so a path that bypasses all writes
// carries the uninitialized sentinel to any read it reaches. The solver
// iterates i_output = (i_input \ i_kill) | i_gen over the committed block list
// until a full sweep changes nothing; the topological list order makes the
// acyclic part converge in one sweep and each loop nesting level costs at most
// one more.

use crate::bits::BitSet;
use crate::defs::{AssignId, CfStat, Defs, GenDef, ReachedDef, RefId, VarId};
use crate::graph::FlowGraph;
use crate::warnings::CfWarner;

/// Dataflow bits of a single variable.
#[derive(Debug, Default)]
struct AssignmentList {
    /// Bit standing for the uninitialized state.
    base_bit: usize,
    /// Assignments of the variable, in block-list program order.
    stats: Vec<AssignId>,
    /// All bits belonging to the variable, base bit included.
    mask: BitSet,
}

/// Reaching-definitions solver. One instance per analyzed function;
/// `initialize` numbers the bits, `solve` runs the fixpoint, and
/// `check_definitions` decodes per-statement states and raises diagnostics.
#[derive(Debug, Default)]
pub struct ReachingDefs {
    lists: Vec<AssignmentList>,
    num_bits: usize,
    sweeps: usize,
}

impl ReachingDefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of full sweeps the last `solve` call needed, including the
    /// final sweep that observed no change.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Assign dataflow bits and compute every block's gen and kill sets.
    pub fn initialize(&mut self, graph: &mut FlowGraph, defs: &mut Defs) {
        self.lists.clear();
        self.num_bits = 0;

        // Base bits first: one uninitialized sentinel per variable.
        for _ in 0..defs.var_count() {
            let mut list = AssignmentList {
                base_bit: self.num_bits,
                stats: Vec::new(),
                mask: BitSet::new(),
            };
            list.mask.insert(list.base_bit);
            self.num_bits += 1;
            self.lists.push(list);
        }

        // Then one bit per assignment, in block-list program order.
        for &bid in &graph.blocks {
            for &stat in &graph.block(bid).stats {
                if let CfStat::Assignment(a) = stat {
                    let var = defs.assignment(a).var;
                    defs.assignment_mut(a).bit = self.num_bits;
                    let list = &mut self.lists[var.index()];
                    list.stats.push(a);
                    list.mask.insert(self.num_bits);
                    self.num_bits += 1;
                }
            }
        }
        log::debug!(
            "reaching: {} bits over {} blocks",
            self.num_bits,
            graph.blocks.len()
        );

        // The entry sentinel generates the uninitialized state of every
        // variable; argument bindings in the first real block kill it.
        let entry = graph.entry_point;
        for list in &self.lists {
            graph.block_mut(entry).i_gen.insert(list.base_bit);
        }
        let entry_gen = graph.block(entry).i_gen.clone();
        graph.block_mut(entry).i_output = entry_gen;

        for i in 0..graph.blocks.len() {
            let bid = graph.blocks[i];
            let mut i_gen = BitSet::new();
            let mut i_kill = BitSet::new();
            for (&var, &gen) in &graph.block(bid).gen {
                let list = &self.lists[var.index()];
                i_kill.union_with(&list.mask);
                let bit = match gen {
                    GenDef::Assignment(a) => defs.assignment(a).bit,
                    GenDef::Uninitialized => list.base_bit,
                };
                i_gen.insert(bit);
            }
            // A read proves the binding for every path leaving the block.
            for &var in &graph.block(bid).bound {
                i_kill.insert(self.lists[var.index()].base_bit);
            }
            let block = graph.block_mut(bid);
            block.i_gen = i_gen;
            block.i_kill = i_kill;
        }
    }

    /// Iterate the transfer function to a fixpoint.
    pub fn solve(&mut self, graph: &mut FlowGraph) {
        self.sweeps = 0;
        loop {
            self.sweeps += 1;
            let mut changed = false;
            for i in 0..graph.blocks.len() {
                let bid = graph.blocks[i];
                let mut input = BitSet::new();
                for p in graph.block(bid).parents.clone() {
                    input.union_with(&graph.block(p).i_output);
                }
                let mut output = input.clone();
                output.subtract(&graph.block(bid).i_kill);
                output.union_with(&graph.block(bid).i_gen);

                let block = graph.block_mut(bid);
                if block.i_output != output {
                    changed = true;
                }
                block.i_input = input;
                block.i_output = output;
            }
            if !changed {
                break;
            }
        }
        log::debug!("reaching: converged after {} sweep(s)", self.sweeps);
    }

    /// Decode the definitions of `var` present in `bits`.
    fn map_one(&self, defs: &Defs, bits: &BitSet, var: VarId) -> Vec<ReachedDef> {
        let list = &self.lists[var.index()];
        let mut out = Vec::new();
        if bits.contains(list.base_bit) {
            out.push(ReachedDef::Uninitialized);
        }
        for &a in &list.stats {
            if bits.contains(defs.assignment(a).bit) {
                out.push(ReachedDef::Assignment(a));
            }
        }
        out
    }

    /// Walk every block's statements in order, threading the bit state
    /// through each one: record the reaching set on every assignment and
    /// reference, link def-use edges, and raise uninitialized/unused
    /// diagnostics through `warner`.
    pub fn check_definitions(
        &mut self,
        graph: &FlowGraph,
        defs: &mut Defs,
        warner: &mut CfWarner<'_>,
    ) {
        let mut all_assignments: Vec<AssignId> = Vec::new();
        let mut all_references: Vec<RefId> = Vec::new();

        for &bid in &graph.blocks {
            let mut state = graph.block(bid).i_input.clone();
            for &stat in &graph.block(bid).stats {
                match stat {
                    CfStat::Assignment(a) => {
                        let var = defs.assignment(a).var;
                        let cf_state = self.map_one(defs, &state, var);
                        let list = &self.lists[var.index()];
                        state.subtract(&list.mask);
                        if defs.assignment(a).is_deletion {
                            state.insert(list.base_bit);
                        } else {
                            state.insert(defs.assignment(a).bit);
                        }
                        defs.assignment_mut(a).cf_state = cf_state;
                        defs.var_mut(var).cf_assignments.push(a);
                        all_assignments.push(a);
                    }
                    CfStat::Reference(r) => {
                        let var = defs.reference(r).var;
                        let cf_state = self.map_one(defs, &state, var);
                        // Past this read the variable is known bound.
                        state.remove(self.lists[var.index()].base_bit);
                        for &d in &cf_state {
                            if let ReachedDef::Assignment(a) = d {
                                defs.assignment_mut(a).refs.insert(r);
                            }
                        }
                        defs.reference_mut(r).cf_state = cf_state;
                        defs.var_mut(var).cf_references.push(r);
                        all_references.push(r);
                    }
                }
            }
        }

        for &a in &all_assignments {
            let maybe = defs
                .assignment(a)
                .cf_state
                .contains(&ReachedDef::Uninitialized);
            let only = maybe && defs.assignment(a).cf_state.len() == 1;
            let node = defs.assignment_mut(a);
            node.cf_maybe_null = maybe;
            node.cf_is_null = only;
        }

        warner.check_uninitialized(defs, &all_references);
        warner.warn_unused_entries(defs);
        warner.warn_unused_result(defs, &all_assignments);
    }
}
