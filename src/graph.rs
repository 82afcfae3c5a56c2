// This module implements the basic-block graph underlying control-flow analysis.
// Blocks live in an index arena owned by FlowGraph and reference each other by
// BlockId, so the mutual Block <-> Statement <-> Variable links elsewhere in the
// crate never form ownership cycles. The graph maintains an ordered list of
// committed blocks in topological dominator order: blocks are either committed
// on creation or allocated "floating" and committed once their parent set is
// known, which lets the CFG builder reserve a merge block before visiting the
// branches that feed it. Edge operations are symmetric; detach, reparent and
// delete always leave parent and child sets mutually consistent.

use hashbrown::{HashMap, HashSet};

use crate::ast::Pos;
use crate::bits::BitSet;
use crate::defs::{CfStat, GenDef, PhiId, VarId};
use crate::symtab::ScopeId;

/// Stable handle of a block in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Control flow graph node.
#[derive(Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Position in the committed block list; `usize::MAX` while floating or
    /// after deletion.
    pub seq: usize,
    pub label: &'static str,
    pub pos: Pos,

    /// Predecessors, insertion ordered and deduplicated.
    pub parents: Vec<BlockId>,
    /// Successors, insertion ordered and deduplicated.
    pub children: Vec<BlockId>,

    /// Abstract control-flow statements in program order.
    pub stats: Vec<CfStat>,
    /// Last definition of each variable written in this block.
    pub gen: HashMap<VarId, GenDef>,
    /// Variables guaranteed assigned by block exit (a read proves the
    /// binding on every path that continues past it).
    pub bound: HashSet<VarId>,

    // Reaching-definitions dataflow state.
    pub i_gen: BitSet,
    pub i_kill: BitSet,
    pub i_input: BitSet,
    pub i_output: BitSet,

    // Dominance data.
    pub dominators: HashSet<BlockId>,
    pub idom: Option<BlockId>,
    pub dominance_frontier: Vec<BlockId>,

    /// Phi nodes of this block, insertion ordered.
    pub phis: Vec<PhiId>,
    /// Block-local scope, chained to the immediate dominator's scope.
    pub scope: Option<ScopeId>,
}

impl BasicBlock {
    fn new(id: BlockId, label: &'static str, pos: Pos) -> Self {
        Self {
            id,
            seq: usize::MAX,
            label,
            pos,
            parents: Vec::new(),
            children: Vec::new(),
            stats: Vec::new(),
            gen: HashMap::new(),
            bound: HashSet::new(),
            i_gen: BitSet::new(),
            i_kill: BitSet::new(),
            i_input: BitSet::new(),
            i_output: BitSet::new(),
            dominators: HashSet::new(),
            idom: None,
            dominance_frontier: Vec::new(),
            phis: Vec::new(),
            scope: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// Block arena plus the committed block list.
///
/// `entry_point` and `exit_point` are fixed sentinels: the entry point never
/// appears in the committed list (it has no statements and no predecessors),
/// the exit point is committed at the end of construction once something
/// links to it.
#[derive(Debug)]
pub struct FlowGraph {
    arena: Vec<BasicBlock>,
    /// Committed blocks in topological dominator order.
    pub blocks: Vec<BlockId>,
    pub entry_point: BlockId,
    pub exit_point: BlockId,
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            arena: Vec::new(),
            blocks: Vec::new(),
            entry_point: BlockId(0),
            exit_point: BlockId(1),
        };
        graph.entry_point = graph.alloc("entry_point", Pos::default());
        graph.exit_point = graph.alloc("exit_point", Pos::default());
        graph
    }

    fn alloc(&mut self, label: &'static str, pos: Pos) -> BlockId {
        let id = BlockId(self.arena.len() as u32);
        self.arena.push(BasicBlock::new(id, label, pos));
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.arena[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.arena[id.index()]
    }

    /// Create a block and commit it to the block list.
    pub fn new_block(&mut self, label: &'static str, pos: Pos) -> BlockId {
        let id = self.alloc(label, pos);
        self.arena[id.index()].seq = self.blocks.len();
        self.blocks.push(id);
        id
    }

    /// Create a floating block: allocated, linkable, but not yet in the
    /// block list. Commit it with [`commit_floating`](Self::commit_floating)
    /// after the constructs feeding it have been visited, so the list stays
    /// in topological dominator order.
    pub fn new_floating(&mut self, label: &'static str, pos: Pos) -> BlockId {
        self.alloc(label, pos)
    }

    /// Commit a floating block if it ended up with at least one parent.
    /// Returns whether the block was committed; unparented blocks stay out
    /// of the graph.
    pub fn commit_floating(&mut self, id: BlockId) -> bool {
        if self.arena[id.index()].parents.is_empty() {
            return false;
        }
        self.arena[id.index()].seq = self.blocks.len();
        self.blocks.push(id);
        true
    }

    pub fn is_committed(&self, id: BlockId) -> bool {
        self.arena[id.index()].seq != usize::MAX
    }

    /// Add a control edge, updating both endpoints. Duplicate edges are
    /// ignored.
    pub fn add_child(&mut self, parent: BlockId, child: BlockId) {
        if !self.arena[parent.index()].children.contains(&child) {
            self.arena[parent.index()].children.push(child);
        }
        if !self.arena[child.index()].parents.contains(&parent) {
            self.arena[child.index()].parents.push(parent);
        }
    }

    /// Remove all edges touching `id`, in both directions.
    pub fn detach(&mut self, id: BlockId) {
        let children = std::mem::take(&mut self.arena[id.index()].children);
        for child in children {
            self.arena[child.index()].parents.retain(|&p| p != id);
        }
        let parents = std::mem::take(&mut self.arena[id.index()].parents);
        for parent in parents {
            self.arena[parent.index()].children.retain(|&c| c != id);
        }
    }

    /// Redirect all children of `id` to `new_block`. Used when eliminating
    /// an empty block.
    pub fn reparent(&mut self, id: BlockId, new_block: BlockId) {
        let children = self.arena[id.index()].children.clone();
        for child in children {
            self.arena[child.index()].parents.retain(|&p| p != id);
            self.arena[id.index()].children.retain(|&c| c != child);
            self.add_child(new_block, child);
        }
    }

    /// Unlink a block from its neighbors and drop it from the block list.
    pub fn delete(&mut self, id: BlockId) {
        self.detach(id);
        self.blocks.retain(|&b| b != id);
        self.arena[id.index()].seq = usize::MAX;
        self.resequence();
    }

    fn resequence(&mut self) {
        for (seq, &id) in self.blocks.iter().enumerate() {
            self.arena[id.index()].seq = seq;
        }
    }

    /// Delete unreachable blocks and merge away empty reachable ones.
    ///
    /// A reachable block with no statements is removed by reparenting: each
    /// of its parents adopts its children. The entry and exit sentinels are
    /// never merged.
    pub fn normalize(&mut self) {
        // Reachability from the entry sentinel.
        let mut visited: HashSet<BlockId> = HashSet::new();
        let mut queue = vec![self.entry_point];
        while let Some(id) = queue.pop() {
            if !visited.insert(id) {
                continue;
            }
            for &child in &self.arena[id.index()].children {
                queue.push(child);
            }
        }

        let unreachable: Vec<BlockId> = self
            .blocks
            .iter()
            .copied()
            .filter(|b| !visited.contains(b))
            .collect();
        for id in unreachable {
            log::debug!("normalize: deleting unreachable block {}", id.0);
            self.delete(id);
        }

        // Merge empty blocks, preserving list order for the survivors.
        let order = self.blocks.clone();
        for id in order {
            if id == self.exit_point {
                continue;
            }
            if !self.arena[id.index()].is_empty() {
                continue;
            }
            log::debug!(
                "normalize: merging empty block {} ({})",
                id.0,
                self.arena[id.index()].label
            );
            let parents = self.arena[id.index()].parents.clone();
            let children = self.arena[id.index()].children.clone();
            for &parent in &parents {
                for &child in &children {
                    if child != id && parent != id {
                        self.add_child(parent, child);
                    }
                }
            }
            self.delete(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::default()
    }

    #[test]
    fn edges_are_symmetric() {
        let mut g = FlowGraph::new();
        let a = g.new_block("a", pos());
        let b = g.new_block("b", pos());
        g.add_child(a, b);
        g.add_child(a, b); // duplicate ignored
        assert_eq!(g.block(a).children, vec![b]);
        assert_eq!(g.block(b).parents, vec![a]);
    }

    #[test]
    fn detach_clears_both_directions() {
        let mut g = FlowGraph::new();
        let a = g.new_block("a", pos());
        let b = g.new_block("b", pos());
        let c = g.new_block("c", pos());
        g.add_child(a, b);
        g.add_child(b, c);
        g.detach(b);
        assert!(g.block(a).children.is_empty());
        assert!(g.block(b).parents.is_empty());
        assert!(g.block(b).children.is_empty());
        assert!(g.block(c).parents.is_empty());
    }

    #[test]
    fn reparent_redirects_children() {
        let mut g = FlowGraph::new();
        let a = g.new_block("a", pos());
        let b = g.new_block("b", pos());
        let c = g.new_block("c", pos());
        let d = g.new_block("d", pos());
        g.add_child(a, b);
        g.add_child(b, c);
        g.add_child(b, d);
        g.reparent(b, a);
        assert!(g.block(b).children.is_empty());
        assert_eq!(g.block(c).parents, vec![a]);
        assert_eq!(g.block(d).parents, vec![a]);
    }

    #[test]
    fn floating_blocks_commit_in_list_order() {
        let mut g = FlowGraph::new();
        let a = g.new_block("a", pos());
        let merge = g.new_floating("merge", pos());
        let b = g.new_block("b", pos());
        g.add_child(a, b);
        g.add_child(b, merge);
        assert!(g.commit_floating(merge));
        assert_eq!(g.blocks, vec![a, b, merge]);
        assert_eq!(g.block(merge).seq, 2);
    }

    #[test]
    fn unparented_floating_block_is_dropped() {
        let mut g = FlowGraph::new();
        let _a = g.new_block("a", pos());
        let dead = g.new_floating("dead", pos());
        assert!(!g.commit_floating(dead));
        assert!(!g.is_committed(dead));
    }

    #[test]
    fn normalize_removes_unreachable_blocks() {
        let mut g = FlowGraph::new();
        let a = g.new_block("a", pos());
        let orphan = g.new_block("orphan", pos());
        g.add_child(g.entry_point, a);
        g.normalize();
        assert_eq!(g.blocks, vec![a]);
        assert!(!g.is_committed(orphan));
    }

    #[test]
    fn normalize_merges_empty_blocks() {
        let mut g = FlowGraph::new();
        let a = g.new_block("a", pos());
        let empty = g.new_block("empty", pos());
        let b = g.new_block("b", pos());
        g.add_child(g.entry_point, a);
        g.add_child(a, empty);
        g.add_child(empty, b);
        // Give a and b content so only `empty` merges.
        g.block_mut(a).stats.push(CfStat::Reference(crate::defs::RefId(0)));
        g.block_mut(b).stats.push(CfStat::Reference(crate::defs::RefId(0)));
        g.normalize();
        assert_eq!(g.blocks, vec![a, b]);
        assert_eq!(g.block(b).parents, vec![a]);
        assert_eq!(g.block(a).children, vec![b]);
    }
}
