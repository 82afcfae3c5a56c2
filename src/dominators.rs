// This module computes dominator sets, the dominator tree and dominance
// frontiers over the committed block list. The set computation is the classic
// iterative fixpoint dom(b) = {b} ∪ ⋂ dom(pred); the entry sentinel keeps an
// empty set, which makes the first real block the dominator-tree root. The
// immediate dominator is recovered as the strict dominator with the largest
// dominator set; the invariants of the fixpoint make that candidate unique,
// so a tie indicates graph corruption and is reported as a hard error rather
// than papered over. Frontiers are built in reverse list order so each node's
// dominator-tree children are finished first.

use hashbrown::{HashMap, HashSet};

use crate::error::{FlowError, FlowResult};
use crate::graph::{BlockId, FlowGraph};

/// Iterate the dominator-set equations to a fixpoint.
pub fn compute_dominator_sets(graph: &mut FlowGraph) {
    let all: HashSet<BlockId> = graph.blocks.iter().copied().collect();
    for i in 0..graph.blocks.len() {
        let bid = graph.blocks[i];
        graph.block_mut(bid).dominators = all.clone();
    }
    // The entry sentinel dominates nothing and keeps an empty set; any
    // block it feeds intersects down to just itself.
    let entry = graph.entry_point;
    graph.block_mut(entry).dominators = HashSet::new();

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..graph.blocks.len() {
            let bid = graph.blocks[i];
            let mut doms: Option<HashSet<BlockId>> = None;
            for p in graph.block(bid).parents.clone() {
                let pdoms = &graph.block(p).dominators;
                doms = Some(match doms {
                    None => pdoms.clone(),
                    Some(d) => d.intersection(pdoms).copied().collect(),
                });
            }
            let mut doms = doms.unwrap_or_default();
            doms.insert(bid);
            if doms != graph.block(bid).dominators {
                graph.block_mut(bid).dominators = doms;
                changed = true;
            }
        }
    }
}

/// Recover each block's immediate dominator from the dominator sets.
///
/// The root of the dominator tree (the first block in the list) gets none.
pub fn compute_immediate_dominators(graph: &mut FlowGraph) -> FlowResult<()> {
    for i in 0..graph.blocks.len() {
        let bid = graph.blocks[i];
        let idom = immediate_dominator(graph, bid)?;
        if idom.is_none() && i != 0 {
            return Err(FlowError::MissingIdom { block: bid.index() });
        }
        graph.block_mut(bid).idom = idom;
        log::trace!(
            "idom({}) = {:?}",
            graph.block(bid).label,
            idom.map(|d| graph.block(d).label)
        );
    }
    Ok(())
}

/// The strict dominator with the largest dominator set. Unique by the
/// nesting property of dominator sets; a tie means the sets are corrupt.
fn immediate_dominator(graph: &FlowGraph, block: BlockId) -> FlowResult<Option<BlockId>> {
    let doms = &graph.block(block).dominators;
    let mut best: Option<BlockId> = None;
    let mut best_len = 0usize;
    let mut tied = false;
    for &d in doms {
        if d == block {
            continue;
        }
        let len = graph.block(d).dominators.len();
        if best.is_none() || len > best_len {
            best = Some(d);
            best_len = len;
            tied = false;
        } else if len == best_len {
            tied = true;
        }
    }
    if tied {
        return Err(FlowError::AmbiguousIdom {
            block: block.index(),
        });
    }
    Ok(best)
}

/// Compute every block's dominance frontier.
///
/// Reverse list order guarantees each block's dominator-tree children are
/// processed first, so the up-propagation rule reads finished frontiers.
pub fn compute_dominance_frontiers(graph: &mut FlowGraph) {
    // Dominator-tree children, for the up rule.
    let mut tree_children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for &bid in &graph.blocks {
        if let Some(idom) = graph.block(bid).idom {
            tree_children.entry(idom).or_default().push(bid);
        }
    }

    for i in (0..graph.blocks.len()).rev() {
        let x = graph.blocks[i];
        let mut frontier: Vec<BlockId> = Vec::new();

        // Local rule: CFG successors not immediately dominated by x.
        for y in graph.block(x).children.clone() {
            if graph.block(y).idom != Some(x) {
                frontier.push(y);
            }
        }
        // Up rule: frontier entries of dominator-tree children that x does
        // not immediately dominate.
        if let Some(kids) = tree_children.get(&x) {
            for &z in kids.clone().iter() {
                for y in graph.block(z).dominance_frontier.clone() {
                    if graph.block(y).idom != Some(x) {
                        frontier.push(y);
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        frontier.retain(|&b| seen.insert(b));
        graph.block_mut(x).dominance_frontier = frontier;
    }
}
