use crate::{ext::index::Index, prelude::*};

use super::{Block, BlockId, Cfg, EdgeId};

/// Number every block reachable from the entry in reverse postorder.
///
/// Blocks are numbered as they finish in a depth-first traversal that follows
/// outgoing edges in list order, counting down from `blocks.len() - 1`. A block
/// finished earlier therefore has a larger number, and a smaller number means
/// earlier in reverse postorder. Unreachable blocks stay unnumbered and
/// unvisited. Returns the reachable blocks in reverse postorder.
pub fn number_blocks(cfg: &mut Cfg) -> Vec<BlockId> {
    for block in cfg.blocks.indices().collect::<Vec<_>>() {
        cfg.blocks[block].visited = false;
        cfg.blocks[block].rpo = None;
    }

    let entry = cfg.entry();
    let mut next_number = cfg.blocks.len();
    let mut stack: Vec<(BlockId, Option<EdgeId>)> = vec![(entry, cfg.blocks[entry].succ)];
    cfg.blocks[entry].visited = true;

    while let Some((block, pending)) = stack.last_mut() {
        match *pending {
            Some(edge) => {
                *pending = cfg.edges[edge].next_succ;
                let sink = cfg.edges[edge].sink;
                if !cfg.blocks[sink].visited {
                    cfg.blocks[sink].visited = true;
                    stack.push((sink, cfg.blocks[sink].succ));
                }
            }
            None => {
                let finished = *block;
                stack.pop();
                next_number -= 1;
                cfg.blocks[finished].rpo = Some(next_number);
            }
        }
    }

    let order = cfg.reverse_postorder();
    trace!(
        "{}: reverse postorder {}",
        cfg.name,
        order.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    );
    order
}

/// Drop every block the last numbering did not visit, rebuilding the block
/// array and edge arena over the remaining blocks. Returns the number of
/// blocks dropped. Block numbering has to be redone afterwards.
pub fn prune_unreachable(cfg: &mut Cfg) -> usize {
    let dropped = cfg.blocks.iter().filter(|b| !b.visited).count();
    if dropped == 0 {
        return 0;
    }

    let remaining = cfg.blocks.len() - dropped;
    let old_blocks = std::mem::take(&mut cfg.blocks);
    let old_edges = std::mem::take(&mut cfg.edges);

    let mut renumbered: Vec<Option<BlockId>> = Vec::with_capacity(old_blocks.len());
    for (index, block) in old_blocks.into_raw().into_iter().enumerate() {
        if !block.visited {
            warn!(
                "{}: dropping unreachable block {}{}",
                cfg.name,
                BlockId::new(index),
                block.label.map(|l| format!(" ({})", l)).unwrap_or_default()
            );
            renumbered.push(None);
            continue;
        }
        let id = cfg.blocks.push(Block::new(block.label, block.instrs, remaining));
        renumbered.push(Some(id));
    }

    for edge in old_edges.iter() {
        let src = renumbered[edge.src.index()];
        let sink = renumbered[edge.sink.index()];
        if let (Some(src), Some(sink)) = (src, sink) {
            cfg.add_edge(src, sink);
        }
    }

    dropped
}
