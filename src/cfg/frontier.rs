use crate::{
    ext::{bitset::BitSet, index::Index},
    prelude::*,
};

use super::Cfg;

/// Compute the dominance frontier of every block: the blocks where its
/// dominance ends. DF(B) holds every D such that B dominates a predecessor of
/// D but does not strictly dominate D.
///
/// Uses the join-point walk from Cytron et al.: only blocks with two or more
/// predecessors can be in a frontier, and they are in the frontier of every
/// block on the dominator chain from each predecessor up to (not including)
/// their own immediate dominator.
pub fn build_dominance_frontiers(cfg: &mut Cfg) {
    let block_count = cfg.blocks.len();
    let entry = cfg.entry();
    for block in cfg.blocks.indices().collect::<Vec<_>>() {
        cfg.blocks[block].frontier = BitSet::new(block_count);
    }

    for join in cfg.blocks.indices().collect::<Vec<_>>() {
        let preds: Vec<_> = cfg.predecessors(join).collect();
        if preds.len() < 2 {
            continue;
        }
        let stop = cfg.blocks[join].idom;

        for pred in preds {
            let mut runner = pred;
            while Some(runner) != stop {
                cfg.blocks[runner].frontier.insert(join.index());
                match cfg.blocks[runner].idom {
                    Some(idom) if runner != entry => runner = idom,
                    _ => break,
                }
            }
        }
    }

    for (id, block) in cfg.blocks.enumerate() {
        if !block.frontier.is_empty() {
            trace!("df({}) = {:?}", id, block.frontier.iter().collect::<Vec<_>>());
        }
    }
}
