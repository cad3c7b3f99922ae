//! Dominator tree construction.
//!
//! Uses the iterative algorithm from "A Simple, Fast Dominance Algorithm" by
//! K. D. Cooper, T. J. Harvey and K. Kennedy, over the reverse postorder
//! numbers assigned by [`super::number_blocks`].

use crate::prelude::*;

use super::{BlockId, Cfg, CfgError};

/// Compute the immediate dominator of every numbered block and link the
/// dominator tree through `dom_child`/`dom_sibling`.
pub fn build_dominator_tree(cfg: &mut Cfg) -> Result<(), CfgError> {
    let order = cfg.reverse_postorder();
    let entry = cfg.entry();

    for block in cfg.blocks.indices().collect::<Vec<_>>() {
        let block = &mut cfg.blocks[block];
        block.idom = None;
        block.dom_child = None;
        block.dom_sibling = None;
    }
    cfg.blocks[entry].idom = Some(entry);

    let mut changed = true;
    let mut sweeps = 0;
    while changed {
        changed = false;
        sweeps += 1;

        for &block in order.iter().filter(|b| **b != entry) {
            let mut new_idom = None;
            for pred in cfg.predecessors(block) {
                if cfg.blocks[pred].idom.is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(cfg, pred, current),
                });
            }

            let Some(new_idom) = new_idom else {
                return Err(CfgError::NoProcessedPredecessor(block));
            };
            if cfg.blocks[block].idom != Some(new_idom) {
                cfg.blocks[block].idom = Some(new_idom);
                changed = true;
            }
        }
    }
    debug!("{}: dominators converged after {} sweeps", cfg.name, sweeps);

    // Children are prepended, so each list ends up in descending index order.
    for block in cfg.blocks.indices().collect::<Vec<_>>() {
        if block == entry {
            continue;
        }
        let Some(idom) = cfg.blocks[block].idom else {
            continue;
        };
        trace!("idom({}) = {}", block, idom);
        cfg.blocks[block].dom_sibling = cfg.blocks[idom].dom_child;
        cfg.blocks[idom].dom_child = Some(block);
    }

    Ok(())
}

/// Find the closest common dominator of two blocks, walking whichever finger
/// is later in reverse postorder up its dominator chain until they meet.
fn intersect(cfg: &Cfg, mut finger1: BlockId, mut finger2: BlockId) -> BlockId {
    while finger1 != finger2 {
        while cfg.blocks[finger1].rpo > cfg.blocks[finger2].rpo {
            let Some(up) = cfg.blocks[finger1].idom else {
                return finger2;
            };
            finger1 = up;
        }
        while cfg.blocks[finger2].rpo > cfg.blocks[finger1].rpo {
            let Some(up) = cfg.blocks[finger2].idom else {
                return finger1;
            };
            finger2 = up;
        }
    }
    finger1
}
