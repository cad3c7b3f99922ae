//! Control-flow graphs over TAC procedures, and the dominance information
//! computed on them.

mod dominators;
mod error;
mod frontier;
mod order;
mod partition;

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::{
    ext::{
        bitset::BitSet,
        index::{index_type, Index, IndexVec},
    },
    il::{Instr, LabelId, TacListing},
};

pub use dominators::build_dominator_tree;
pub use error::CfgError;
pub use frontier::build_dominance_frontiers;
pub use order::{number_blocks, prune_unreachable};
pub use partition::{partition, strip_kills};

index_type! {
    /// Identifies a basic block by its position in the block array.
    pub struct BlockId = "B";
}

index_type! {
    /// Identifies an edge in the edge arena.
    pub struct EdgeId = "e";
}

#[derive(Debug)]
pub struct Block {
    /// The label this block starts with. Only the entry block has none.
    pub label: Option<LabelId>,
    pub instrs: TacListing,
    /// Position in reverse postorder, once numbered.
    pub rpo: Option<usize>,
    /// Immediate dominator. The entry block is its own immediate dominator.
    pub idom: Option<BlockId>,
    /// First child in the dominator tree.
    pub dom_child: Option<BlockId>,
    /// Next sibling in the dominator tree.
    pub dom_sibling: Option<BlockId>,
    pub frontier: BitSet,
    pub visited: bool,
    /// Head of the outgoing edge list.
    pub succ: Option<EdgeId>,
    /// Head of the incoming edge list.
    pub pred: Option<EdgeId>,
}
impl Block {
    pub fn new(label: Option<LabelId>, instrs: TacListing, block_count: usize) -> Self {
        Self {
            label,
            instrs,
            rpo: None,
            idom: None,
            dom_child: None,
            dom_sibling: None,
            frontier: BitSet::new(block_count),
            visited: false,
            succ: None,
            pred: None,
        }
    }

    pub fn last(&self) -> Option<&Instr> {
        self.instrs.last()
    }

    /// The ɸ-functions at the head of this block, after its label.
    pub fn phis(&self) -> impl Iterator<Item = &Instr> {
        self.instrs
            .iter_instructions()
            .skip_while(|instr| instr.as_label().is_some())
            .take_while(|instr| instr.is_phi())
    }
}

/// A directed arc, threaded onto the outgoing list of `src` and the incoming list of `sink`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub src: BlockId,
    pub sink: BlockId,
    pub next_succ: Option<EdgeId>,
    pub next_pred: Option<EdgeId>,
}

#[derive(Debug)]
pub struct Cfg {
    pub name: String,
    pub blocks: IndexVec<BlockId, Block>,
    pub edges: IndexVec<EdgeId, Edge>,
    /// One more than the largest temporary id in the procedure.
    pub temp_count: usize,
}
impl Cfg {
    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Add an edge from `src` to `sink`, unless one already exists.
    pub fn add_edge(&mut self, src: BlockId, sink: BlockId) -> Option<EdgeId> {
        if self.successors(src).any(|s| s == sink) {
            return None;
        }

        let id = self.edges.push(Edge {
            src,
            sink,
            next_succ: self.blocks[src].succ,
            next_pred: self.blocks[sink].pred,
        });
        self.blocks[src].succ = Some(id);
        self.blocks[sink].pred = Some(id);
        Some(id)
    }

    pub fn successors(&self, block: BlockId) -> Neighbours {
        Neighbours {
            cfg: self,
            next: self.blocks[block].succ,
            direction: Direction::Outgoing,
        }
    }

    pub fn predecessors(&self, block: BlockId) -> Neighbours {
        Neighbours {
            cfg: self,
            next: self.blocks[block].pred,
            direction: Direction::Incoming,
        }
    }

    /// Blocks ordered by their reverse postorder number. Unnumbered blocks are left out.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        self.blocks
            .enumerate()
            .filter_map(|(id, block)| block.rpo.map(|rpo| (rpo, id)))
            .sorted()
            .map(|(_, id)| id)
            .collect()
    }

    /// The children of a block in the dominator tree.
    pub fn dom_children(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        std::iter::successors(self.blocks[block].dom_child, |child| {
            self.blocks[*child].dom_sibling
        })
    }

    /// Whether `a` dominates `b`, walking the immediate dominator chain up from `b`.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.blocks[current].idom {
                Some(idom) if idom != current => current = idom,
                _ => return false,
            }
        }
    }

    /// All instructions, block by block.
    pub fn instructions(&self) -> impl Iterator<Item = &Instr> {
        self.blocks
            .iter()
            .flat_map(|block| block.instrs.iter_instructions())
    }
}

/// Prints the per-block, per-instruction dump.
impl Display for Cfg {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "proc {}", self.name)?;
        for (id, block) in self.blocks.enumerate() {
            write!(f, "{}", id)?;
            if let Some(label) = block.label {
                write!(f, " ({})", label)?;
            }
            write!(
                f,
                ":  ; preds [{}]",
                self.predecessors(id).sorted().join(", ")
            )?;
            if let Some(rpo) = block.rpo {
                write!(f, ", rpo {}", rpo)?;
            }
            if let Some(idom) = block.idom {
                write!(
                    f,
                    ", idom {}, df {{{}}}",
                    idom,
                    block.frontier.iter().map(BlockId::new).join(", ")
                )?;
            }
            writeln!(f)?;

            for instr in block.instrs.iter_instructions() {
                writeln!(f, "    {}", instr)?;
            }
        }
        Ok(())
    }
}

enum Direction {
    Outgoing,
    Incoming,
}

/// Walks one of the intrusive edge lists of a block.
pub struct Neighbours<'c> {
    cfg: &'c Cfg,
    next: Option<EdgeId>,
    direction: Direction,
}

impl<'c> Iterator for Neighbours<'c> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let edge = &self.cfg.edges[self.next?];
        match self.direction {
            Direction::Outgoing => {
                self.next = edge.next_succ;
                Some(edge.sink)
            }
            Direction::Incoming => {
                self.next = edge.next_pred;
                Some(edge.src)
            }
        }
    }
}
