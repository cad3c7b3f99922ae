use crate::{
    cfg::{Block, BlockId, Cfg},
    ext::{bitset::BitSet, index::Index},
    il::Instr,
    listing::Position,
    prelude::*,
};

/// Variables that are live across block boundaries, and the blocks assigning them.
#[derive(Debug)]
pub struct GlobalNames {
    /// Variables read in some block before that block assigns them.
    pub globals: BitSet,
    /// For every variable, the blocks containing a definition of it.
    pub def_blocks: Vec<BitSet>,
}

/// Find the variables that need ɸ-functions considered. A variable read before
/// any definition in the same block may carry a value across blocks. Stores
/// write memory, so their address operand counts as a read.
pub fn find_global_names(cfg: &Cfg) -> GlobalNames {
    let mut names = GlobalNames {
        globals: BitSet::new(cfg.temp_count),
        def_blocks: vec![BitSet::new(cfg.blocks.len()); cfg.temp_count],
    };

    for (id, block) in cfg.blocks.enumerate() {
        let mut assigned = BitSet::new(cfg.temp_count);
        for instr in block.instrs.iter_instructions() {
            for temp in instr.reads() {
                if !assigned.contains(temp.id) {
                    names.globals.insert(temp.id);
                }
            }
            if let Some(temp) = instr.defined() {
                assigned.insert(temp.id);
                names.def_blocks[temp.id].insert(id.index());
            }
        }
    }

    names
}

/// Insert ɸ-functions at the iterated dominance frontier of every global
/// variable's definitions. Dominance frontiers must be up to date. Returns the
/// number of ɸ-functions inserted; a block never gets two for one variable.
pub fn place_phis(cfg: &mut Cfg) -> usize {
    let names = find_global_names(cfg);
    let mut inserted = 0;

    for var in names.globals.iter() {
        let mut worklist = names.def_blocks[var].clone();
        while let Some(block) = worklist.pop_first() {
            let frontier: Vec<_> = cfg.blocks[BlockId::new(block)]
                .frontier
                .iter()
                .map(BlockId::new)
                .collect();

            for join in frontier {
                if has_phi(&cfg.blocks[join], var) {
                    continue;
                }
                insert_phi(&mut cfg.blocks[join], var);
                trace!("placed phi for t{} in {}", var, join);
                inserted += 1;
                worklist.insert(join.index());
            }
        }
    }

    debug!("{}: placed {} phis", cfg.name, inserted);
    inserted
}

fn has_phi(block: &Block, var: usize) -> bool {
    block
        .phis()
        .any(|phi| phi.defined().map(|temp| temp.id) == Some(var))
}

fn insert_phi(block: &mut Block, var: usize) {
    let head = match block.label {
        Some(_) => Position(1),
        None => Position(0),
    };
    block.instrs.insert(head, Instr::phi(var));
}
