//! Structural checks over a converted procedure.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    cfg::{BlockId, Cfg},
    il::Temp,
    listing::Position,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{0} has no immediate dominator")]
    MissingIdom(BlockId),
    #[error("the dominator chain of {0} does not reach the entry")]
    DominatorCycle(BlockId),
    #[error("{block} is numbered before its immediate dominator {idom}")]
    IdomOrder { block: BlockId, idom: BlockId },
    #[error("phi for {phi} in {block} has {found} incoming values for {expected} predecessors")]
    PhiArity {
        block: BlockId,
        phi: Temp,
        expected: usize,
        found: usize,
    },
    #[error("phi for {phi} in {block} has more than one value from {pred}")]
    DuplicateIncoming {
        block: BlockId,
        phi: Temp,
        pred: BlockId,
    },
    #[error("phi for {phi} in {block} has a value from {pred}, which is not a predecessor")]
    ForeignIncoming {
        block: BlockId,
        phi: Temp,
        pred: BlockId,
    },
    #[error("{temp} in {block} has no version")]
    Unversioned { temp: Temp, block: BlockId },
    #[error("{temp} is defined in both {first} and {second}")]
    Redefined {
        temp: Temp,
        first: BlockId,
        second: BlockId,
    },
    #[error("{temp} is used in {block} but never defined")]
    Undefined { temp: Temp, block: BlockId },
    #[error("{temp} is used in {block}, which its definition in {def} does not dominate")]
    NotDominated {
        temp: Temp,
        def: BlockId,
        block: BlockId,
    },
}

/// Check that the immediate dominators form a tree rooted at the entry.
pub fn verify_dominator_tree(cfg: &Cfg) -> Result<(), VerifyError> {
    let entry = cfg.entry();
    if cfg.blocks[entry].idom != Some(entry) {
        return Err(VerifyError::MissingIdom(entry));
    }

    for (id, block) in cfg.blocks.enumerate() {
        if id == entry {
            continue;
        }
        let idom = block.idom.ok_or(VerifyError::MissingIdom(id))?;
        if idom == id {
            return Err(VerifyError::DominatorCycle(id));
        }
        if cfg.blocks[idom].rpo >= block.rpo {
            return Err(VerifyError::IdomOrder { block: id, idom });
        }

        let mut current = id;
        for _ in 0..cfg.blocks.len() {
            if current == entry {
                break;
            }
            current = cfg.blocks[current]
                .idom
                .ok_or(VerifyError::MissingIdom(current))?;
        }
        if current != entry {
            return Err(VerifyError::DominatorCycle(id));
        }
    }

    Ok(())
}

/// Check the single-assignment property: every ɸ has one value per
/// predecessor, every version is defined once, and every definition dominates
/// its uses. Version 0 marks a read with no reaching definition and is exempt.
pub fn verify_ssa(cfg: &Cfg) -> Result<(), VerifyError> {
    verify_phis(cfg)?;
    let definitions = collect_definitions(cfg)?;

    for (block, data) in cfg.blocks.enumerate() {
        for (position, instr) in data.instrs.iter_lines() {
            for temp in instr.reads() {
                check_use(cfg, &definitions, temp, block, Some(position))?;
            }
            for incoming in instr.incoming().unwrap_or_default() {
                if let Some(temp) = incoming.value.as_temp() {
                    // Read at the end of the predecessor.
                    check_use(cfg, &definitions, *temp, incoming.pred, None)?;
                }
            }
        }
    }

    Ok(())
}

fn verify_phis(cfg: &Cfg) -> Result<(), VerifyError> {
    for (block, data) in cfg.blocks.enumerate() {
        let preds: Vec<_> = cfg.predecessors(block).collect();
        for phi in data.phis() {
            let (Some(temp), Some(incoming)) = (phi.defined(), phi.incoming()) else {
                continue;
            };
            if incoming.len() != preds.len() {
                return Err(VerifyError::PhiArity {
                    block,
                    phi: *temp,
                    expected: preds.len(),
                    found: incoming.len(),
                });
            }
            for (i, value) in incoming.iter().enumerate() {
                if !preds.contains(&value.pred) {
                    return Err(VerifyError::ForeignIncoming {
                        block,
                        phi: *temp,
                        pred: value.pred,
                    });
                }
                if incoming[..i].iter().any(|other| other.pred == value.pred) {
                    return Err(VerifyError::DuplicateIncoming {
                        block,
                        phi: *temp,
                        pred: value.pred,
                    });
                }
            }
        }
    }
    Ok(())
}

type Definitions = HashMap<(usize, u32), (BlockId, Position)>;

fn collect_definitions(cfg: &Cfg) -> Result<Definitions, VerifyError> {
    let mut definitions = Definitions::new();
    for (block, data) in cfg.blocks.enumerate() {
        for (position, instr) in data.instrs.iter_lines() {
            let Some(temp) = instr.defined() else {
                continue;
            };
            let version = temp
                .version
                .ok_or(VerifyError::Unversioned { temp: *temp, block })?;
            if let Some((first, _)) = definitions.insert((temp.id, version), (block, position)) {
                return Err(VerifyError::Redefined {
                    temp: *temp,
                    first,
                    second: block,
                });
            }
        }
    }
    Ok(definitions)
}

/// A use at `position` in `block`, or at the end of `block` when there is no position.
fn check_use(
    cfg: &Cfg,
    definitions: &Definitions,
    temp: Temp,
    block: BlockId,
    position: Option<Position>,
) -> Result<(), VerifyError> {
    let version = temp.version.ok_or(VerifyError::Unversioned { temp, block })?;
    if version == 0 {
        return Ok(());
    }
    let &(def, def_position) = definitions
        .get(&(temp.id, version))
        .ok_or(VerifyError::Undefined { temp, block })?;

    let dominated = match position {
        Some(position) if def == block => def_position < position,
        _ => cfg.dominates(def, block),
    };
    if !dominated {
        return Err(VerifyError::NotDominated { temp, def, block });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{
        cfg::{
            build_dominance_frontiers, build_dominator_tree, number_blocks,
            tests::{block, cfg_of},
        },
        il::{Incoming, Operand},
        ssa::convert,
    };

    use super::*;

    const LOOP: &str = indoc! {"
        ENTER
        LOADI 0, -, t0
        JUMP -, -, L1
        L1:
        LT t0, t1, t2
        CBR t2, L2, L3
        L2:
        ADD t0, 1, t0
        JUMP -, -, L1
        L3:
        RET t0
    "};

    fn dominators_of(source: &str) -> Cfg {
        let mut cfg = cfg_of(source);
        number_blocks(&mut cfg);
        build_dominator_tree(&mut cfg).unwrap();
        build_dominance_frontiers(&mut cfg);
        cfg
    }

    fn converted(source: &str) -> Cfg {
        let mut cfg = dominators_of(source);
        convert(&mut cfg);
        cfg
    }

    fn loop_phi(cfg: &mut Cfg) -> &mut Vec<Incoming> {
        cfg.blocks[block(1)]
            .instrs
            .iter_instructions_mut()
            .find(|instr| instr.is_phi())
            .and_then(|phi| phi.incoming_mut())
            .unwrap()
    }

    #[test]
    fn converted_loop_verifies() {
        let cfg = converted(LOOP);

        assert_eq!(Ok(()), verify_dominator_tree(&cfg));
        assert_eq!(Ok(()), verify_ssa(&cfg));
    }

    #[test]
    fn unconverted_procedure_has_unversioned_temporaries() {
        let cfg = dominators_of(LOOP);

        assert!(matches!(
            verify_ssa(&cfg),
            Err(VerifyError::Unversioned { .. })
        ));
    }

    #[test]
    fn missing_phi_value_is_reported() {
        let mut cfg = converted(LOOP);
        loop_phi(&mut cfg).pop();

        assert!(matches!(
            verify_ssa(&cfg),
            Err(VerifyError::PhiArity {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_phi_value_is_reported() {
        let mut cfg = converted(LOOP);
        let incoming = loop_phi(&mut cfg);
        incoming[1].pred = incoming[0].pred;

        assert!(matches!(
            verify_ssa(&cfg),
            Err(VerifyError::DuplicateIncoming { .. })
        ));
    }

    #[test]
    fn value_from_a_non_predecessor_is_reported() {
        let mut cfg = converted(LOOP);
        loop_phi(&mut cfg)[0].pred = block(3);

        assert_eq!(
            Err(VerifyError::ForeignIncoming {
                block: block(1),
                phi: Temp::versioned(0, 2),
                pred: block(3),
            }),
            verify_ssa(&cfg)
        );
    }

    #[test]
    fn use_not_dominated_by_its_definition_is_reported() {
        let mut cfg = converted(LOOP);
        // Make the exit read the version defined in the loop body.
        let ret = cfg.blocks[block(3)].instrs.iter_instructions_mut().last().unwrap();
        ret.o1 = Operand::Temporary(Temp::versioned(0, 3));

        assert_eq!(
            Err(VerifyError::NotDominated {
                temp: Temp::versioned(0, 3),
                def: block(2),
                block: block(3),
            }),
            verify_ssa(&cfg)
        );
    }

    #[test]
    fn use_before_definition_in_the_same_block_is_reported() {
        let mut cfg = converted("ENTER\nLOADI 1, -, t0\nADD t0, 1, t1\nRET t1");
        let add = cfg.blocks[block(0)].instrs.iter_instructions_mut().nth(2).unwrap();
        add.o1 = Operand::Temporary(Temp::versioned(1, 1));

        assert!(matches!(
            verify_ssa(&cfg),
            Err(VerifyError::NotDominated { .. })
        ));
    }

    #[test]
    fn second_definition_of_a_version_is_reported() {
        let mut cfg = converted("ENTER\nLOADI 1, -, t0\nLOADI 2, -, t0\nRET t0");
        let second = cfg.blocks[block(0)].instrs.iter_instructions_mut().nth(2).unwrap();
        second.dst = Operand::Temporary(Temp::versioned(0, 1));

        assert!(matches!(
            verify_ssa(&cfg),
            Err(VerifyError::Redefined { .. })
        ));
    }

    #[test]
    fn broken_dominator_chain_is_reported() {
        let mut cfg = dominators_of(LOOP);
        cfg.blocks[block(2)].idom = None;

        assert_eq!(
            Err(VerifyError::MissingIdom(block(2))),
            verify_dominator_tree(&cfg)
        );
    }
}
