use std::collections::{HashMap, HashSet};

use crate::{
    ext::index::{Index, IndexVec},
    il::{LabelId, Op, Procedure, TacListing},
    listing::Position,
    prelude::*,
};

use super::{Block, BlockId, Cfg, CfgError};

/// Remove the `KILL` liveness hints left by IR lowering. Each kill is replayed
/// in program order against the set of currently assigned temporaries, and
/// killing a temporary that is not assigned is an error.
pub fn strip_kills(procedure: Procedure) -> Result<Procedure, CfgError> {
    let mut assigned = HashSet::new();
    let mut body = TacListing::new();

    for (index, instr) in procedure.body.into_instructions().enumerate() {
        if instr.op != Op::Kill {
            if let Some(temp) = instr.defined() {
                assigned.insert(temp.id);
            }
            body.push(instr);
            continue;
        }

        match instr.o1.as_temp() {
            Some(temp) if assigned.remove(&temp.id) => trace!("kill {} at {}", temp, index),
            Some(temp) => {
                return Err(CfgError::KillOnFreeName {
                    temp: *temp,
                    position: Position(index),
                })
            }
            None => warn!("ignoring '{}' at {}, which names no temporary", instr, index),
        }
    }

    Ok(Procedure::new(procedure.name, body))
}

/// Split a procedure into basic blocks and connect them.
///
/// A block starts at the entry and at every label, and runs up to the next
/// label or up to and including a `JUMP`, `CBR` or `RET`. Anything between a
/// transfer and the next label can never run and is dropped. Blocks that end
/// without a transfer fall through to the next block.
pub fn partition(procedure: Procedure) -> Result<Cfg, CfgError> {
    let temp_count = procedure.temp_count();
    let Procedure { name, body } = procedure;

    match body.first() {
        None => return Err(CfgError::EmptyProcedure(name)),
        Some(instr) if instr.op != Op::Enter => return Err(CfgError::MissingEntry(name)),
        Some(_) => (),
    }

    let mut chunks: Vec<(Option<LabelId>, TacListing)> = vec![];
    let mut current = Some((None, TacListing::new()));
    let mut labels: HashMap<LabelId, BlockId> = HashMap::new();

    for instr in body.into_instructions() {
        if let Some(label) = instr.as_label() {
            chunks.extend(current.take());
            if labels.insert(label, BlockId::new(chunks.len())).is_some() {
                return Err(CfgError::DuplicateLabel {
                    procedure: name,
                    label,
                });
            }
            current = Some((Some(label), TacListing::new()));
        }

        let Some((_, instrs)) = current.as_mut() else {
            debug!("{}: dropping unreachable '{}'", name, instr);
            continue;
        };
        let transfer = instr.op.is_transfer();
        instrs.push(instr);
        if transfer {
            chunks.extend(current.take());
        }
    }
    chunks.extend(current);

    let block_count = chunks.len();
    let mut cfg = Cfg {
        name,
        blocks: IndexVec::new(),
        edges: IndexVec::new(),
        temp_count,
    };
    for (label, instrs) in chunks {
        cfg.blocks.push(Block::new(label, instrs, block_count));
    }

    for id in cfg.blocks.indices().collect::<Vec<_>>() {
        let Some(last) = cfg.blocks[id].last() else {
            continue;
        };
        let op = last.op;
        let targets = last.targets().ok_or_else(|| CfgError::MalformedTransfer {
            instr: last.to_string(),
            block: id,
        })?;

        match op {
            Op::Jump | Op::Cbr => {
                for label in targets {
                    let sink = *labels
                        .get(&label)
                        .ok_or(CfgError::UnresolvedLabel { label, block: id })?;
                    cfg.add_edge(id, sink);
                }
            }
            Op::Ret => (),
            _ if id.index() + 1 < block_count => {
                cfg.add_edge(id, BlockId::new(id.index() + 1));
            }
            _ => debug!("{}: {} falls off the end of the procedure", cfg.name, id),
        }
    }

    debug!(
        "{}: partitioned into {} blocks and {} edges",
        cfg.name,
        cfg.blocks.len(),
        cfg.edges.len()
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{
        cfg::tests::{block, cfg_of},
        il::{read_listing, Temp},
    };

    use super::*;

    fn try_partition(source: &str) -> Result<Cfg, CfgError> {
        let procedure = read_listing(source).unwrap().remove(0);
        partition(strip_kills(procedure)?)
    }

    fn successors(cfg: &Cfg, index: usize) -> Vec<BlockId> {
        let mut succs: Vec<_> = cfg.successors(block(index)).collect();
        succs.sort();
        succs
    }

    #[test]
    fn straight_line_code_is_one_block() {
        let cfg = cfg_of(indoc! {"
            ENTER
            LOADI 1, -, t0
            RET t0
        "});

        assert_eq!(1, cfg.blocks.len());
        assert_eq!(0, cfg.edges.len());
        assert_eq!(3, cfg.blocks[block(0)].instrs.len());
        assert_eq!(None, cfg.blocks[block(0)].label);
    }

    #[test]
    fn branches_create_edges_to_their_targets() {
        let cfg = cfg_of(indoc! {"
            ENTER
            LOADI 1, -, t0
            CBR t0, L1, L2
            L1:
            LOADI 1, -, t1
            JUMP -, -, L3
            L2:
            LOADI 2, -, t1
            JUMP -, -, L3
            L3:
            RET t1
        "});

        assert_eq!(4, cfg.blocks.len());
        assert_eq!(4, cfg.edges.len());
        assert_eq!(vec![block(1), block(2)], successors(&cfg, 0));
        assert_eq!(vec![block(3)], successors(&cfg, 1));
        assert_eq!(vec![block(3)], successors(&cfg, 2));
        assert!(successors(&cfg, 3).is_empty());
        assert_eq!(Some(LabelId(3)), cfg.blocks[block(3)].label);
    }

    #[test]
    fn every_block_but_the_entry_starts_with_its_label() {
        let cfg = cfg_of(indoc! {"
            ENTER
            JUMP -, -, L5
            L5:
            RET
        "});

        let first = cfg.blocks[block(1)].instrs.first().unwrap();
        assert_eq!(Some(LabelId(5)), first.as_label());
    }

    #[test]
    fn blocks_without_transfer_fall_through() {
        let cfg = cfg_of(indoc! {"
            ENTER
            LOADI 1, -, t0
            L1:
            RET t0
        "});

        assert_eq!(2, cfg.blocks.len());
        assert_eq!(vec![block(1)], successors(&cfg, 0));
    }

    #[test]
    fn code_after_a_transfer_is_dropped() {
        let cfg = cfg_of(indoc! {"
            ENTER
            RET
            LOADI 1, -, t0
            L1:
            RET
        "});

        assert_eq!(2, cfg.blocks[block(0)].instrs.len());
        assert_eq!(2, cfg.blocks[block(1)].instrs.len());
    }

    #[test]
    fn branch_with_identical_targets_has_one_edge() {
        let cfg = cfg_of(indoc! {"
            ENTER
            CBR t0, L1, L1
            L1:
            RET
        "});

        assert_eq!(1, cfg.edges.len());
    }

    #[test]
    fn undefined_branch_target_is_rejected() {
        let err = try_partition(indoc! {"
            ENTER
            CBR t0, L1, L9
            L1:
            RET
        "})
        .unwrap_err();

        assert_eq!(
            CfgError::UnresolvedLabel {
                label: LabelId(9),
                block: block(0)
            },
            err
        );
    }

    #[test]
    fn jump_to_non_label_is_rejected() {
        let err = try_partition("ENTER\nJUMP -, -, t3").unwrap_err();

        assert!(matches!(err, CfgError::MalformedTransfer { .. }));
    }

    #[test]
    fn procedure_must_start_with_enter() {
        let err = try_partition("proc f\nLOADI 1, -, t0").unwrap_err();

        assert_eq!(CfgError::MissingEntry("f".to_string()), err);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = try_partition("ENTER\nL1:\nL1:\nRET").unwrap_err();

        assert!(matches!(
            err,
            CfgError::DuplicateLabel {
                label: LabelId(1),
                ..
            }
        ));
    }

    #[test]
    fn kills_are_removed() {
        let cfg = cfg_of(indoc! {"
            ENTER
            LOADI 1, -, t0
            KILL t0
            LOADI 2, -, t0
            RET t0
        "});

        assert!(cfg.instructions().all(|instr| instr.op != Op::Kill));
        assert_eq!(4, cfg.blocks[block(0)].instrs.len());
    }

    #[test]
    fn kill_on_free_name_is_rejected() {
        let err = try_partition(indoc! {"
            ENTER
            LOADI 1, -, t0
            KILL t0
            KILL t0
        "})
        .unwrap_err();

        assert_eq!(
            CfgError::KillOnFreeName {
                temp: Temp::new(0),
                position: Position(3)
            },
            err
        );
    }

    #[test]
    fn kill_on_free_name_reports_a_body_index() {
        let err = try_partition(indoc! {"
            proc f

            ENTER      ; blank and comment lines are not counted
            KILL t2
        "})
        .unwrap_err();

        assert_eq!(
            "kill on free name t2 at instruction index 1 of the procedure body",
            err.to_string()
        );
    }
}
