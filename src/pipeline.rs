//! Drives a procedure through the middle-end passes.

use crate::{
    cfg::{
        build_dominance_frontiers, build_dominator_tree, number_blocks, partition,
        prune_unreachable, strip_kills, Cfg, CfgError,
    },
    il::Procedure,
    prelude::*,
    ssa,
};

/// How far to take a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Basic blocks, edges and reverse postorder numbers.
    Cfg,
    /// Additionally the dominator tree and dominance frontiers.
    Dominance,
    /// Full conversion to SSA form.
    Ssa,
}

/// Partition a procedure into blocks and number the reachable ones. Blocks
/// that cannot be reached from the entry are removed.
pub fn build_cfg(procedure: Procedure) -> Result<Cfg, CfgError> {
    let mut cfg = partition(strip_kills(procedure)?)?;
    number_blocks(&mut cfg);
    if prune_unreachable(&mut cfg) > 0 {
        number_blocks(&mut cfg);
    }
    Ok(cfg)
}

pub fn run(procedure: Procedure, stage: Stage) -> Result<Cfg, CfgError> {
    debug!("{}: running up to {:?}", procedure.name, stage);
    trace!("{}", procedure);
    let mut cfg = build_cfg(procedure)?;

    if stage >= Stage::Dominance {
        build_dominator_tree(&mut cfg)?;
        build_dominance_frontiers(&mut cfg);
    }
    if stage >= Stage::Ssa {
        ssa::convert(&mut cfg);
    }

    debug!(
        "{}: {} blocks, {} instructions",
        cfg.name,
        cfg.blocks.len(),
        cfg.instructions().count()
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{
        cfg::{tests::block, BlockId},
        ext::index::Index,
        il::{read_listing, LabelId, Op},
        ssa::{verify_dominator_tree, verify_ssa},
    };

    use super::*;

    fn run_source(source: &str, stage: Stage) -> Result<Cfg, CfgError> {
        let procedure = read_listing(source).unwrap().remove(0);
        run(procedure, stage)
    }

    macro_rules! assert_converts {
        ($source:expr) => {{
            let cfg = run_source($source, Stage::Ssa).unwrap();
            assert_eq!(Ok(()), verify_dominator_tree(&cfg));
            assert_eq!(Ok(()), verify_ssa(&cfg));
            cfg
        }};
    }

    fn phis(cfg: &Cfg, index: usize) -> Vec<String> {
        cfg.blocks[block(index)]
            .phis()
            .map(ToString::to_string)
            .collect()
    }

    fn phi_count(cfg: &Cfg) -> usize {
        cfg.instructions().filter(|instr| instr.is_phi()).count()
    }

    const IF_ELSE: &str = indoc! {"
        proc choose
        ENTER
        LOADI 1, -, t0
        CBR t0, L1, L2
        L1:
        LOADI 10, -, t1
        JUMP -, -, L3
        L2:
        LOADI 20, -, t1
        JUMP -, -, L3
        L3:
        RET t1
    "};

    const WHILE: &str = indoc! {"
        proc count
        ENTER
        LOADI 0, -, t0
        LOADI 10, -, t1
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

    const NESTED: &str = indoc! {"
        proc nested
        ENTER #16
        LOADI 0, -, t0
        LOADI 0, -, t3
        L1:
        LT t0, t9, t4
        CBR t4, L2, L6
        L2:
        LOADI 0, -, t1
        L3:
        LT t1, t9, t5
        CBR t5, L4, L5
        L4:
        ADD t3, t1, t3
        CALL @trace, [t3, t1], t6
        STORE t3, -, t8
        ADD t1, 1, t1
        JUMP -, -, L3
        L5:
        ADD t0, 1, t0
        JUMP -, -, L1
        L6:
        RET t3
    "};

    #[test]
    fn straight_line_procedure() {
        let cfg = assert_converts!(indoc! {"
            ENTER
            LOADI 1, -, t0
            ADD t0, t0, t1
            RET t1
        "});

        assert_eq!(1, cfg.blocks.len());
        assert_eq!(0, cfg.edges.len());
        assert_eq!(Some(block(0)), cfg.blocks[block(0)].idom);
        assert!(cfg.blocks[block(0)].frontier.is_empty());
        assert_eq!(0, phi_count(&cfg));
    }

    #[test]
    fn if_else_merges_at_the_join() {
        let cfg = assert_converts!(IF_ELSE);

        assert_eq!(4, cfg.blocks.len());
        assert_eq!(Some(LabelId(3)), cfg.blocks[block(3)].label);
        assert_eq!(
            vec!["PHI {B2: t1.2, B1: t1.3}, -, t1.1"],
            phis(&cfg, 3)
        );
        assert_eq!(1, phi_count(&cfg));
    }

    #[test]
    fn while_loop_header_merges_entry_and_back_edge() {
        let cfg = assert_converts!(WHILE);

        assert!(cfg.blocks[block(1)].frontier.contains(1));
        assert_eq!(
            vec!["PHI {B0: t0.1, B2: t0.3}, -, t0.2"],
            phis(&cfg, 1)
        );
        assert_eq!(1, phi_count(&cfg));
    }

    #[test]
    fn undefined_branch_target_stops_before_dominators() {
        let err = run_source(
            indoc! {"
                ENTER
                CBR t0, L1, L7
                L1:
                RET
            "},
            Stage::Ssa,
        )
        .unwrap_err();

        assert_eq!(
            CfgError::UnresolvedLabel {
                label: LabelId(7),
                block: block(0)
            },
            err
        );
    }

    #[test]
    fn nested_loops_convert() {
        let cfg = assert_converts!(NESTED);

        // Both loop headers merge the induction variables and the accumulator.
        let outer: Vec<_> = cfg.blocks[block(1)].phis().collect();
        let inner: Vec<_> = cfg.blocks[block(3)].phis().collect();
        assert_eq!(3, outer.len());
        assert_eq!(2, inner.len());
        assert!(cfg
            .instructions()
            .filter(|instr| instr.is_phi())
            .all(|phi| phi.incoming().unwrap().len() == 2));
    }

    #[test]
    fn unreachable_blocks_are_removed_before_conversion() {
        let cfg = assert_converts!(indoc! {"
            ENTER
            LOADI 1, -, t0
            JUMP -, -, L2
            L1:
            LOADI 2, -, t0
            JUMP -, -, L2
            L2:
            RET t0
        "});

        assert_eq!(2, cfg.blocks.len());
        assert_eq!(0, phi_count(&cfg));
        assert!(cfg.blocks.iter().all(|b| b.label != Some(LabelId(1))));
    }

    #[test]
    fn kills_are_stripped_before_partitioning() {
        let cfg = assert_converts!(indoc! {"
            ENTER
            LOADI 1, -, t0
            KILL t0
            LOADI 2, -, t0
            RET t0
        "});

        assert!(cfg.instructions().all(|instr| instr.op != Op::Kill));
    }

    #[test]
    fn blocks_are_in_their_own_frontier_only_when_they_head_a_cycle() {
        for source in [IF_ELSE, WHILE, NESTED] {
            let cfg = run_source(source, Stage::Dominance).unwrap();

            for (id, data) in cfg.blocks.enumerate() {
                let heads_cycle = cfg.predecessors(id).any(|pred| cfg.dominates(id, pred));
                assert_eq!(
                    heads_cycle,
                    data.frontier.contains(id.index()),
                    "{} in {}",
                    id,
                    cfg.name
                );
            }
        }
    }

    #[test]
    fn phi_placement_is_idempotent() {
        let mut cfg = run_source(NESTED, Stage::Dominance).unwrap();

        let placed = ssa::place_phis(&mut cfg);
        assert!(placed > 0);
        assert_eq!(0, ssa::place_phis(&mut cfg));
    }

    #[test]
    fn cfg_stage_leaves_temporaries_unversioned() {
        let cfg = run_source(IF_ELSE, Stage::Cfg).unwrap();

        assert!(cfg.blocks.iter().all(|b| b.idom.is_none()));
        assert!(cfg
            .instructions()
            .filter_map(|instr| instr.defined())
            .all(|temp| temp.version.is_none()));
    }

    #[test]
    fn dump_lists_blocks_with_their_dominance_information() {
        let cfg = run_source(
            indoc! {"
                proc diamond
                ENTER
                CBR t0, L1, L2
                L1:
                JUMP -, -, L3
                L2:
                JUMP -, -, L3
                L3:
                RET
            "},
            Stage::Dominance,
        )
        .unwrap();

        assert_eq!(
            indoc! {"
                proc diamond
                B0:  ; preds [], rpo 0, idom B0, df {}
                    ENTER -, -, -
                    CBR t0, L1, L2
                B1 (L1):  ; preds [B0], rpo 1, idom B0, df {B3}
                    LABEL L1, -, -
                    JUMP -, -, L3
                B2 (L2):  ; preds [B0], rpo 2, idom B0, df {B3}
                    LABEL L2, -, -
                    JUMP -, -, L3
                B3 (L3):  ; preds [B1, B2], rpo 3, idom B0, df {}
                    LABEL L3, -, -
                    RET -, -, -
            "},
            cfg.to_string()
        );
    }

    #[test]
    fn converted_dump_reads_back_as_the_same_instructions() {
        let cfg = run_source(NESTED, Stage::Ssa).unwrap();
        let reread = read_listing(&cfg.to_string()).unwrap().remove(0);

        assert_eq!("nested", reread.name);
        assert_eq!(
            cfg.instructions().cloned().collect::<Vec<_>>(),
            reread.body.into_instructions().collect::<Vec<_>>()
        );
    }

    #[test]
    fn every_block_is_reachable_through_the_dominator_tree() {
        let cfg = run_source(NESTED, Stage::Dominance).unwrap();

        let mut seen = vec![cfg.entry()];
        let mut stack = vec![cfg.entry()];
        while let Some(block) = stack.pop() {
            for child in cfg.dom_children(block) {
                seen.push(child);
                stack.push(child);
            }
        }
        seen.sort();
        assert_eq!(cfg.blocks.indices().collect::<Vec<BlockId>>(), seen);
    }
}
