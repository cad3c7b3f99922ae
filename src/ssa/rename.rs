use crate::{
    cfg::{BlockId, Cfg},
    il::{Incoming, Operand, Temp},
    prelude::*,
};

/// Per-variable version counters and stacks of the versions currently in scope.
#[derive(Debug)]
struct RenameContext {
    counters: Vec<u32>,
    stacks: Vec<Vec<u32>>,
}
impl RenameContext {
    fn new(temp_count: usize) -> Self {
        Self {
            counters: vec![0; temp_count],
            stacks: vec![vec![]; temp_count],
        }
    }

    /// Allocate the next version of a variable and bring it into scope.
    fn fresh(&mut self, var: usize) -> u32 {
        self.counters[var] += 1;
        let version = self.counters[var];
        self.stacks[var].push(version);
        version
    }

    /// The version in scope, or 0 if no definition reaches this point.
    fn current(&self, var: usize) -> u32 {
        self.stacks[var].last().copied().unwrap_or(0)
    }

    fn pop(&mut self, var: usize) {
        self.stacks[var].pop();
    }
}

enum Visit {
    Enter(BlockId),
    /// Leave a block, popping the variables it pushed a version for.
    Exit(Vec<usize>),
}

/// Give every definition a fresh version and point every use at the version
/// reaching it, walking the dominator tree in pre-order. ɸ-functions must have
/// been placed already; their incoming values are filled in along the way.
pub fn rename(cfg: &mut Cfg) {
    let mut context = RenameContext::new(cfg.temp_count);
    let mut stack = vec![Visit::Enter(cfg.entry())];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(block) => {
                let pushed = rename_block(cfg, &mut context, block);
                stack.push(Visit::Exit(pushed));
                let children: Vec<_> = cfg.dom_children(block).collect();
                stack.extend(children.into_iter().rev().map(Visit::Enter));
            }
            Visit::Exit(pushed) => {
                for var in pushed {
                    context.pop(var);
                }
            }
        }
    }

    debug!(
        "{}: {} versions assigned",
        cfg.name,
        context.counters.iter().sum::<u32>()
    );
}

fn rename_block(cfg: &mut Cfg, context: &mut RenameContext, block: BlockId) -> Vec<usize> {
    let mut pushed = vec![];

    for instr in cfg.blocks[block].instrs.iter_instructions_mut() {
        instr.for_each_read_mut(|temp| temp.version = Some(context.current(temp.id)));
        if let Some(temp) = instr.defined_mut() {
            temp.version = Some(context.fresh(temp.id));
            pushed.push(temp.id);
        }
    }
    trace!("{}: versions pushed for {:?}", block, pushed);

    let successors: Vec<_> = cfg.successors(block).collect();
    for succ in successors {
        for phi in cfg.blocks[succ]
            .instrs
            .iter_instructions_mut()
            .filter(|instr| instr.is_phi())
        {
            let Some(var) = phi.defined().map(|temp| temp.id) else {
                continue;
            };
            let version = context.current(var);
            let Some(incoming) = phi.incoming_mut() else {
                continue;
            };
            if incoming.iter().any(|i| i.pred == block) {
                continue;
            }
            incoming.push(Incoming {
                pred: block,
                value: Operand::Temporary(Temp::versioned(var, version)),
            });
        }
    }

    pushed
}
