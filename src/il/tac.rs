//! Three-Address Code

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::{cfg::BlockId, listing::Listing};

pub type TacListing = Listing<Instr>;

/// The instructions of a single procedure, as produced by IR lowering.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub body: TacListing,
}
impl Procedure {
    pub fn new<S: Into<String>>(name: S, body: TacListing) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// One more than the largest temporary id referenced anywhere in the body.
    pub fn temp_count(&self) -> usize {
        let mut count = 0;
        for instr in self.body.iter_instructions() {
            instr.for_each_temp(|temp| count = count.max(temp.id + 1));
        }
        count
    }
}
impl Display for Procedure {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "proc {}", self.name)?;
        for instr in self.body.iter_instructions() {
            writeln!(f, "    {}", instr)?;
        }
        Ok(())
    }
}

/// Operation tags, named the way they are printed in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Not,
    Or,
    And,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Mov,
    Store,
    Store32,
    Store8,
    LoadO,
    LoadO32,
    LoadO8,
    Load,
    Load32,
    Load8,
    LoadI,
    LoadG,
    Kill,
    Enter,
    Ret,
    Cbr,
    Jump,
    Label,
    Call,
    Alloc,
    Phi,
}
impl Op {
    /// Stores write through the address held in their destination operand.
    pub fn is_store(self) -> bool {
        matches!(self, Op::Store | Op::Store32 | Op::Store8)
    }

    /// Operations after which control never reaches the next instruction.
    pub fn is_transfer(self) -> bool {
        matches!(self, Op::Jump | Op::Cbr | Op::Ret)
    }
}

/// A temporary, optionally carrying its SSA version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp {
    pub id: usize,
    pub version: Option<u32>,
}
impl Temp {
    pub fn new(id: usize) -> Self {
        Self { id, version: None }
    }

    pub fn versioned(id: usize, version: u32) -> Self {
        Self {
            id,
            version: Some(version),
        }
    }
}
impl Display for Temp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "t{}.{}", self.id, version),
            None => write!(f, "t{}", self.id),
        }
    }
}

/// A label that can be jumped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);
impl Display for LabelId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// One incoming value of a ɸ-function, keyed by the predecessor it flows in from.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub pred: BlockId,
    pub value: Operand,
}

/// Variable-arity payloads that do not fit in a single operand slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Misc {
    /// Arguments passed to a call.
    Args(Vec<Operand>),
    /// Incoming values of a ɸ-function.
    Incoming(Vec<Incoming>),
    /// A value that has no meaning to the middle-end, such as a frame size.
    Opaque(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Unused,
    Immediate(i64),
    Temporary(Temp),
    Global(String),
    Label(LabelId),
    Misc(Misc),
}
impl Operand {
    pub fn temp(id: usize) -> Self {
        Self::Temporary(Temp::new(id))
    }

    pub fn as_temp(&self) -> Option<&Temp> {
        match self {
            Self::Temporary(temp) => Some(temp),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<LabelId> {
        match self {
            Self::Label(label) => Some(*label),
            _ => None,
        }
    }

    /// Visit every temporary this operand reads, including call arguments.
    fn for_each_read<F: FnMut(&Temp)>(&self, f: &mut F) {
        match self {
            Self::Temporary(temp) => f(temp),
            Self::Misc(Misc::Args(args)) => args.iter().for_each(|arg| arg.for_each_read(f)),
            _ => (),
        }
    }

    fn for_each_read_mut<F: FnMut(&mut Temp)>(&mut self, f: &mut F) {
        match self {
            Self::Temporary(temp) => f(temp),
            Self::Misc(Misc::Args(args)) => {
                for arg in args.iter_mut() {
                    arg.for_each_read_mut(f)
                }
            }
            _ => (),
        }
    }

    fn for_each_temp<F: FnMut(&Temp)>(&self, f: &mut F) {
        match self {
            Self::Temporary(temp) => f(temp),
            Self::Misc(Misc::Args(args)) => args.iter().for_each(|arg| arg.for_each_temp(f)),
            Self::Misc(Misc::Incoming(incoming)) => {
                incoming.iter().for_each(|i| i.value.for_each_temp(f))
            }
            _ => (),
        }
    }
}
impl Display for Operand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Unused => f.write_str("-"),
            Self::Immediate(value) => write!(f, "{}", value),
            Self::Temporary(temp) => temp.fmt(f),
            Self::Global(name) => write!(f, "@{}", name),
            Self::Label(label) => label.fmt(f),
            Self::Misc(Misc::Args(args)) => write!(f, "[{}]", args.iter().join(", ")),
            Self::Misc(Misc::Incoming(incoming)) => write!(
                f,
                "{{{}}}",
                incoming
                    .iter()
                    .map(|i| format!("{}: {}", i.pred, i.value))
                    .join(", ")
            ),
            Self::Misc(Misc::Opaque(value)) => write!(f, "#{}", value),
        }
    }
}

/// A single TAC instruction: `op o1, o2 -> dst`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub o1: Operand,
    pub o2: Operand,
    pub dst: Operand,
}
impl Instr {
    pub fn new(op: Op, o1: Operand, o2: Operand, dst: Operand) -> Self {
        Self { op, o1, o2, dst }
    }

    pub fn label(label: LabelId) -> Self {
        Self::new(Op::Label, Operand::Label(label), Operand::Unused, Operand::Unused)
    }

    /// An empty ɸ-function for a variable. Incoming values are added during renaming.
    pub fn phi(var: usize) -> Self {
        Self::new(
            Op::Phi,
            Operand::Misc(Misc::Incoming(vec![])),
            Operand::Unused,
            Operand::temp(var),
        )
    }

    pub fn is_phi(&self) -> bool {
        self.op == Op::Phi
    }

    pub fn as_label(&self) -> Option<LabelId> {
        match self.op {
            Op::Label => self.o1.as_label(),
            _ => None,
        }
    }

    /// The labels this instruction may transfer control to, in operand order.
    /// Returns `None` if a target operand is not a label.
    pub fn targets(&self) -> Option<Vec<LabelId>> {
        match self.op {
            Op::Jump => Some(vec![self.dst.as_label()?]),
            Op::Cbr => Some(vec![self.o2.as_label()?, self.dst.as_label()?]),
            _ => Some(vec![]),
        }
    }

    /// The variable this instruction assigns, if any. A store's destination is
    /// an address and is never a definition.
    pub fn defined(&self) -> Option<&Temp> {
        if self.op.is_store() {
            return None;
        }
        self.dst.as_temp()
    }

    pub fn defined_mut(&mut self) -> Option<&mut Temp> {
        if self.op.is_store() {
            return None;
        }
        match &mut self.dst {
            Operand::Temporary(temp) => Some(temp),
            _ => None,
        }
    }

    /// Every temporary read by this instruction, in operand order. The incoming
    /// values of a ɸ-function are read at the end of its predecessors and are
    /// not included.
    pub fn reads(&self) -> Vec<Temp> {
        let mut reads = vec![];
        if self.is_phi() {
            return reads;
        }
        let mut push = |temp: &Temp| reads.push(*temp);
        self.o1.for_each_read(&mut push);
        self.o2.for_each_read(&mut push);
        if self.op.is_store() {
            self.dst.for_each_read(&mut push);
        }
        reads
    }

    /// Visit every temporary read by this instruction, as [`Self::reads`].
    pub fn for_each_read_mut<F: FnMut(&mut Temp)>(&mut self, mut f: F) {
        if self.is_phi() {
            return;
        }
        self.o1.for_each_read_mut(&mut f);
        self.o2.for_each_read_mut(&mut f);
        if self.op.is_store() {
            self.dst.for_each_read_mut(&mut f);
        }
    }

    /// Visit every temporary mentioned anywhere in this instruction.
    pub fn for_each_temp<F: FnMut(&Temp)>(&self, mut f: F) {
        self.o1.for_each_temp(&mut f);
        self.o2.for_each_temp(&mut f);
        self.dst.for_each_temp(&mut f);
    }

    pub fn incoming(&self) -> Option<&[Incoming]> {
        match (&self.op, &self.o1) {
            (Op::Phi, Operand::Misc(Misc::Incoming(incoming))) => Some(incoming),
            _ => None,
        }
    }

    pub fn incoming_mut(&mut self) -> Option<&mut Vec<Incoming>> {
        match (&self.op, &mut self.o1) {
            (Op::Phi, Operand::Misc(Misc::Incoming(incoming))) => Some(incoming),
            _ => None,
        }
    }
}
impl Display for Instr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {}, {}, {}", self.op, self.o1, self.o2, self.dst)
    }
}
