use thiserror::Error;

use crate::{
    il::{LabelId, Temp},
    listing::Position,
};

use super::BlockId;

/// An internal-consistency violation found while building the flow graph.
/// None of these can be recovered from: the procedure is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfgError {
    #[error("procedure '{0}' is empty")]
    EmptyProcedure(String),
    #[error("procedure '{0}' does not begin with an ENTER instruction")]
    MissingEntry(String),
    #[error("label {label} is defined twice in procedure '{procedure}'")]
    DuplicateLabel { procedure: String, label: LabelId },
    #[error("branch target {label} in block {block} is never defined")]
    UnresolvedLabel { label: LabelId, block: BlockId },
    #[error("'{instr}' in block {block} does not name a label as its target")]
    MalformedTransfer { instr: String, block: BlockId },
    /// `position` is the zero-based index into the procedure body, kills included.
    #[error("kill on free name {temp} at instruction index {position} of the procedure body")]
    KillOnFreeName { temp: Temp, position: Position },
    #[error("block {0} has no predecessor with a known immediate dominator")]
    NoProcessedPredecessor(BlockId),
}
