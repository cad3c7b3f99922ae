//! Conversion to static single assignment form.
//!
//! Follows the semi-pruned construction from "Engineering a Compiler" by
//! Cooper and Torczon: ɸ-functions are placed only for variables that are
//! read in some block before being assigned there, then every variable is
//! renamed along the dominator tree.

mod phi;
mod rename;
mod verify;

use crate::{cfg::Cfg, prelude::*};

pub use phi::place_phis;
use rename::rename;
pub use verify::{verify_dominator_tree, verify_ssa};

/// Convert a procedure with up to date dominance frontiers into SSA form.
/// Returns the number of ɸ-functions inserted.
pub fn convert(cfg: &mut Cfg) -> usize {
    let phis = place_phis(cfg);
    rename(cfg);
    info!("{}: converted to SSA with {} phis", cfg.name, phis);
    phis
}
