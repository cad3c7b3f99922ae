//! The three-address intermediate language handed over by IR lowering.

mod error;
pub mod reader;
mod tac;

pub use reader::read_listing;
pub use tac::*;
