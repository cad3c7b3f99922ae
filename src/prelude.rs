//! Items used throughout the compiler.

pub use anyhow::{bail, Context, Result};
pub use log::{debug, info, trace, warn};
