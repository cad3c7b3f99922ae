use clap::{Args, Parser, Subcommand};

use crate::pipeline::Stage;

#[derive(Debug, Parser)]
#[command(about = "Builds control-flow graphs and SSA form from TAC listings")]
pub struct Options {
    #[command(subcommand)]
    pub operation: Operation,
    #[arg(short, long, default_value_t = 1)]
    pub verbose: usize,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// Partition each procedure into basic blocks
    Cfg { file: String },
    /// Also compute dominator trees and dominance frontiers
    Dom { file: String },
    /// Convert each procedure to SSA form
    Ssa {
        file: String,
        #[command(flatten)]
        ssa: SsaOptions,
    },
}

impl Operation {
    pub fn file(&self) -> &str {
        match self {
            Self::Cfg { file } | Self::Dom { file } | Self::Ssa { file, .. } => file,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Cfg { .. } => Stage::Cfg,
            Self::Dom { .. } => Stage::Dominance,
            Self::Ssa { .. } => Stage::Ssa,
        }
    }

    /// Whether converted procedures should be checked before they are printed.
    pub fn verify(&self) -> bool {
        match self {
            Self::Ssa { ssa, .. } => ssa.verify(),
            _ => false,
        }
    }
}

#[derive(Debug, Args)]
pub struct SsaOptions {
    #[arg(long)]
    /// Do not check the dominator tree and SSA form after conversion
    no_verify: bool,
}

impl SsaOptions {
    pub fn verify(&self) -> bool {
        !self.no_verify
    }
}
