use std::{fs, iter};

use clap::Parser;

use crate::{commandline::Options, error::PositionalError, prelude::*};

mod cfg;
mod commandline;
mod error;
mod ext;
mod il;
mod listing;
mod pipeline;
mod prelude;
mod ssa;

fn main() -> Result<()> {
    let options = Options::parse();

    stderrlog::new()
        .module(module_path!())
        .verbosity(options.verbose)
        .init()?;

    let operation = &options.operation;
    let content = fs::read_to_string(operation.file())
        .with_context(|| format!("could not read {}", operation.file()))?;

    let procedures = match il::read_listing(&content) {
        Ok(procedures) => procedures,
        Err(err) => {
            describe_error(&err, &content);
            bail!("could not read {}", operation.file());
        }
    };
    info!("read {} procedures", procedures.len());

    for procedure in procedures {
        let name = procedure.name.clone();
        let cfg = pipeline::run(procedure, operation.stage())
            .with_context(|| format!("in procedure {}", name))?;

        if operation.verify() {
            ssa::verify_dominator_tree(&cfg).with_context(|| format!("in procedure {}", name))?;
            ssa::verify_ssa(&cfg).with_context(|| format!("in procedure {}", name))?;
            debug!("{}: verified", name);
        }

        println!("{}", cfg);
    }

    Ok(())
}

fn describe_error(err: &impl PositionalError, content: &str) {
    let line_no = err.line();
    let error_line = content.lines().nth(line_no.saturating_sub(1)).unwrap_or_default();

    fn pad_char(ch: char, times: usize) -> String {
        iter::repeat(ch).take(times).collect()
    }

    let gutter = format!("{}", line_no);
    let indent = error_line.len() - error_line.trim_start().len();

    eprintln!("{}| {}", gutter, error_line);
    eprintln!(
        "{}| {}{}--- {}",
        pad_char(' ', gutter.len()),
        pad_char(' ', indent),
        pad_char('^', error_line.trim().len().max(1)),
        err.describe()
    );
}
