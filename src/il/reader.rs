//! Reading textual IR listings.
//!
//! A listing holds one or more procedures, each introduced by `proc NAME` and
//! followed by one instruction per line:
//! ```text
//! proc main
//!     ENTER -, -, -
//!     LOADI 1, -, t0
//!     CBR t0, L1, L2
//! L1:
//!     RET t0, -, -
//! ```
//! Missing trailing operands are unused, `Lk:` is shorthand for `LABEL Lk` and
//! `;` starts a comment. Block headers as printed by the CFG dump (`B3 (L2):`)
//! are skipped, so a dump can be read back in.

use crate::{cfg::BlockId, ext::index::Index};

use super::{
    error::{ReadError, ReadErrorKind},
    tac::*,
};

/// The procedure name used for instructions that precede any `proc` line.
const DEFAULT_PROCEDURE: &str = "main";

pub fn read_listing(source: &str) -> Result<Vec<Procedure>, ReadError> {
    let mut procedures = vec![];
    let mut current: Option<Procedure> = None;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = strip_comment(raw).trim();
        if text.is_empty() || is_block_header(text) {
            continue;
        }

        if let Some(name) = procedure_header(text) {
            if name.is_empty() {
                return Err(ReadError::new(line, ReadErrorKind::MissingName));
            }
            procedures.extend(current.take());
            current = Some(Procedure::new(name, TacListing::new()));
            continue;
        }

        let instr = read_instr(text).map_err(|kind| ReadError::new(line, kind))?;
        current
            .get_or_insert_with(|| Procedure::new(DEFAULT_PROCEDURE, TacListing::new()))
            .body
            .push(instr);
    }

    procedures.extend(current);
    Ok(procedures)
}

fn strip_comment(line: &str) -> &str {
    line.split_once(';').map_or(line, |(code, _)| code)
}

fn procedure_header(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("proc")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn is_block_header(text: &str) -> bool {
    let Some(head) = text.strip_suffix(':') else {
        return false;
    };
    let name = head.split_whitespace().next().unwrap_or_default();
    read_block(name).is_some()
}

fn read_instr(text: &str) -> Result<Instr, ReadErrorKind> {
    if let Some(label) = text.strip_suffix(':').and_then(read_label) {
        return Ok(Instr::label(label));
    }

    let (name, rest) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));
    let op: Op = name
        .parse()
        .map_err(|_| ReadErrorKind::UnknownOpcode(name.to_string()))?;

    let operands = split_operands(rest)?;
    if operands.len() > 3 {
        return Err(ReadErrorKind::TooManyOperands(operands.len()));
    }
    let mut operands = operands
        .into_iter()
        .map(read_operand)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let mut next = || operands.next().unwrap_or(Operand::Unused);
    Ok(Instr::new(op, next(), next(), next()))
}

/// Split a comma-separated operand list, ignoring commas nested in brackets.
fn split_operands(text: &str) -> Result<Vec<&str>, ReadErrorKind> {
    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let unbalanced = || ReadErrorKind::Unbalanced(text.trim().to_string());
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        match ch {
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.checked_sub(1).ok_or_else(unbalanced)?,
            ',' if depth == 0 => {
                parts.push(text[start..pos].trim());
                start = pos + 1;
            }
            _ => (),
        }
    }
    if depth != 0 {
        return Err(unbalanced());
    }
    parts.push(text[start..].trim());
    Ok(parts)
}

fn read_operand(text: &str) -> Result<Operand, ReadErrorKind> {
    let invalid = || ReadErrorKind::InvalidOperand(text.to_string());

    if text == "-" {
        return Ok(Operand::Unused);
    }
    if let Some(inner) = text.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or_else(invalid)?;
        let args = split_operands(inner)?
            .into_iter()
            .map(read_operand)
            .collect::<Result<_, _>>()?;
        return Ok(Operand::Misc(Misc::Args(args)));
    }
    if let Some(inner) = text.strip_prefix('{') {
        let inner = inner.strip_suffix('}').ok_or_else(invalid)?;
        let incoming = split_operands(inner)?
            .into_iter()
            .map(|entry| {
                let (pred, value) = entry.split_once(':').ok_or_else(invalid)?;
                Ok::<_, ReadErrorKind>(Incoming {
                    pred: read_block(pred.trim()).ok_or_else(invalid)?,
                    value: read_operand(value.trim())?,
                })
            })
            .collect::<Result<_, _>>()?;
        return Ok(Operand::Misc(Misc::Incoming(incoming)));
    }
    if let Some(name) = text.strip_prefix('@') {
        if name.is_empty() {
            return Err(invalid());
        }
        return Ok(Operand::Global(name.to_string()));
    }
    if let Some(value) = text.strip_prefix('#') {
        return value
            .parse()
            .map(|v| Operand::Misc(Misc::Opaque(v)))
            .map_err(|_| invalid());
    }
    if text.starts_with('t') {
        return read_temp(text).map(Operand::Temporary).ok_or_else(invalid);
    }
    if text.starts_with('L') {
        return read_label(text).map(Operand::Label).ok_or_else(invalid);
    }
    text.parse().map(Operand::Immediate).map_err(|_| invalid())
}

fn read_temp(text: &str) -> Option<Temp> {
    let body = text.strip_prefix('t')?;
    match body.split_once('.') {
        Some((id, version)) => Some(Temp::versioned(id.parse().ok()?, version.parse().ok()?)),
        None => Some(Temp::new(body.parse().ok()?)),
    }
}

fn read_label(text: &str) -> Option<LabelId> {
    text.strip_prefix('L')?.parse().ok().map(LabelId)
}

fn read_block(text: &str) -> Option<BlockId> {
    text.strip_prefix('B')?.parse().ok().map(BlockId::new)
}
