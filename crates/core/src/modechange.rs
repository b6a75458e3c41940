// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symbolic file mode compiler, following the coreutils `chmod` grammar:
//! `[ugoa]*([-+=]([rwxXst]*|[ugo]))+` groups separated by commas, or an
//! octal literal.
//!
//! Mode strings compile once into a list of [`ModeChange`] operations that
//! can then be applied to any number of files.

use crate::error::ModeError;

pub const SUID: u32 = 0o4000;
pub const SGID: u32 = 0o2000;
pub const SVTX: u32 = 0o1000;

const IRWXU: u32 = 0o700;
const IRWXG: u32 = 0o070;
const IRWXO: u32 = 0o007;

const ALL_R: u32 = 0o444;
const ALL_W: u32 = 0o222;
const ALL_X: u32 = 0o111;

/// All file mode bits an operation may touch.
pub const CHMOD_MODE_BITS: u32 = SUID | SGID | SVTX | IRWXU | IRWXG | IRWXO;

/// Special handling applied by one mode-change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFlag {
    /// The typical case.
    Ordinary,
    /// Affect the execute bits only if at least one is already set, or if
    /// the file is a directory (`X`).
    XIfAnyX,
    /// Copy the existing `u`, `g` or `o` permissions onto the other classes.
    CopyExisting,
}

/// One compiled mode change operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    /// One of `=`, `+`, `-`.
    pub op: char,
    pub flag: ChangeFlag,
    /// Bits selected by `u`, `g`, `o` or `a`.
    pub affected: u32,
    /// Bits to add or remove.
    pub value: u32,
    /// Bits explicitly mentioned in the mode string.
    pub mentioned: u32,
}

impl ModeChange {
    fn op_equals(new_mode: u32, mentioned: u32) -> Self {
        Self {
            op: '=',
            flag: ChangeFlag::Ordinary,
            affected: CHMOD_MODE_BITS,
            value: new_mode,
            mentioned,
        }
    }
}

/// Compile a mode string into a list of change operations.
pub fn compile(mode_string: &str) -> Result<Vec<ModeChange>, ModeError> {
    let first = mode_string
        .chars()
        .next()
        .ok_or_else(|| ModeError::InvalidOctal(mode_string.to_string()))?;

    if first.is_ascii_digit() {
        let octal = u32::from_str_radix(mode_string, 8)
            .map_err(|_| ModeError::InvalidOctal(mode_string.to_string()))?;
        if octal > CHMOD_MODE_BITS {
            return Err(ModeError::InvalidOctal(mode_string.to_string()));
        }
        // Modes shorter than five digits leave setuid/setgid bits of
        // directories alone unless explicitly present.
        let mentioned = if mode_string.len() < 5 {
            (octal & (SUID | SGID)) | SVTX | IRWXU | IRWXG | IRWXO
        } else {
            CHMOD_MODE_BITS
        };
        return Ok(vec![ModeChange::op_equals(octal, mentioned)]);
    }

    let mut compiled = Vec::new();
    for group in mode_string.split(',') {
        if group.is_empty() {
            return Err(ModeError::InvalidOctal(mode_string.to_string()));
        }
        compiled.push(compile_group(group)?);
    }
    Ok(compiled)
}

/// Compile one comma-separated group.
pub fn compile_group(group: &str) -> Result<ModeChange, ModeError> {
    let bytes = group.as_bytes();
    let mut i = 0;
    let mut op = 0u8;
    let mut affected: u32 = 0;
    let mut mentioned: u32 = 0;
    let mut flag = ChangeFlag::Ordinary;
    let mut value: u32 = 0;

    let invalid = || ModeError::Invalid(group.to_string());

    while i < bytes.len() {
        // Which bits in the mode are operated on.
        affected = 0;
        let mut found_op = false;
        while i < bytes.len() {
            let c = bytes[i];
            i += 1;
            match c {
                b'u' => affected |= SUID | IRWXU,
                b'g' => affected |= SGID | IRWXG,
                b'o' => affected |= SVTX | IRWXO,
                b'a' => affected |= CHMOD_MODE_BITS,
                b'=' | b'+' | b'-' => {
                    op = c;
                    found_op = true;
                    break;
                }
                _ => return Err(invalid()),
            }
        }
        if !found_op {
            return Err(invalid());
        }

        mentioned = 0;
        flag = ChangeFlag::Ordinary;
        value = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_ascii_digit() {
                // [-+=][0-7]+ form; a who prefix is not allowed here.
                let octal = u32::from_str_radix(&group[i..], 8).map_err(|_| invalid())?;
                if affected != 0 {
                    return Err(invalid());
                }
                affected = CHMOD_MODE_BITS;
                mentioned = CHMOD_MODE_BITS;
                value = octal;
                flag = ChangeFlag::Ordinary;
                i = bytes.len();
            } else if c == b'u' {
                value = IRWXU;
                flag = ChangeFlag::CopyExisting;
                i += 1;
            } else if c == b'g' {
                value = IRWXG;
                flag = ChangeFlag::CopyExisting;
                i += 1;
            } else if c == b'o' {
                value = IRWXO;
                flag = ChangeFlag::CopyExisting;
                i += 1;
            } else {
                flag = ChangeFlag::Ordinary;
                while i < bytes.len() {
                    let c = bytes[i];
                    i += 1;
                    match c {
                        b'r' => value |= ALL_R,
                        b'w' => value |= ALL_W,
                        b'x' => value |= ALL_X,
                        b'X' => flag = ChangeFlag::XIfAnyX,
                        b's' => value |= SUID | SGID,
                        b't' => value |= SVTX,
                        _ => break,
                    }
                }
            }
        }
    }

    if op == 0 {
        return Err(invalid());
    }

    Ok(ModeChange {
        op: op as char,
        flag,
        affected,
        value,
        mentioned: if mentioned != 0 {
            mentioned
        } else if affected != 0 {
            affected
        } else {
            value
        },
    })
}

/// Apply compiled changes to `oldmode`.
///
/// With `is_dir`, `X` affects the execute bits even when none are set, and
/// setuid/setgid bits are preserved unless the changes mentioned them.
/// Operations with no `who` prefix are filtered through the umask.
///
/// Returns the new mode and a mask of the bits the changes cared about.
pub fn adjust(oldmode: u32, is_dir: bool, umask: u32, changes: &[ModeChange]) -> (u32, u32) {
    let mut newmode = oldmode & CHMOD_MODE_BITS;
    let mut mode_bits: u32 = 0;

    for change in changes {
        let affected = change.affected;
        let omit_change = (if is_dir { SUID | SGID } else { 0 }) & !change.mentioned;
        let mut value = change.value;

        match change.flag {
            ChangeFlag::Ordinary => {}
            ChangeFlag::CopyExisting => {
                // Isolate the bits to copy, then mirror them to every class.
                value &= newmode;
                value |= (if value & ALL_R != 0 { ALL_R } else { 0 })
                    | (if value & ALL_W != 0 { ALL_W } else { 0 })
                    | (if value & ALL_X != 0 { ALL_X } else { 0 });
            }
            ChangeFlag::XIfAnyX => {
                if newmode & ALL_X != 0 || is_dir {
                    value |= ALL_X;
                }
                value &= (if affected != 0 { affected } else { !umask }) & !omit_change;
            }
        }

        value &= (if affected != 0 { affected } else { !umask }) & !omit_change;

        match change.op {
            '=' => {
                // Preserve bits outside the affected classes; with no who
                // prefix, clear everything not being set.
                let preserved = (if affected != 0 { !affected } else { 0 }) | omit_change;
                mode_bits |= CHMOD_MODE_BITS & !preserved;
                newmode = (newmode & preserved) | value;
            }
            '+' => {
                mode_bits |= value;
                newmode |= value;
            }
            '-' => {
                mode_bits |= value;
                newmode &= !value;
            }
            _ => {}
        }
    }

    (newmode, mode_bits)
}

#[cfg(test)]
#[path = "modechange_tests.rs"]
mod tests;
