// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Source-line tokenisation: comments, operand splitting, numeric literals
//! and register names.

use crate::error::AssemblyErrorKind;

/// A register operand with its ModR/M encoding number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RegOperand {
    /// AL, CL, DL, BL, AH, CH, DH, BH.
    R8(u8),
    /// AX, CX, DX, BX, SP, BP, SI, DI.
    R16(u8),
    /// ES, CS, SS, DS.
    Segment(u8),
}

impl RegOperand {
    pub(super) fn from_name(name: &str) -> Option<Self> {
        let reg = match name.to_ascii_uppercase().as_str() {
            "AL" => Self::R8(0),
            "CL" => Self::R8(1),
            "DL" => Self::R8(2),
            "BL" => Self::R8(3),
            "AH" => Self::R8(4),
            "CH" => Self::R8(5),
            "DH" => Self::R8(6),
            "BH" => Self::R8(7),
            "AX" => Self::R16(0),
            "CX" => Self::R16(1),
            "DX" => Self::R16(2),
            "BX" => Self::R16(3),
            "SP" => Self::R16(4),
            "BP" => Self::R16(5),
            "SI" => Self::R16(6),
            "DI" => Self::R16(7),
            "ES" => Self::Segment(0),
            "CS" => Self::Segment(1),
            "SS" => Self::Segment(2),
            "DS" => Self::Segment(3),
            _ => return None,
        };
        Some(reg)
    }
}

/// Removes a `;` comment, ignoring semicolons inside quoted strings.
pub(super) fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (index, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {},
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == ';' => return &line[..index],
            None => {},
        }
    }
    line
}

/// Splits an operand list on commas, respecting quotes and brackets.
pub(super) fn split_operands(operands: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut depth = 0usize;

    for ch in operands.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            },
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                },
                '[' | '(' => {
                    depth += 1;
                    current.push(ch);
                },
                ']' | ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                },
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                },
                _ => current.push(ch),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// True when the token is a plausible label or variable name.
pub(super) fn is_identifier(token: &str) -> bool {
    !token.is_empty()
        && !token.chars().next().is_some_and(|c| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a numeric literal.
///
/// Accepted forms, in lookup order: `0x`/`0X` hexadecimal, trailing `h`/`H`
/// hexadecimal, `0b`/`0B` binary, `#n` decimal, plain decimal, and as a last
/// resort a bare string of hex digits. A leading `-` negates any of them.
pub(super) fn parse_value(token: &str) -> Result<i64, AssemblyErrorKind> {
    let token = token.trim();
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, token),
    };

    let magnitude = parse_magnitude(token)
        .ok_or_else(|| AssemblyErrorKind::MalformedOperand(token.to_string()))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_magnitude(token: &str) -> Option<i64> {
    if token.is_empty() {
        return None;
    }
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = token.strip_suffix('h').or_else(|| token.strip_suffix('H')) {
        if let Ok(value) = i64::from_str_radix(hex, 16) {
            return Some(value);
        }
    }
    if let Some(bin) = token.strip_prefix("0b").or_else(|| token.strip_prefix("0B")) {
        if let Ok(value) = i64::from_str_radix(bin, 2) {
            return Some(value);
        }
    }
    if let Some(dec) = token.strip_prefix('#') {
        return dec.parse().ok();
    }
    if let Ok(value) = token.parse() {
        return Some(value);
    }
    // Bare hex digits as a last resort, a common assembler convention.
    if token.chars().all(|c| c.is_ascii_hexdigit()) {
        return i64::from_str_radix(token, 16).ok();
    }
    None
}
