//! Move-list parsing for the listing source's several encodings (§6).
//!
//! The listing API is not ours to control, and different matches - often
//! from different upstream sources multiplexed behind one API - report
//! their move lists differently. All four shapes below normalize to the
//! same `Vec<Coord>` the rest of the core works with.

use crate::error::DomainError;
use crate::types::primitives::Coord;

/// Parse a move list in any of the encodings described in §6:
///
/// - a JSON array of GTP coordinate strings
/// - a comma-separated string of flat `row * board_size + col` indices
/// - a semicolon-separated GTP string, e.g. `"Q16;D4;Q4"`
/// - an SGF fragment, e.g. `";B[pd];W[dd]"`
///
/// # Errors
///
/// Returns [`DomainError::InvalidCoord`]-wrapping errors if a move fails to
/// parse under every encoding the input shape is eligible for.
pub fn parse_move_list(raw: &serde_json::Value, board_size: u8) -> Result<Vec<Coord>, DomainError> {
    match raw {
        serde_json::Value::Array(items) => parse_string_array(items),
        serde_json::Value::String(s) => parse_move_string(s, board_size),
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(DomainError::InvalidCoord(format!(
            "unsupported move list shape: {other}"
        ))),
    }
}

fn parse_string_array(items: &[serde_json::Value]) -> Result<Vec<Coord>, DomainError> {
    items
        .iter()
        .map(|v| {
            let s = v
                .as_str()
                .ok_or_else(|| DomainError::InvalidCoord(format!("non-string move entry: {v}")))?;
            Coord::new(s).map_err(Into::into)
        })
        .collect()
}

/// Dispatch a single move-list string to the SGF, semicolon-GTP, or
/// flat-index-CSV parser based on its shape.
fn parse_move_string(s: &str, board_size: u8) -> Result<Vec<Coord>, DomainError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.contains('[') {
        parse_sgf_fragment(trimmed, board_size)
    } else if trimmed.contains(';') {
        parse_semicolon_gtp(trimmed)
    } else {
        parse_flat_index_csv(trimmed, board_size)
    }
}

/// `"Q16;D4;Q4"` - a semicolon-joined sequence of GTP coordinates.
fn parse_semicolon_gtp(s: &str) -> Result<Vec<Coord>, DomainError> {
    s.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Coord::new(part).map_err(Into::into))
        .collect()
}

/// `"123,45,310"` - comma-separated flat `row * board_size + col` indices.
fn parse_flat_index_csv(s: &str, board_size: u8) -> Result<Vec<Coord>, DomainError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let index: u32 = part
                .parse()
                .map_err(|_| DomainError::InvalidCoord(format!("non-numeric move index: {part}")))?;
            Coord::from_flat_index(index, board_size).map_err(Into::into)
        })
        .collect()
}

/// `";B[pd];W[dd]"` - an SGF move sequence fragment.
///
/// SGF coordinates are a pair of lowercase letters, column then row, both
/// 0-based from the top-left, with no skipped letters (unlike GTP, which
/// skips `I`). `"pd"` is column 15 (`p` - `a`), row 3 (`d` - `a`).
fn parse_sgf_fragment(s: &str, board_size: u8) -> Result<Vec<Coord>, DomainError> {
    let mut moves = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let close = rest[open..]
            .find(']')
            .ok_or_else(|| DomainError::InvalidCoord(format!("unterminated SGF move in: {s}")))?
            + open;
        let coord_str = &rest[open + 1..close];
        if coord_str.is_empty() {
            // Empty brackets denote a pass in SGF.
            moves.push(Coord::new(Coord::PASS)?);
        } else {
            moves.push(sgf_coord_to_gtp(coord_str, board_size)?);
        }
        rest = &rest[close + 1..];
    }
    Ok(moves)
}

fn sgf_coord_to_gtp(sgf: &str, board_size: u8) -> Result<Coord, DomainError> {
    let mut chars = sgf.chars();
    let col_char = chars
        .next()
        .ok_or_else(|| DomainError::InvalidCoord(format!("empty SGF coordinate: {sgf}")))?;
    let row_char = chars
        .next()
        .ok_or_else(|| DomainError::InvalidCoord(format!("malformed SGF coordinate: {sgf}")))?;
    if chars.next().is_some() {
        return Err(DomainError::InvalidCoord(format!("malformed SGF coordinate: {sgf}")));
    }

    let col = col_char as u32 - 'a' as u32;
    let row = row_char as u32 - 'a' as u32;
    let flat_index = row * u32::from(board_size) + col;
    Coord::from_flat_index(flat_index, board_size).map_err(Into::into)
}
