//! Validated primitive types for domain entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass a move number as a priority)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// MATCH ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque identifier for a tracked match, as handed out by the listing source.
///
/// Printable, at most 64 bytes. This newtype exists so a raw `String` can't be
/// passed where a match id is expected, and vice versa.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchId(String);

impl MatchId {
    /// Maximum byte length of a match id.
    pub const MAX_LEN: usize = 64;

    /// Validate and wrap a string as a match id.
    ///
    /// # Errors
    /// Returns `InvalidMatchId` if the string is empty or exceeds [`Self::MAX_LEN`].
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidMatchId> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidMatchId::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(InvalidMatchId::TooLong(s.len()));
        }
        Ok(Self(s))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatchId({})", self.0)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<MatchId> for String {
    fn from(id: MatchId) -> Self {
        id.0
    }
}

impl TryFrom<String> for MatchId {
    type Error = InvalidMatchId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

/// Error for invalid match ids.
#[derive(Debug, Clone, Error)]
pub enum InvalidMatchId {
    /// The id was empty.
    #[error("match id cannot be empty")]
    Empty,
    /// The id exceeded the maximum length.
    #[error("match id too long: {0} bytes (max {})", MatchId::MAX_LEN)]
    TooLong(usize),
}

// ═══════════════════════════════════════════════════════════════════════════════
// GTP COORDINATE
// ═══════════════════════════════════════════════════════════════════════════════

/// A single Go board coordinate in GTP notation (e.g. `"Q16"`, `"D4"`, or `"pass"`).
///
/// Column letters run A-T, skipping I, left to right; rows are 1-based from the
/// bottom. This type only validates shape, not board-size bounds - that depends
/// on the match the coordinate belongs to.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coord(String);

impl Coord {
    /// The literal GTP pass move.
    pub const PASS: &'static str = "pass";

    /// Column letters used by GTP coordinates, skipping `I`.
    const COLUMNS: &'static str = "ABCDEFGHJKLMNOPQRSTUVWXYZ";

    /// Wrap an already-canonical GTP coordinate string.
    ///
    /// # Errors
    /// Returns `InvalidCoord` if the string isn't `"pass"` and doesn't parse as
    /// `<column-letter><row-number>`.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidCoord> {
        let s = s.into();
        if s.eq_ignore_ascii_case(Self::PASS) {
            return Ok(Self(Self::PASS.to_string()));
        }
        let mut chars = s.chars();
        let col = chars.next().ok_or_else(|| InvalidCoord::Malformed(s.clone()))?;
        if !Self::COLUMNS.contains(col.to_ascii_uppercase()) {
            return Err(InvalidCoord::Malformed(s));
        }
        let rest: String = chars.collect();
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidCoord::Malformed(s));
        }
        Ok(Self(s))
    }

    /// Build a GTP coordinate from a flat `row * board_size + col` index, as used
    /// by one of the listing source's move encodings.
    ///
    /// Row 0 of the index is the top of the board, so it maps to GTP row
    /// `board_size`.
    ///
    /// # Errors
    /// Returns `InvalidCoord` if `index` falls outside the board.
    pub fn from_flat_index(index: u32, board_size: u8) -> Result<Self, InvalidCoord> {
        let size = u32::from(board_size);
        if index >= size * size {
            return Err(InvalidCoord::OutOfBounds(index));
        }
        let row = index / size;
        let col = index % size;
        let col_letter = Self::COLUMNS
            .chars()
            .nth(col as usize)
            .ok_or(InvalidCoord::OutOfBounds(index))?;
        let gtp_row = u32::from(board_size) - row;
        Ok(Self(format!("{col_letter}{gtp_row}")))
    }

    /// The coordinate as written, e.g. `"Q16"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this coordinate represents a pass.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::PASS)
    }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord({})", self.0)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for invalid GTP coordinates.
#[derive(Debug, Clone, Error)]
pub enum InvalidCoord {
    /// The string didn't parse as a column letter followed by a row number.
    #[error("malformed coordinate: {0}")]
    Malformed(String),
    /// A flat index fell outside the board.
    #[error("flat index out of bounds: {0}")]
    OutOfBounds(u32),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRIORITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Dispatch priority for an analysis task. Higher values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// A freshly-played move on a live game: the most urgent class of work.
    pub const LIVE_NEW: Self = Self(1000);
    /// A move a user is actively looking at right now.
    pub const USER_VIEW: Self = Self(500);
    /// Earlier positions in a live game, backfilled opportunistically.
    pub const LIVE_BACKFILL: Self = Self(100);
    /// A position in a match that has already finished.
    pub const FINISHED: Self = Self(10);
    /// Lowest-urgency historical reanalysis.
    pub const HISTORICAL: Self = Self(1);

    /// Wrap a raw priority value.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// The raw integer value.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MOVE NUMBER
// ═══════════════════════════════════════════════════════════════════════════════

/// 0-based position index: `0` is the empty board, `k` is the position after the
/// k-th move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveNumber(u32);

impl MoveNumber {
    /// The empty starting position.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw move number.
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    /// The raw value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Whether this is the empty-board position.
    #[must_use]
    pub const fn is_start(&self) -> bool {
        self.0 == 0
    }

    /// The previous move number, if any.
    #[must_use]
    pub const fn prev(&self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }
}

impl fmt::Display for MoveNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MoveNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl From<MoveNumber> for u32 {
    fn from(mn: MoveNumber) -> Self {
        mn.0
    }
}

impl From<MoveNumber> for i32 {
    #[allow(clippy::cast_possible_wrap)]
    fn from(mn: MoveNumber) -> Self {
        mn.0 as Self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
