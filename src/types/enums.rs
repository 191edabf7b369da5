//! Small enumerations shared across the domain model.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// Lifecycle state of an analysis task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// Claimed by a worker and in flight at the engine.
    Running,
    /// Completed with a result.
    Success,
    /// Exhausted its retry budget.
    Failed,
}

impl TaskStatus {
    /// Lowercase name matching the Postgres column value.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = InvalidTaskStatus;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(InvalidTaskStatus(other.to_string())),
        }
    }
}

/// Error for an unrecognized task status string.
#[derive(Debug, Clone, Error)]
#[error("invalid task status: {0}")]
pub struct InvalidTaskStatus(pub String);

/// Which side made a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Player {
    /// Black, the side against which engine winrate/score are always reported.
    Black,
    /// White.
    White,
}

impl Player {
    /// Single-letter GTP form, `"B"` or `"W"`.
    #[must_use]
    pub const fn letter(self) -> &'static str {
        match self {
            Self::Black => "B",
            Self::White => "W",
        }
    }

    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl TryFrom<&str> for Player {
    type Error = InvalidPlayer;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "B" | "BLACK" => Ok(Self::Black),
            "W" | "WHITE" => Ok(Self::White),
            other => Err(InvalidPlayer(other.to_string())),
        }
    }
}

/// Error for an unrecognized player string.
#[derive(Debug, Clone, Error)]
#[error("invalid player: {0}")]
pub struct InvalidPlayer(pub String);

/// Lifecycle state of a tracked match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Currently being played; new moves may still arrive.
    Live,
    /// Play has concluded; the move list is final.
    Finished,
}

impl MatchStatus {
    /// Lowercase name matching the Postgres column value.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for MatchStatus {
    type Error = InvalidMatchStatus;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "live" => Ok(Self::Live),
            "finished" => Ok(Self::Finished),
            other => Err(InvalidMatchStatus(other.to_string())),
        }
    }
}

/// Error for an unrecognized match status string.
#[derive(Debug, Clone, Error)]
#[error("invalid match status: {0}")]
pub struct InvalidMatchStatus(pub String);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod task_status_tests {
        use super::*;

        #[test]
        fn round_trips_through_name() {
            for s in [
                TaskStatus::Pending,
                TaskStatus::Running,
                TaskStatus::Success,
                TaskStatus::Failed,
            ] {
                assert_eq!(TaskStatus::try_from(s.name()).unwrap(), s);
            }
        }

        #[test]
        fn rejects_unknown() {
            assert!(TaskStatus::try_from("bogus").is_err());
        }
    }

    mod player_tests {
        use super::*;

        #[test]
        fn opponent_is_involutive() {
            assert_eq!(Player::Black.opponent().opponent(), Player::Black);
        }

        #[test]
        fn parses_letters_and_words() {
            assert_eq!(Player::try_from("B").unwrap(), Player::Black);
            assert_eq!(Player::try_from("white").unwrap(), Player::White);
        }

        #[test]
        fn rejects_unknown() {
            assert!(Player::try_from("X").is_err());
        }
    }

    mod match_status_tests {
        use super::*;

        #[test]
        fn round_trips_through_name() {
            for s in [MatchStatus::Live, MatchStatus::Finished] {
                assert_eq!(MatchStatus::try_from(s.name()).unwrap(), s);
            }
        }
    }
}
