//! Terminal flags marking episode boundaries

use serde::{Deserialize, Serialize};

use crate::{ReplayError, Result};

/// Per-timestep terminal flag
///
/// `Pending` never appears in producer input. A memory writes it on the newest
/// slot of an episode that is still in progress, so that the newest slot is
/// always a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Terminal {
    /// Not a terminal timestep
    #[default]
    No = 0,
    /// Episode ended normally
    Terminal = 1,
    /// Episode was cut short (time limit, external abort)
    Truncated = 2,
    /// Provisional boundary of an unfinished episode
    Pending = 3,
}

impl Terminal {
    /// Integer code of this flag
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Parse an integer code
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::No),
            1 => Ok(Self::Terminal),
            2 => Ok(Self::Truncated),
            3 => Ok(Self::Pending),
            other => Err(ReplayError::InvalidArgument(format!(
                "terminal code {other} is not one of 0, 1, 2, 3"
            ))),
        }
    }

    /// Whether the slot carrying this flag is a boundary (any nonzero flag)
    #[must_use]
    pub const fn is_boundary(self) -> bool {
        !matches!(self, Self::No)
    }

    /// Whether this flag actually ends an episode
    #[must_use]
    pub const fn is_genuine(self) -> bool {
        matches!(self, Self::Terminal | Self::Truncated)
    }
}

impl From<bool> for Terminal {
    fn from(done: bool) -> Self {
        if done {
            Self::Terminal
        } else {
            Self::No
        }
    }
}

impl TryFrom<i64> for Terminal {
    type Error = ReplayError;

    fn try_from(code: i64) -> Result<Self> {
        Self::from_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for flag in [Terminal::No, Terminal::Terminal, Terminal::Truncated, Terminal::Pending] {
            assert_eq!(Terminal::from_code(flag.code()).unwrap(), flag);
        }
        assert!(Terminal::from_code(4).is_err());
        assert!(Terminal::try_from(-1).is_err());
    }

    #[test]
    fn test_boundary_classification() {
        assert!(!Terminal::No.is_boundary());
        assert!(Terminal::Pending.is_boundary());
        assert!(!Terminal::Pending.is_genuine());
        assert!(Terminal::Truncated.is_genuine());
        assert_eq!(Terminal::from(true), Terminal::Terminal);
    }
}
