//! Distribution status codes and the board categories derived from them.

use serde::Serialize;

/// Kitchen is still working on the order.
pub const PREPARING_CODE: i64 = 50;
/// Order is waiting at the counter.
pub const READY_CODE: i64 = 60;

/// Every status code that shows up on the board.
pub const ACTIVE_STATUS_CODES: [i64; 2] = [PREPARING_CODE, READY_CODE];

/// Board category of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    BeingPrepared,
    ReadyToCollect,
}

impl DerivedStatus {
    pub const ALL: [DerivedStatus; 2] = [Self::BeingPrepared, Self::ReadyToCollect];

    /// Map a distribution status code. Codes outside the active set are untracked.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            PREPARING_CODE => Some(Self::BeingPrepared),
            READY_CODE => Some(Self::ReadyToCollect),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::BeingPrepared => PREPARING_CODE,
            Self::ReadyToCollect => READY_CODE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeingPrepared => "being_prepared",
            Self::ReadyToCollect => "ready_to_collect",
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BeingPrepared => "in preparation",
            Self::ReadyToCollect => "ready for pickup",
        }
    }
}

impl std::fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_two_codes_are_active() {
        assert_eq!(DerivedStatus::from_code(50), Some(DerivedStatus::BeingPrepared));
        assert_eq!(DerivedStatus::from_code(60), Some(DerivedStatus::ReadyToCollect));
        for code in [0, 10, 49, 51, 59, 61, 70, -50] {
            assert_eq!(DerivedStatus::from_code(code), None, "code {}", code);
        }
    }

    #[test]
    fn test_codes_round_trip_through_categories() {
        for status in DerivedStatus::ALL {
            assert_eq!(DerivedStatus::from_code(status.code()), Some(status));
            assert!(ACTIVE_STATUS_CODES.contains(&status.code()));
        }
    }
}
