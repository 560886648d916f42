use crate::model::Ms;

/// Timestamps at or below zero are treated as unset.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 1;

/// 9999-12-31T23:59:59.999Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;

/// Idle records match total/occupied records only on identical windows.
pub const DEFAULT_MATCH_TOLERANCE_MS: Ms = 0;

/// Name written for an overlapping event whose name field is blank.
pub const UNNAMED_EVENT: &str = "Unknown event";
