use crate::model::Ms;

/// Max alias length in bytes.
pub const MAX_ALIAS_LEN: usize = 512;

/// Max target identifier length in bytes.
pub const MAX_TARGET_LEN: usize = 24;

/// Max records (all aliases, open and closed) kept for one target.
pub const MAX_RECORDS_PER_TARGET: usize = 10_000;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// 10000-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_800_000;
