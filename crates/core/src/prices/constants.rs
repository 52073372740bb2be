/// TTL for records ingested on demand or by the scheduled sync.
pub const LIVE_TTL_DAYS: i64 = 30;

/// TTL for historically backfilled records.
pub const BACKFILL_TTL_DAYS: i64 = 365;

/// Upper bound on records per store transaction.
pub const MAX_BATCH_SIZE: usize = 500;

/// Largest page a point query may request.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Trailing window for range queries without a start date.
pub const DEFAULT_FILTER_WINDOW_DAYS: i64 = 60;

/// Longest range a single backfill run may cover.
pub const MAX_BACKFILL_RANGE_DAYS: i64 = 366;

/// Prices arrive per tonne; displayed per kilogram.
pub const KG_PER_TONNE: i64 = 1000;

pub const DEFAULT_CURRENCY: &str = "INR";

pub const DEFAULT_STATE: &str = "Karnataka";

/// States preloaded by the in-memory cache and refreshed by the scheduled sync.
pub const DEFAULT_HOT_STATES: [&str; 3] = ["Karnataka", "Tamil Nadu", "Punjab"];
