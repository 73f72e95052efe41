pub mod compound;
pub mod invalidation;
pub mod lifecycle;
pub mod retrieval;
pub mod stats;
pub mod types;
pub mod units;

/// Current instant as an RFC 3339 UTC string — the stored timestamp format.
/// Same-format strings compare correctly as text, which the SQL queries rely on.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// An RFC 3339 UTC string `days` before now. Used by sweep cutoffs.
pub fn days_ago_rfc3339(days: i64) -> String {
    (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339()
}

/// An RFC 3339 UTC string `days` after now. Used to compute expiry horizons.
pub fn days_from_now_rfc3339(days: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::days(days)).to_rfc3339()
}
