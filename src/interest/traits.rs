// Interest provider trait.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for looking up the current interest signal of a keyword.
///
/// `Ok(None)` means the provider has no data for the keyword; callers treat
/// that as zero interest, not as a failure.
#[async_trait]
pub trait InterestProvider: Send + Sync {
    /// Identifier used in logs.
    fn provider_id(&self) -> &str;

    /// Look up a nonnegative interest value for one keyword.
    async fn interest(&self, keyword: &str) -> Result<Option<f64>>;
}

/// Clamp a raw provider value into the nonnegative range. NaN counts as zero.
pub fn sanitize_interest(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
