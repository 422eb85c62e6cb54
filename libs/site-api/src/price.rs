use serde::{Deserialize, Serialize};

/// One anchor of the price schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix milliseconds.
    pub time: i64,
    /// Amount in the currency's minor unit (cents).
    pub price: i64,
}

fn default_exponent() -> f64 {
    1.0
}

/// Price that moves from `start` to `end` over time.
///
/// Serialized as-is for the price-quote endpoint, so the client can draw the
/// same curve it will be charged along.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub start: PricePoint,
    pub end: PricePoint,
    /// Shape of the curve; 1.0 is a straight line.
    #[serde(default = "default_exponent")]
    pub exponent: f64,
}

impl PriceRange {
    pub fn linear(start: PricePoint, end: PricePoint) -> Self {
        Self {
            start,
            end,
            exponent: default_exponent(),
        }
    }

    /// Position of `now_ms` inside the window, clamped to `[0, 1]`.
    pub fn progress(&self, now_ms: i64) -> f64 {
        let span = self.end.time - self.start.time;
        if span <= 0 {
            return if now_ms < self.start.time { 0.0 } else { 1.0 };
        }
        let where_ = (now_ms - self.start.time) as f64 / span as f64;
        where_.clamp(0.0, 1.0)
    }

    /// Price to charge at `now_ms`. Never extrapolates past either anchor.
    pub fn interpolated_price(&self, now_ms: i64) -> i64 {
        let t = self.progress(now_ms).powf(self.exponent);
        let delta = (self.end.price - self.start.price) as f64;
        self.start.price + (delta * t) as i64
    }
}
