use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RateLimitConfig, MAX_RATE_LIMIT_QPS, MIN_RATE_LIMIT_QPS};

/// Gate in front of every outbound control-plane call.
///
/// Shared by all concurrent resolutions; callers are admitted in whatever order
/// permits become available.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until a permit is available and consume it.
    async fn accept(&self);
}

/// Token bucket: `bucket` permits of burst, refilled at `qps` permits per second.
pub struct TokenBucketLimiter {
    inner: DefaultDirectRateLimiter,
}

impl TokenBucketLimiter {
    /// `qps` outside the accepted range is clamped to the nearest bound.
    pub fn new(qps: f32, bucket: NonZeroU32) -> Self {
        let quota = Quota::with_period(refill_period(qps))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(bucket);
        Self {
            inner: governor::RateLimiter::direct(quota),
        }
    }
}

const MIN_REFILL_PERIOD: Duration = Duration::from_nanos(1);
const MAX_REFILL_PERIOD: Duration = Duration::from_secs(1000);

fn refill_period(qps: f32) -> Duration {
    if qps.is_nan() || qps <= MIN_RATE_LIMIT_QPS {
        return MAX_REFILL_PERIOD;
    }
    if qps >= MAX_RATE_LIMIT_QPS {
        return MIN_REFILL_PERIOD;
    }
    Duration::try_from_secs_f64(1.0 / f64::from(qps))
        .map_or(MAX_REFILL_PERIOD, |p| p.clamp(MIN_REFILL_PERIOD, MAX_REFILL_PERIOD))
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn accept(&self) {
        self.inner.until_ready().await;
    }
}

/// Admits every caller immediately.
#[derive(Debug, Clone, Default)]
pub struct NoopLimiter;

#[async_trait]
impl RateLimiter for NoopLimiter {
    async fn accept(&self) {}
}

pub fn limiter_from_config(config: &RateLimitConfig) -> Arc<dyn RateLimiter> {
    if !config.enabled {
        return Arc::new(NoopLimiter);
    }
    tracing::info!(
        "cloud provider rate limit enabled: qps={} bucket={}",
        config.qps,
        config.bucket
    );
    Arc::new(TokenBucketLimiter::new(config.qps, config.bucket))
}
