use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_second: u32,
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            per_day: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateUsage {
    pub used_last_24h: u32,
    pub daily_limit: u32,
    pub tokens_available: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    granted: VecDeque<Instant>,
}

/// Token bucket shared by every upstream fetch, with a rolling 24h ceiling.
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    pub fn starting_at(config: RateLimitConfig, now: Instant) -> Self {
        let capacity = f64::from(config.per_second);
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: now,
                granted: VecDeque::new(),
            }),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let Ok(mut bucket) = self.bucket.lock() else {
            return false;
        };

        let capacity = f64::from(self.config.per_second);
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * capacity).min(capacity);
        bucket.last_refill = now;

        while bucket
            .granted
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= DAY)
        {
            bucket.granted.pop_front();
        }

        if bucket.granted.len() >= self.config.per_day as usize {
            return false;
        }
        if bucket.tokens < 1.0 {
            return false;
        }

        bucket.tokens -= 1.0;
        bucket.granted.push_back(now);
        true
    }

    pub fn usage(&self) -> RateUsage {
        let (used, tokens) = match self.bucket.lock() {
            Ok(b) => (b.granted.len() as u32, b.tokens),
            Err(_) => (0, 0.0),
        };
        RateUsage {
            used_last_24h: used,
            daily_limit: self.config.per_day,
            tokens_available: tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refills_one_token_per_second() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(RateLimitConfig::default(), start);

        assert!(limiter.try_acquire_at(start));
        assert!(!limiter.try_acquire_at(start + Duration::from_millis(300)));
        assert!(limiter.try_acquire_at(start + Duration::from_millis(1300)));
    }

    #[test]
    fn burst_is_capped_at_per_second_budget() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(
            RateLimitConfig {
                per_second: 3,
                per_day: 100,
            },
            start,
        );
        let later = start + Duration::from_secs(60);
        let granted = (0..10).filter(|_| limiter.try_acquire_at(later)).count();
        assert_eq!(granted, 3);
    }

    #[test]
    fn daily_ceiling_rolls_over_after_24h() {
        let start = Instant::now();
        let limiter = RateLimiter::starting_at(
            RateLimitConfig {
                per_second: 10,
                per_day: 2,
            },
            start,
        );

        assert!(limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start + Duration::from_secs(1)));
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(3600)));
        assert_eq!(limiter.usage().used_last_24h, 2);

        assert!(limiter.try_acquire_at(start + DAY + Duration::from_secs(1)));
    }
}
