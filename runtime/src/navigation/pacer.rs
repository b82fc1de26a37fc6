// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Randomized human-like pauses.
//!
//! Every wait the navigation engine performs goes through a [`Pacer`], so
//! tests can swap in [`InstantPacer`] and run the retry state machine
//! without sleeping.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Inclusive range a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// Draw a duration uniformly from the range.
    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if hi <= lo {
            return self.min;
        }
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Before each navigation attempt.
pub const PRE_NAVIGATION: DelayRange = DelayRange::millis(2_000, 5_000);
/// After the page reports ready, for late dynamic content.
pub const SETTLE: DelayRange = DelayRange::millis(2_000, 4_000);
/// When a challenge page is detected, before refreshing.
pub const CHALLENGE_WAIT: DelayRange = DelayRange::millis(10_000, 20_000);
/// After the challenge refresh, before re-checking.
pub const POST_REFRESH: DelayRange = DelayRange::millis(5_000, 10_000);
/// Between failed navigation attempts.
pub const RETRY_COOLDOWN: DelayRange = DelayRange::millis(30_000, 120_000);
/// Before relaunching a restarted session.
pub const SESSION_RESTART: DelayRange = DelayRange::millis(5_000, 10_000);
/// After a waited-for element becomes visible.
pub const ELEMENT_FOUND: DelayRange = DelayRange::millis(500, 1_500);
/// Before snapshotting page content.
pub const PRE_EXTRACT: DelayRange = DelayRange::millis(1_000, 2_000);

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, range: DelayRange);
}

/// Sleeps a uniformly random duration within the range.
pub struct HumanPacer;

#[async_trait]
impl Pacer for HumanPacer {
    async fn pause(&self, range: DelayRange) {
        let delay = range.sample(&mut rand::thread_rng());
        tokio::time::sleep(delay).await;
    }
}

/// Never sleeps.
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, _range: DelayRange) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let d = RETRY_COOLDOWN.sample(&mut rng);
            assert!(d >= Duration::from_secs(30));
            assert!(d <= Duration::from_secs(120));
        }
    }

    #[test]
    fn test_degenerate_range() {
        let fixed = DelayRange::millis(700, 700);
        assert_eq!(fixed.sample(&mut rand::thread_rng()), Duration::from_millis(700));
        let inverted = DelayRange::millis(900, 100);
        assert_eq!(inverted.sample(&mut rand::thread_rng()), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_instant_pacer_does_not_sleep() {
        let start = std::time::Instant::now();
        InstantPacer.pause(RETRY_COOLDOWN).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
