use chrono::DateTime;
use chrono::naive::NaiveDateTime;
use derive_more::Display;
use derive_new::new;
use formato::Formato;
use once_cell::sync::Lazy;
use quanta::Clock;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::time::Duration;

type RawTime = u64;

static CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// A single instant shared by both the simulated engine clock and the
/// host wall clock, measured in nanoseconds since the UNIX epoch.
#[derive(
    new, Display, Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct EngineTime(RawTime);

impl EngineTime {
    /// `MIN_DT`: the smallest representable engine time. Every node's
    /// scheduler slot starts here so it is eligible at the earliest tick.
    pub const MIN_DT: Self = Self(0);
    /// `MAX_DT`: the sentinel used when a node has nothing scheduled.
    pub const MAX_DT: Self = Self(RawTime::MAX);
    /// `MIN_TD`: the smallest positive delta between two distinct ticks.
    pub const MIN_TD: Self = Self(1);

    pub const ZERO: Self = Self::MIN_DT;
    pub const MAX: Self = Self::MAX_DT;

    pub fn now() -> Self {
        Self(CLOCK.now().as_u64())
    }

    pub fn pretty(&self) -> String {
        (self.0 as f64 * 1e-9).formato("#,###.000_000")
    }
}

impl From<u64> for EngineTime {
    fn from(t: u64) -> Self {
        EngineTime(t)
    }
}

impl From<Duration> for EngineTime {
    fn from(dur: Duration) -> Self {
        Self(dur.as_secs() * 1_000_000_000 + dur.subsec_nanos() as RawTime)
    }
}

impl TryFrom<NaiveDateTime> for EngineTime {
    type Error = anyhow::Error;
    fn try_from(date_time: NaiveDateTime) -> anyhow::Result<Self> {
        let t = date_time.and_utc().timestamp_nanos_opt().ok_or_else(|| {
            anyhow::anyhow!("timestamp out of range for nanosecond representation")
        })?;
        Ok(EngineTime(t as RawTime))
    }
}

impl TryFrom<EngineTime> for NaiveDateTime {
    type Error = anyhow::Error;
    fn try_from(t: EngineTime) -> anyhow::Result<Self> {
        DateTime::from_timestamp((t.0 / 1_000_000_000) as i64, (t.0 % 1_000_000_000) as u32)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| anyhow::anyhow!("EngineTime out of range for DateTime"))
    }
}

impl From<EngineTime> for Duration {
    fn from(t: EngineTime) -> Self {
        Duration::from_nanos(t.0)
    }
}

impl Add<EngineTime> for EngineTime {
    type Output = Self;
    fn add(self, other: Self) -> Self::Output {
        Self(self.0.saturating_add(other.0))
    }
}

impl Add<Duration> for EngineTime {
    type Output = Self;
    fn add(self, other: Duration) -> Self::Output {
        Self(self.0.saturating_add(EngineTime::from(other).0))
    }
}

impl Sub<EngineTime> for EngineTime {
    type Output = Self;
    fn sub(self, other: Self) -> Self::Output {
        Self(self.0.saturating_sub(other.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_and_arithmetic() {
        let a = EngineTime::new(100);
        let b = EngineTime::new(200);
        assert!(a < b);
        assert_eq!(a + EngineTime::MIN_TD, EngineTime::new(101));
        assert_eq!(b - a, EngineTime::new(100));
    }

    #[test]
    fn sentinels() {
        assert!(EngineTime::MIN_DT < EngineTime::MIN_TD);
        assert!(EngineTime::MIN_TD < EngineTime::MAX_DT);
    }

    #[test]
    fn duration_round_trip() {
        let dur = Duration::from_millis(250);
        let t: EngineTime = dur.into();
        let back: Duration = t.into();
        assert_eq!(dur, back);
    }
}
