use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Inclusive upper bound of the clock: the reference platform's maximum
/// safe integer (2^53 - 1), kept for wire-level interoperability.
pub const MAX_LOGICAL_TIME: u64 = (1 << 53) - 1;

/// Version tag carried by serialized clock state.
pub const CLOCK_VERSION: &str = "1.0";

/// Monotonic integer counter used for ordering decisions in the absence
/// of a trusted wall clock. Advanced only via [`LogicalClock::tick`];
/// [`LogicalClock::sync`] accepts strictly greater values only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalClock {
    value: u64,
    frozen: bool,
}

/// Serialized clock form: `{logical_clock, version}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub logical_clock: u64,
    pub version: String,
}

impl LogicalClock {
    /// A clock starting at `initial`, which must lie in
    /// `[1, MAX_LOGICAL_TIME]`.
    pub fn new(initial: u64) -> Result<Self> {
        if initial == 0 {
            return Err(Error::LogicalTimeViolation(
                "initial logical time must be at least 1".into(),
            ));
        }
        if initial > MAX_LOGICAL_TIME {
            return Err(Error::LogicalTimeViolation(format!(
                "initial logical time {initial} exceeds {MAX_LOGICAL_TIME}"
            )));
        }
        Ok(LogicalClock {
            value: initial,
            frozen: false,
        })
    }

    /// Increment and return the new value.
    pub fn tick(&mut self) -> Result<u64> {
        if self.frozen {
            return Err(Error::LogicalTimeViolation("clock is frozen".into()));
        }
        if self.value >= MAX_LOGICAL_TIME {
            return Err(Error::LogicalTimeViolation(format!(
                "clock overflow at {MAX_LOGICAL_TIME}"
            )));
        }
        self.value += 1;
        Ok(self.value)
    }

    pub fn current(&self) -> u64 {
        self.value
    }

    /// Jump forward to `new_value`, which must be strictly greater than
    /// the current value.
    pub fn sync(&mut self, new_value: u64) -> Result<()> {
        if new_value <= self.value {
            return Err(Error::LogicalTimeViolation(format!(
                "sync target {new_value} is not greater than current {}",
                self.value
            )));
        }
        if new_value > MAX_LOGICAL_TIME {
            return Err(Error::LogicalTimeViolation(format!(
                "sync target {new_value} exceeds {MAX_LOGICAL_TIME}"
            )));
        }
        self.value = new_value;
        Ok(())
    }

    /// Block `tick` until [`LogicalClock::unfreeze`]. For audit and test
    /// harnesses.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn state(&self) -> ClockState {
        ClockState {
            logical_clock: self.value,
            version: CLOCK_VERSION.to_string(),
        }
    }

    pub fn from_state(state: &ClockState) -> Result<Self> {
        if state.version != CLOCK_VERSION {
            return Err(Error::ValidationFailed(format!(
                "unknown clock state version {:?}",
                state.version
            )));
        }
        LogicalClock::new(state.logical_clock)
    }

    // Failed-append recovery only: puts the counter back to a value
    // observed earlier in the same operation.
    pub(crate) fn restore(&mut self, value: u64) {
        self.value = value;
    }

    /// `next` is a valid successor of `prev`.
    pub fn validate_order(prev: u64, next: u64) -> bool {
        next > prev
    }

    pub fn compare(a: u64, b: u64) -> Ordering {
        a.cmp(&b)
    }
}
