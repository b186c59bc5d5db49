//! Facility-local time source.
//!
//! Every schedule and pause comparison runs on the facility's wall clock,
//! never the executing device's. The clock is injected so the consuming
//! application decides what "now" means and tests can pin it.

use chrono::{FixedOffset, NaiveDateTime, Utc};

pub trait FacilityClock: Send + Sync {
    /// Current wall-clock time at the facility.
    fn facility_now(&self) -> NaiveDateTime;
}

/// Clock for a facility at a fixed UTC offset.
pub struct FixedOffsetClock {
    offset: FixedOffset,
}

impl FixedOffsetClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(FixedOffset::east_opt(0).unwrap())
    }
}

impl FacilityClock for FixedOffsetClock {
    fn facility_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Clock pinned to a single instant. For tests and deterministic replays.
pub struct FrozenClock(pub NaiveDateTime);

impl FacilityClock for FrozenClock {
    fn facility_now(&self) -> NaiveDateTime {
        self.0
    }
}
