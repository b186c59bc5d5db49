//! Pause and resume state for a prescription.
//!
//! A pause suspends scheduled administrations for a bounded duration. The
//! duration arithmetic is calendar addition on the facility's wall clock:
//! days and weeks go through `chrono::Days` so month and leap boundaries
//! land where a calendar says they do, not where millisecond math puts them.

use chrono::{Days, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PauseCommand, PausePrescription, PauseTimeUnit, Prescription, ResumeCommand};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PauseError {
    #[error("prescription is already paused")]
    AlreadyPaused,
    #[error("pause would extend beyond the prescription end date")]
    ExtendsBeyondEndDate,
    #[error("pause duration does not fit in the calendar")]
    DurationOutOfRange,
}

/// What the pause dialog collects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseInput {
    pub duration: u32,
    pub unit: PauseTimeUnit,
    pub notes: Option<String>,
}

/// Calendar-correct end of a pause starting at `start`.
pub fn add_pause_duration(
    start: NaiveDateTime,
    duration: u32,
    unit: PauseTimeUnit,
) -> Result<NaiveDateTime, PauseError> {
    let end = match unit {
        PauseTimeUnit::Hours => start.checked_add_signed(Duration::hours(i64::from(duration))),
        PauseTimeUnit::Days => start.checked_add_days(Days::new(u64::from(duration))),
        PauseTimeUnit::Weeks => start.checked_add_days(Days::new(u64::from(duration) * 7)),
    };
    end.ok_or(PauseError::DurationOutOfRange)
}

/// A prescription is paused when an active pause record exists and the
/// prescription has not been discontinued; discontinuation supersedes any
/// leftover pause.
pub fn is_paused(prescription: &Prescription, active_pause: Option<&PausePrescription>) -> bool {
    active_pause.is_some() && !prescription.discontinued
}

/// Checks a proposed pause against the prescription's end date. The pause
/// must finish strictly before the end date unless the prescription is
/// ongoing or has no end date at all.
pub fn validate_pause(
    duration: u32,
    unit: PauseTimeUnit,
    prescription: &Prescription,
    now: NaiveDateTime,
) -> Result<(), PauseError> {
    let Some(end_date) = prescription.end_date else {
        return Ok(());
    };
    if prescription.is_ongoing {
        return Ok(());
    }
    let pause_end = add_pause_duration(now, duration, unit)?;
    if pause_end < end_date {
        Ok(())
    } else {
        Err(PauseError::ExtendsBeyondEndDate)
    }
}

/// Creates the pause record for a prescription. Rejected outright when any
/// active pause exists; the end-date rule is re-checked here against `now`
/// because the prescription may have changed since the dialog opened.
pub fn pause(
    prescription: &Prescription,
    active_pause: Option<&PausePrescription>,
    input: &PauseInput,
    now: NaiveDateTime,
) -> Result<PausePrescription, PauseError> {
    if active_pause.is_some() {
        return Err(PauseError::AlreadyPaused);
    }
    validate_pause(input.duration, input.unit, prescription, now)?;
    Ok(PausePrescription {
        pause_start_date: now,
        pause_duration: input.duration,
        pause_time_unit: input.unit,
        pause_end_date: add_pause_duration(now, input.duration, input.unit)?,
        notes: input.notes.clone(),
    })
}

pub fn pause_command(pause: &PausePrescription) -> PauseCommand {
    PauseCommand::from(pause)
}

/// Idempotent: `None` when there is nothing to resume.
pub fn resume(active_pause: Option<&PausePrescription>) -> Option<ResumeCommand> {
    active_pause.map(|_| ResumeCommand {})
}
