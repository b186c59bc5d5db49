//! Daily administration windows and the MAR grid.
//!
//! The MAR (medication administration record) grid shows one column per
//! administration window. A day is partitioned into twelve fixed windows;
//! the window index is the only grid coordinate. The window table is
//! validated once at construction and a malformed table aborts startup
//! rather than misassigning records later.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::AdministrationRecord;

pub const SLOT_COUNT: usize = 12;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// One administration window definition as it arrives from configuration.
/// Times are `"HH:MM"`; an end of `"24:00"` means midnight of the next day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub start_time: String,
    pub end_time: String,
    pub period_label: String,
}

impl SlotDefinition {
    pub fn new(start_time: &str, end_time: &str, period_label: &str) -> Self {
        Self {
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            period_label: period_label.to_string(),
        }
    }
}

/// A validated administration window. `end_minute` of 1440 stands in for
/// the `"24:00"` sentinel and exists for comparison only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdministrationTimeSlot {
    pub index: usize,
    start_minute: u32,
    end_minute: u32,
    pub period_label: String,
}

impl AdministrationTimeSlot {
    pub fn start_label(&self) -> String {
        format_minute(self.start_minute)
    }

    pub fn end_label(&self) -> String {
        format_minute(self.end_minute)
    }

    /// The window interval is `[start, end)`; the final window of the day
    /// also accepts its end boundary.
    fn contains_minute(&self, minute: u32, inclusive_end: bool) -> bool {
        if inclusive_end {
            self.start_minute <= minute && minute <= self.end_minute
        } else {
            self.start_minute <= minute && minute < self.end_minute
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("expected {SLOT_COUNT} administration windows, got {0}")]
    WrongWindowCount(usize),
    #[error("window {index} has unparseable time {value:?}")]
    UnparseableTime { index: usize, value: String },
    #[error("window {index} ends at or before its start ({start} >= {end})")]
    EmptyWindow { index: usize, start: String, end: String },
    #[error("first window starts at {0}, not 00:00")]
    DoesNotStartAtMidnight(String),
    #[error("window {index} starts at {start} but the previous window ends at {previous_end}")]
    GapOrOverlap {
        index: usize,
        start: String,
        previous_end: String,
    },
    #[error("last window ends at {0}, not 24:00")]
    DoesNotEndAtMidnight(String),
}

/// The fixed set of daily administration windows, validated to partition
/// 24 hours with no gaps and no overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<AdministrationTimeSlot>,
}

impl SlotTable {
    /// Builds and validates a window table. Validation failures here are
    /// configuration errors: callers should abort initialization instead
    /// of proceeding with a table that would misassign records.
    pub fn new(definitions: &[SlotDefinition]) -> Result<Self, ScheduleError> {
        if definitions.len() != SLOT_COUNT {
            return Err(ScheduleError::WrongWindowCount(definitions.len()));
        }

        let mut slots = Vec::with_capacity(definitions.len());
        for (index, definition) in definitions.iter().enumerate() {
            let start_minute = parse_minute(&definition.start_time, false).ok_or_else(|| {
                ScheduleError::UnparseableTime {
                    index,
                    value: definition.start_time.clone(),
                }
            })?;
            let end_minute = parse_minute(&definition.end_time, true).ok_or_else(|| {
                ScheduleError::UnparseableTime {
                    index,
                    value: definition.end_time.clone(),
                }
            })?;
            if end_minute <= start_minute {
                return Err(ScheduleError::EmptyWindow {
                    index,
                    start: format_minute(start_minute),
                    end: format_minute(end_minute),
                });
            }
            slots.push(AdministrationTimeSlot {
                index,
                start_minute,
                end_minute,
                period_label: definition.period_label.clone(),
            });
        }

        if slots[0].start_minute != 0 {
            return Err(ScheduleError::DoesNotStartAtMidnight(slots[0].start_label()));
        }
        for index in 1..slots.len() {
            if slots[index].start_minute != slots[index - 1].end_minute {
                return Err(ScheduleError::GapOrOverlap {
                    index,
                    start: slots[index].start_label(),
                    previous_end: slots[index - 1].end_label(),
                });
            }
        }
        let last = &slots[slots.len() - 1];
        if last.end_minute != MINUTES_PER_DAY {
            return Err(ScheduleError::DoesNotEndAtMidnight(last.end_label()));
        }

        Ok(Self { slots })
    }

    /// The canonical twelve two-hour windows.
    pub fn default_table() -> &'static SlotTable {
        static DEFAULT: Lazy<SlotTable> = Lazy::new(|| {
            SlotTable::new(&default_definitions())
                .expect("built-in administration windows partition the day")
        });
        &DEFAULT
    }

    pub fn slots(&self) -> &[AdministrationTimeSlot] {
        &self.slots
    }

    /// The window containing `time`. `None` never happens for a validated
    /// table; it is kept in the signature so a mismatch stays observable
    /// instead of being silently reassigned.
    pub fn find_slot(&self, time: NaiveTime) -> Option<&AdministrationTimeSlot> {
        let minute = minute_of_day(time);
        let last = self.slots.len() - 1;
        self.slots
            .iter()
            .find(|slot| slot.contains_minute(minute, slot.index == last))
    }

    /// True only when `now` falls inside `slot` and `selected_date` is the
    /// same calendar day as `now`. Viewing a past or future date never
    /// highlights a current window.
    pub fn is_current_slot(
        &self,
        slot: &AdministrationTimeSlot,
        now: NaiveDateTime,
        selected_date: NaiveDate,
    ) -> bool {
        if selected_date != now.date() {
            return false;
        }
        let last = self.slots.len() - 1;
        slot.contains_minute(minute_of_day(now.time()), slot.index == last)
    }

    /// Places each record into the window containing its due time. When two
    /// records land in the same window the later one in input order keeps
    /// the cell and the earlier one is reported as displaced; records that
    /// match no window are reported rather than dropped.
    pub fn map_to_windows(&self, records: &[AdministrationRecord]) -> MarRow {
        let mut row = MarRow::default();
        for record in records {
            match self.find_slot(record.due_at.time()) {
                Some(slot) => {
                    if let Some(previous) = row.windows[slot.index].replace(record.clone()) {
                        warn!(
                            window = slot.index,
                            displaced = %previous.id,
                            kept = %record.id,
                            "two administration records in one window"
                        );
                        row.displaced.push(previous);
                    }
                }
                None => {
                    warn!(record = %record.id, due_at = %record.due_at, "administration record matches no window");
                    row.unmatched.push(record.clone());
                }
            }
        }
        row
    }
}

/// One prescription's row of the MAR grid, plus everything that could not
/// be shown in it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarRow {
    pub windows: [Option<AdministrationRecord>; SLOT_COUNT],
    /// Records overwritten by a later record in the same window.
    pub displaced: Vec<AdministrationRecord>,
    /// Records whose due time matched no configured window.
    pub unmatched: Vec<AdministrationRecord>,
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn format_minute(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Parses `"HH:MM"` into minutes from midnight. The `"24:00"` sentinel is
/// accepted only where `allow_midnight_end` is set.
fn parse_minute(value: &str, allow_midnight_end: bool) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    let total = hours * 60 + minutes;
    let limit = if allow_midnight_end {
        MINUTES_PER_DAY
    } else {
        MINUTES_PER_DAY - 1
    };
    if total > limit {
        return None;
    }
    Some(total)
}

fn default_definitions() -> Vec<SlotDefinition> {
    vec![
        SlotDefinition::new("00:00", "02:00", "Night"),
        SlotDefinition::new("02:00", "04:00", "Night"),
        SlotDefinition::new("04:00", "06:00", "Early morning"),
        SlotDefinition::new("06:00", "08:00", "Morning"),
        SlotDefinition::new("08:00", "10:00", "Morning"),
        SlotDefinition::new("10:00", "12:00", "Late morning"),
        SlotDefinition::new("12:00", "14:00", "Afternoon"),
        SlotDefinition::new("14:00", "16:00", "Afternoon"),
        SlotDefinition::new("16:00", "18:00", "Late afternoon"),
        SlotDefinition::new("18:00", "20:00", "Evening"),
        SlotDefinition::new("20:00", "22:00", "Evening"),
        SlotDefinition::new("22:00", "24:00", "Night"),
    ]
}
