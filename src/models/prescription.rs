use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A prescription as the query layer hands it to us. Created and owned
/// externally; this engine only derives state from it and emits commands
/// that mutate it upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub frequency: Option<String>,
    pub route: Option<String>,
    pub dose_amount: Option<f64>,
    pub units: Option<String>,
    pub is_variable_dose: bool,
    pub duration_value: Option<u32>,
    pub duration_unit: Option<String>,
    pub indication: Option<String>,
    pub notes: Option<String>,
    pub is_prn: bool,
    pub is_ongoing: bool,
    /// Discharge/outpatient prescriptions carry a bounded repeat count.
    pub is_discharge: bool,
    pub discontinued: bool,
    pub end_date: Option<NaiveDateTime>,
    /// Additional dispense events permitted beyond the first. The
    /// per-dispense decrement is owned by the persistence layer.
    pub repeats: u32,
    pub quantity: Option<u32>,
    pub last_ordered_at: Option<NaiveDateTime>,
}

/// The active pause on a prescription. At most one exists per prescription
/// at any time; resume clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausePrescription {
    pub pause_start_date: NaiveDateTime,
    pub pause_duration: u32,
    pub pause_time_unit: PauseTimeUnit,
    pub pause_end_date: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseTimeUnit {
    Hours,
    Days,
    Weeks,
}

/// One scheduled administration event on the MAR. Read-only input,
/// re-derived daily by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrationRecord {
    pub id: String,
    pub prescription_id: String,
    pub due_at: NaiveDateTime,
    pub status: String, // e.g., "Due", "Given", "Not Given", "Missed"
}
