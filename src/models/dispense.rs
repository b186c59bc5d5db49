use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prescription::{PausePrescription, PauseTimeUnit, Prescription};
use crate::stock::StockStatus;

/// Facility stock count for one medication, as reported by the pharmacy
/// query layer. Absent entirely when the facility reports no stock data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub quantity: i64,
}

/// One dispensable row from the query layer: the prescription plus the
/// display fields the dispense dialog and printed labels need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispensableItem {
    pub prescription: Prescription,
    pub medication_name: String,
    pub prescriber_name: Option<String>,
    /// Pre-filled quantity, when the pharmacy order carries one.
    pub quantity: Option<u32>,
    /// Explicit instruction text. Takes precedence over the generated text.
    pub instructions: Option<String>,
    pub stock: Option<StockSnapshot>,
}

/// Per-row state of an open dispense session. Session-scoped and transient:
/// discarded on cancel or after a successful submit, never partially
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispenseItem {
    pub prescription_id: String,
    pub medication_name: String,
    pub units: Option<String>,
    pub prescriber_name: Option<String>,
    pub remaining_repeats: u32,
    pub quantity: u32,
    pub instructions: String,
    pub selected: bool,
    /// Discharge prescriptions with an exhausted repeat budget cannot be
    /// dispensed again and stay deselected.
    pub disabled: bool,
    pub stock: StockStatus,
    pub has_quantity_error: bool,
    pub has_instructions_error: bool,
}

/// The atomic batch command emitted to the persistence layer on submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseCommand {
    pub dispensed_by_id: String,
    pub facility_id: String,
    pub items: Vec<DispenseCommandItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseCommandItem {
    pub prescription_id: String,
    pub quantity: u32,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseCommand {
    pub pause_duration: u32,
    pub pause_time_unit: PauseTimeUnit,
    pub notes: Option<String>,
    pub pause_start_date: NaiveDateTime,
}

impl From<&PausePrescription> for PauseCommand {
    fn from(pause: &PausePrescription) -> Self {
        Self {
            pause_duration: pause.pause_duration,
            pause_time_unit: pause.pause_time_unit,
            notes: pause.notes.clone(),
            pause_start_date: pause.pause_start_date,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeCommand {}

/// Patient and facility display values the caller supplies for label
/// printing. The engine never looks these up itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelContext {
    pub patient_name: String,
    pub facility_name: String,
    pub request_number: String,
}

/// Everything the (out of scope) print layer needs for one label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSpec {
    pub id: Uuid,
    pub patient_name: String,
    pub facility_name: String,
    pub request_number: String,
    pub medication_name: String,
    pub instructions: String,
    pub quantity: u32,
    pub units: Option<String>,
    pub remaining_repeats: u32,
    pub prescriber_name: Option<String>,
}
