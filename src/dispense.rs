//! Dispense session state.
//!
//! A dispense session is the transient selection, quantity, and instruction
//! state behind the batch dispense dialog. State moves through a pure
//! reducer: the UI dispatches actions and re-renders from the returned
//! state, nothing here touches ambient context. On submit the whole
//! selection becomes one atomic batch command; there is no per-row write.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::instructions::instruction_text;
use crate::models::{
    DispensableItem, DispenseCommand, DispenseCommandItem, DispenseItem, LabelContext, LabelSpec,
};
use crate::stock::stock_status;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispenseState {
    pub items: Vec<DispenseItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispenseAction {
    Initialize(Vec<DispensableItem>),
    Select {
        prescription_id: String,
        selected: bool,
    },
    SetQuantity {
        prescription_id: String,
        quantity: u32,
    },
    SetInstructions {
        prescription_id: String,
        instructions: String,
    },
}

/// Pure transition over the session state.
pub fn reduce(state: DispenseState, action: DispenseAction) -> DispenseState {
    match action {
        DispenseAction::Initialize(rows) => initialize(rows),
        DispenseAction::Select {
            prescription_id,
            selected,
        } => with_item(state, &prescription_id, |item| {
            item.selected = selected && !item.disabled;
        }),
        DispenseAction::SetQuantity {
            prescription_id,
            quantity,
        } => with_item(state, &prescription_id, |item| {
            item.quantity = quantity;
        }),
        DispenseAction::SetInstructions {
            prescription_id,
            instructions,
        } => with_item(state, &prescription_id, |item| {
            item.instructions = instructions;
        }),
    }
}

/// Builds the opening session state from the dispensable rows. Discharge
/// prescriptions with an exhausted repeat budget start disabled and
/// deselected; everything else starts selected.
pub fn initialize(rows: Vec<DispensableItem>) -> DispenseState {
    let items = rows
        .into_iter()
        .map(|row| {
            let disabled = row.prescription.is_discharge && row.prescription.repeats == 0;
            let instructions = row
                .instructions
                .unwrap_or_else(|| instruction_text(Some(&row.prescription)));
            let mut item = DispenseItem {
                prescription_id: row.prescription.id.clone(),
                medication_name: row.medication_name,
                units: row.prescription.units.clone(),
                prescriber_name: row.prescriber_name,
                remaining_repeats: remaining_repeats(
                    row.prescription.repeats,
                    row.prescription.last_ordered_at,
                ),
                quantity: row.quantity.or(row.prescription.quantity).unwrap_or(1),
                instructions,
                selected: !disabled,
                disabled,
                stock: stock_status(row.stock.as_ref()),
                has_quantity_error: false,
                has_instructions_error: false,
            };
            refresh_errors(&mut item);
            item
        })
        .collect();
    DispenseState { items }
}

/// Repeat count as shown to the dispenser. A prescription that has never
/// been ordered still has its first dispense ahead of it, so the budget
/// reads one higher; after that the stored value is already decremented
/// upstream per dispense event and is displayed as-is.
pub fn remaining_repeats(repeats: u32, last_ordered_at: Option<NaiveDateTime>) -> u32 {
    if last_ordered_at.is_none() {
        repeats + 1
    } else {
        repeats
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DispenseProblem {
    #[error("no dispensing user set")]
    MissingDispenser,
    #[error("no items selected")]
    NothingSelected,
    #[error("quantity missing for prescription {prescription_id}")]
    MissingQuantity { prescription_id: String },
    #[error("instructions missing for prescription {prescription_id}")]
    MissingInstructions { prescription_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispenseValidation {
    pub is_valid: bool,
    pub problems: Vec<DispenseProblem>,
}

/// Checks whether the session can be submitted. Field-level problems are
/// values, not errors: this never panics and never returns `Err`.
pub fn validate(state: &DispenseState, dispensed_by_id: Option<&str>) -> DispenseValidation {
    let mut problems = Vec::new();

    if dispensed_by_id.map_or(true, |id| id.trim().is_empty()) {
        problems.push(DispenseProblem::MissingDispenser);
    }

    let mut any_selected = false;
    for item in state.items.iter().filter(|item| item.selected) {
        any_selected = true;
        if item.has_quantity_error {
            problems.push(DispenseProblem::MissingQuantity {
                prescription_id: item.prescription_id.clone(),
            });
        }
        if item.has_instructions_error {
            problems.push(DispenseProblem::MissingInstructions {
                prescription_id: item.prescription_id.clone(),
            });
        }
    }
    if !any_selected {
        problems.push(DispenseProblem::NothingSelected);
    }

    DispenseValidation {
        is_valid: problems.is_empty(),
        problems,
    }
}

/// One atomic batch command over the selected rows.
pub fn build_command(
    state: &DispenseState,
    dispensed_by_id: &str,
    facility_id: &str,
) -> DispenseCommand {
    DispenseCommand {
        dispensed_by_id: dispensed_by_id.to_string(),
        facility_id: facility_id.to_string(),
        items: state
            .items
            .iter()
            .filter(|item| item.selected)
            .map(|item| DispenseCommandItem {
                prescription_id: item.prescription_id.clone(),
                quantity: item.quantity,
                instructions: item.instructions.clone(),
            })
            .collect(),
    }
}

/// Label specs for the selected rows, one per dispensed item. Pure over the
/// session state plus the caller-supplied display values; called only after
/// the persistence layer confirms the batch.
pub fn build_labels(state: &DispenseState, context: &LabelContext) -> Vec<LabelSpec> {
    state
        .items
        .iter()
        .filter(|item| item.selected)
        .map(|item| LabelSpec {
            id: Uuid::new_v4(),
            patient_name: context.patient_name.clone(),
            facility_name: context.facility_name.clone(),
            request_number: context.request_number.clone(),
            medication_name: item.medication_name.clone(),
            instructions: item.instructions.clone(),
            quantity: item.quantity,
            units: item.units.clone(),
            remaining_repeats: item.remaining_repeats,
            prescriber_name: item.prescriber_name.clone(),
        })
        .collect()
}

fn with_item(
    mut state: DispenseState,
    prescription_id: &str,
    apply: impl FnOnce(&mut DispenseItem),
) -> DispenseState {
    if let Some(item) = state
        .items
        .iter_mut()
        .find(|item| item.prescription_id == prescription_id)
    {
        apply(item);
        refresh_errors(item);
    }
    state
}

/// Error flags follow every transition. A deselected row carries no flags
/// no matter what its fields hold.
fn refresh_errors(item: &mut DispenseItem) {
    item.has_quantity_error = item.selected && item.quantity == 0;
    item.has_instructions_error = item.selected && item.instructions.trim().is_empty();
}
