//! Canonical instruction text for dispense labels.
//!
//! The composed string is what gets printed, so the composition order is
//! fixed: dose and frequency, route, duration, indication, a terminal
//! period, then any prescriber notes verbatim.

use crate::models::Prescription;

/// Builds the instruction line for a prescription. Total and pure: absent
/// fields are skipped and `None` yields the empty string.
pub fn instruction_text(prescription: Option<&Prescription>) -> String {
    let Some(rx) = prescription else {
        return String::new();
    };

    let mut text = String::new();

    if let Some(dose) = dose_display(rx) {
        text.push_str(&dose);
    }
    if let Some(frequency) = present(rx.frequency.as_deref()) {
        push_segment(&mut text, " ", frequency);
    }
    if let Some(route) = present(rx.route.as_deref()) {
        push_segment(&mut text, ", ", &capitalize(route));
    }
    if let (Some(value), Some(unit)) = (rx.duration_value, present(rx.duration_unit.as_deref())) {
        push_segment(&mut text, " ", &format!("for {} {}", value, duration_unit_display(value, unit)));
    }
    if let Some(indication) = present(rx.indication.as_deref()) {
        push_segment(&mut text, ", ", &format!("for {}", indication));
    }
    if !text.is_empty() && !text.ends_with('.') {
        text.push('.');
    }
    if let Some(notes) = rx.notes.as_deref() {
        let notes = notes.trim();
        if !notes.is_empty() {
            push_segment(&mut text, " ", notes);
        }
    }

    text
}

fn dose_display(rx: &Prescription) -> Option<String> {
    let units = present(rx.units.as_deref());
    if rx.is_variable_dose {
        return Some(match units {
            Some(units) => format!("Variable dose ({})", units),
            None => "Variable dose".to_string(),
        });
    }
    let amount = rx.dose_amount?;
    Some(match units {
        Some(units) => format!("{} {}", amount, units),
        None => amount.to_string(),
    })
}

/// Lower-cases the unit and singularizes it only for a duration of one.
fn duration_unit_display(value: u32, unit: &str) -> String {
    let unit = unit.to_lowercase();
    if value == 1 {
        unit.strip_suffix('s').map(str::to_string).unwrap_or(unit)
    } else {
        unit
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Appends `segment`, prefixed by `separator` unless the text is empty.
fn push_segment(text: &mut String, separator: &str, segment: &str) {
    if !text.is_empty() {
        text.push_str(separator);
    }
    text.push_str(segment);
}
