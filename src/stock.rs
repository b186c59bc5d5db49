//! Facility stock indicator.

use serde::{Deserialize, Serialize};

use crate::models::StockSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockStatus {
    Yes,
    No,
    Unknown,
}

/// Tri-state stock indicator for a medication at the facility. A missing
/// snapshot means the facility reports nothing, not that the shelf is
/// empty. Negative counts are upstream bookkeeping errors; from the
/// dispenser's chair the shelf is empty either way, so they read as `No`.
pub fn stock_status(snapshot: Option<&StockSnapshot>) -> StockStatus {
    match snapshot {
        None => StockStatus::Unknown,
        Some(snapshot) if snapshot.quantity <= 0 => StockStatus::No,
        Some(_) => StockStatus::Yes,
    }
}
