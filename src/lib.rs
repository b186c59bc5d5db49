//! Florence medication engine core library
//!
//! State logic behind a ward EHR's medication workflows: MAR window
//! assignment, prescription pause/resume validity, dispense session state,
//! and printed-label instruction text. Rendering, transport, and persistence
//! live in the consuming application; this crate is the library those
//! layers drive.

pub mod board;
pub mod clock;
pub mod dispense;
pub mod instructions;
pub mod models;
pub mod pause;
pub mod schedule;
pub mod stock;
