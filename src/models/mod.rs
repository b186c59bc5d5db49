pub mod dispense;
pub mod prescription;

pub use dispense::*;
pub use prescription::*;
