pub mod access;
pub mod overlap;
pub mod scheduling;
pub mod slots;
