//! Pure domain model for recurring appointment series: recurrence-date
//! calculation, the series/occurrence/attendee aggregate, and mutation-scope
//! resolution. No I/O; everything here is synchronous and deterministic.

pub mod error;
pub mod model;
pub mod recurrence;
pub mod scope;
