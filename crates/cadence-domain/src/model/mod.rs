//! The appointment aggregate: a series owning dated occurrences, each owning
//! attendee records. All mutation goes through the aggregate root so the
//! per-person attendee invariants cannot be bypassed.

mod attendee;
mod occurrence;
mod series;
mod set;

pub use attendee::AppointmentAttendee;
pub use occurrence::{
    Appointment, AppointmentEdit, AppointmentKind, CancellationReason, CategoryUpdate,
    LocationUpdate, Tier,
};
pub use series::{AppointmentSeries, NewAppointmentSeries, SeriesCancellation};
pub use set::AppointmentSet;
