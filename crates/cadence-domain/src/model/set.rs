use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::series::AppointmentSeries;

/// A batch of independently-scheduled one-off series created in a single
/// user action. The set has no recurrence of its own; it exists so the
/// batch can be treated as one created, auditable unit.
#[derive(Debug, Clone)]
pub struct AppointmentSet {
    pub id: Uuid,
    pub facility_code: String,
    pub category_code: String,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
    pub created_by: String,
    series: Vec<AppointmentSeries>,
}

impl AppointmentSet {
    #[must_use]
    pub fn new(
        facility_code: impl Into<String>,
        category_code: impl Into<String>,
        date: NaiveDate,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            facility_code: facility_code.into(),
            category_code: category_code.into(),
            date,
            created_at: now,
            created_by: by.into(),
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: AppointmentSeries) {
        self.series.push(series);
    }

    #[must_use]
    pub fn series(&self) -> &[AppointmentSeries] {
        &self.series
    }
}
