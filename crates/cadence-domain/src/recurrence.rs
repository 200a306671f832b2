//! Occurrence-date calculation for appointment series.
//!
//! Dates are derived from `(start_date, sequence_number, frequency)` alone,
//! so a schedule can be re-expanded at any time without stored state.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// How often a series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Monday to Friday only.
    Weekday,
    Daily,
    Weekly,
    Fortnightly,
    Monthly,
}

impl Frequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekday => "weekday",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Fortnightly => "fortnightly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence rule: a frequency and the total number of occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: Frequency,
    pub count: u32,
}

impl Schedule {
    #[must_use]
    pub const fn new(frequency: Frequency, count: u32) -> Self {
        Self { frequency, count }
    }

    /// A series without a recurrence rule has exactly one occurrence.
    #[must_use]
    pub const fn one_off() -> Self {
        Self {
            frequency: Frequency::Daily,
            count: 1,
        }
    }

    /// ## Summary
    /// Lazily yields `(sequence_number, date)` for every occurrence of the
    /// schedule. The iterator is finite and restartable: each call re-derives
    /// the dates from the rule rather than consuming stored state.
    pub fn dates(self, start_date: NaiveDate) -> impl Iterator<Item = (u32, NaiveDate)> {
        (1..=self.count).map(move |sequence_number| {
            (
                sequence_number,
                occurrence_date(start_date, sequence_number, self.frequency),
            )
        })
    }
}

/// ## Summary
/// Returns the date of occurrence `sequence_number` (1-based) of a series
/// starting on `start_date` and repeating with `frequency`.
///
/// Pure and deterministic. A `sequence_number` of zero is treated as one.
#[must_use]
pub fn occurrence_date(
    start_date: NaiveDate,
    sequence_number: u32,
    frequency: Frequency,
) -> NaiveDate {
    let n = u64::from(sequence_number.max(1));
    match frequency {
        Frequency::Daily => start_date + Days::new(n - 1),
        Frequency::Weekly => start_date + Days::new((n - 1) * 7),
        Frequency::Fortnightly => start_date + Days::new((n * 2 - 2) * 7),
        Frequency::Monthly => start_date + Months::new(sequence_number.max(1) - 1),
        Frequency::Weekday => weekday_occurrence_date(start_date, sequence_number.max(1)),
    }
}

/// Weekday (Mon-Fri) occurrences. A weekend `start_date` is returned
/// unchanged for occurrence one; later occurrences anchor to the Friday
/// before it so the Mon-Fri walk stays aligned.
fn weekday_occurrence_date(start_date: NaiveDate, sequence_number: u32) -> NaiveDate {
    let starts_on_weekend = matches!(start_date.weekday(), Weekday::Sat | Weekday::Sun);
    if starts_on_weekend && sequence_number == 1 {
        return start_date;
    }

    let anchor = if starts_on_weekend {
        preceding_friday(start_date)
    } else {
        start_date
    };

    let weeks = u64::from((sequence_number - 1) / 5);
    let remainder = u64::from((sequence_number - 1) % 5);
    // Mon=1 .. Fri=5 for the anchor; remainder past Friday skips the weekend.
    let anchor_weekday = u64::from(anchor.weekday().number_from_monday());
    let day_adjustment = if remainder + anchor_weekday > 5 {
        remainder + 2
    } else {
        remainder
    };

    anchor + Days::new(weeks * 7 + day_adjustment)
}

fn preceding_friday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Days::new(1),
        Weekday::Sun => date - Days::new(2),
        _ => date,
    }
}
