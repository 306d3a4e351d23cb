//! B3 trading calendar.
//!
//! Holidays are derived from Easter Sunday (Gauss/Butcher integer congruence)
//! plus the fixed-date national holidays. Black Consciousness Day (Nov 20)
//! is a market holiday from 2024 onwards.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// First year in which Nov 20 closes the exchange.
const BLACK_CONSCIOUSNESS_FROM: i32 = 2024;

/// Fixed-date holidays as (month, day).
const FIXED_HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),
    (4, 21),
    (5, 1),
    (9, 7),
    (10, 12),
    (11, 2),
    (11, 15),
    (12, 25),
];

/// Holidays expressed as day offsets from Easter Sunday:
/// Carnival Monday, Carnival Tuesday, Good Friday, Corpus Christi.
const EASTER_OFFSETS: [i64; 4] = [-48, -47, -2, 60];

/// Easter Sunday of `year` (Gregorian).
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    // month is 3 or 4; None only for years outside chrono's range
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).unwrap_or(NaiveDate::MAX)
}

/// All exchange holidays of `year`, weekends excluded from consideration.
pub fn holidays_for_year(year: i32) -> BTreeSet<NaiveDate> {
    if NaiveDate::from_ymd_opt(year, 1, 1).is_none() {
        return BTreeSet::new();
    }
    let easter = easter_sunday(year);
    let mut holidays: BTreeSet<NaiveDate> = FIXED_HOLIDAYS
        .iter()
        .filter_map(|&(month, day)| NaiveDate::from_ymd_opt(year, month, day))
        .collect();

    // offsets past chrono's range only occur for out-of-range years
    holidays.extend(
        EASTER_OFFSETS
            .iter()
            .filter_map(|&offset| easter.checked_add_signed(Duration::days(offset))),
    );

    if year >= BLACK_CONSCIOUSNESS_FROM {
        holidays.extend(NaiveDate::from_ymd_opt(year, 11, 20));
    }

    holidays
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// True if the exchange is expected to trade on `date`.
pub fn is_business_day(date: NaiveDate) -> bool {
    !is_weekend(date) && !holidays_for_year(date.year()).contains(&date)
}

/// Business days in `[start, end]`, ascending. Empty when `start > end`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> BusinessDays {
    BusinessDays {
        next: Some(start),
        end,
        year_holidays: None,
    }
}

/// Iterator over business days. Cloning restarts from the clone's position.
///
/// The holiday set is computed once per calendar year crossed.
#[derive(Debug, Clone)]
pub struct BusinessDays {
    next: Option<NaiveDate>,
    end: NaiveDate,
    year_holidays: Option<(i32, BTreeSet<NaiveDate>)>,
}

impl BusinessDays {
    fn is_holiday(&mut self, date: NaiveDate) -> bool {
        let year = date.year();
        if self.year_holidays.as_ref().map(|(cached, _)| *cached) != Some(year) {
            self.year_holidays = Some((year, holidays_for_year(year)));
        }
        self.year_holidays
            .as_ref()
            .is_some_and(|(_, set)| set.contains(&date))
    }
}

impl Iterator for BusinessDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            let current = self.next.filter(|d| *d <= self.end)?;
            self.next = current.succ_opt();
            if !is_weekend(current) && !self.is_holiday(current) {
                return Some(current);
            }
        }
    }
}

impl std::iter::FusedIterator for BusinessDays {}
