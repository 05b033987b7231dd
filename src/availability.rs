//! Departure-date rules shared by every listing of the catalog.
//!
//! Tours carry a set of alternative departures and match a search window when
//! *any* departure falls inside it. Package offers carry a single sales window
//! and match when that window overlaps the search. The two rules are not
//! interchangeable.

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;

use crate::calendar::parse_calendar_date;

/// Something with a list of alternative departures and a fallback start date.
pub trait Departures {
    fn available_dates(&self) -> &[String];
    fn start_date(&self) -> &str;
}

/// Something sold during one contiguous window.
pub trait SalesPeriod {
    fn available_from(&self) -> Option<&str>;
    fn available_to(&self) -> Option<&str>;
}

/// Resolve the bookable departures of an item, ascending and de-duplicated.
///
/// The explicit list wins as soon as it holds a non-blank entry; entries that
/// fail to parse are dropped. Otherwise the start date is the only departure.
pub fn effective_dates<T: Departures + ?Sized>(item: &T, tz: Tz) -> Vec<NaiveDate> {
    let listed = item.available_dates();
    let dates: Vec<NaiveDate> = if listed.iter().any(|d| !d.trim().is_empty()) {
        listed
            .iter()
            .filter_map(|d| parse_calendar_date(d, tz))
            .collect()
    } else {
        parse_calendar_date(item.start_date(), tz).into_iter().collect()
    };

    dates.into_iter().sorted().dedup().collect()
}

/// Departures on or after `today`.
pub fn future_dates(dates: &[NaiveDate], today: NaiveDate) -> Vec<NaiveDate> {
    dates.iter().copied().filter(|d| *d >= today).collect()
}

/// An inclusive search window; a missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// Existential match: at least one departure lies inside the window.
    pub fn matches_any_departure(&self, departures: &[NaiveDate]) -> bool {
        departures.iter().any(|d| self.contains(*d))
    }

    /// Interval overlap between the window and a sales period. A missing
    /// period bound is open on that side.
    pub fn overlaps_sales_window(
        &self,
        available_from: Option<NaiveDate>,
        available_to: Option<NaiveDate>,
    ) -> bool {
        let starts_in_time = match (available_from, self.to) {
            (Some(start), Some(to)) => start <= to,
            _ => true,
        };
        let ends_in_time = match (available_to, self.from) {
            (Some(end), Some(from)) => end >= from,
            _ => true,
        };
        starts_in_time && ends_in_time
    }
}

pub fn tour_matches<T: Departures + ?Sized>(item: &T, window: &DateWindow, tz: Tz) -> bool {
    if window.is_unbounded() {
        return true;
    }
    window.matches_any_departure(&effective_dates(item, tz))
}

pub fn sales_window<T: SalesPeriod + ?Sized>(
    item: &T,
    tz: Tz,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    (
        item.available_from().and_then(|d| parse_calendar_date(d, tz)),
        item.available_to().and_then(|d| parse_calendar_date(d, tz)),
    )
}

pub fn offer_matches<T: SalesPeriod + ?Sized>(item: &T, window: &DateWindow, tz: Tz) -> bool {
    let (from, to) = sales_window(item, tz);
    window.overlaps_sales_window(from, to)
}

/// Earliest and latest upcoming date across the whole catalog, used to
/// constrain date pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateBounds {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

impl DateBounds {
    pub fn from_dates<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Option<Self> {
        match dates.into_iter().minmax() {
            itertools::MinMaxResult::NoElements => None,
            itertools::MinMaxResult::OneElement(d) => Some(Self {
                min_date: d,
                max_date: d,
            }),
            itertools::MinMaxResult::MinMax(min_date, max_date) => {
                Some(Self { min_date, max_date })
            }
        }
    }
}

/// Start and end of a tour derived from its departures and duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Number of days a tour lasts.
///
/// An explicit count wins. Otherwise the first run of digits in the label is
/// used ("7 днів / 6 ночей" is 7, "3-7 днів" is 3). A label without digits,
/// or a count of zero, means a one-day tour.
pub fn day_count(explicit: Option<u32>, label: &str) -> u32 {
    let count = explicit.or_else(|| {
        let re = Regex::new(r"[0-9]+").ok()?;
        re.find(label)?.as_str().parse::<u32>().ok()
    });
    count.unwrap_or(1).max(1)
}

/// Derive `startDate`/`endDate` from candidate departures.
///
/// Blank and unparseable candidates are ignored; with nothing left there is
/// nothing to derive.
pub fn derive_range<S: AsRef<str>>(dates: &[S], days: u32, tz: Tz) -> Option<DerivedRange> {
    let start_date = dates
        .iter()
        .filter_map(|d| parse_calendar_date(d.as_ref(), tz))
        .min()?;
    let end_date = start_date
        .checked_add_days(Days::new(u64::from(days.max(1)) - 1))
        .unwrap_or(NaiveDate::MAX);

    Some(DerivedRange {
        start_date,
        end_date,
    })
}
