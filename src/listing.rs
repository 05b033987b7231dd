//! Selection and presentation of catalog listings.
//!
//! The list endpoints and the instant availability summary both go through
//! [`select_tours`] and [`select_offers`], so a count shown before searching
//! always equals the number of results the search returns.

use std::cmp::Ordering;

use chrono::NaiveDate;
use chrono_tz::Tz;
use itertools::Itertools;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::availability::{self, DateBounds, DateWindow};
use crate::catalog::{Aviatur, Booking, Destination, OfferStatus, Tour, TourStatus};
use crate::errors::*;
use crate::workdir::WorkDir;

/// Parse a status-like query value. An unrecognised value yields
/// `Some(None)`, which matches nothing.
pub fn parse_status<T: DeserializeOwned>(value: Option<&str>) -> Option<Option<T>> {
    value.map(|v| serde_json::from_value(Value::String(v.to_string())).ok())
}

fn status_matches<T: PartialEq>(filter: &Option<Option<T>>, status: &T) -> bool {
    match filter {
        None => true,
        Some(wanted) => wanted.as_ref() == Some(status),
    }
}

#[derive(Debug, Clone, Default)]
pub struct TourFilter {
    pub status: Option<Option<TourStatus>>,
    pub destination: Option<String>,
    pub featured: Option<bool>,
    pub window: DateWindow,
}

impl TourFilter {
    pub fn active(window: DateWindow) -> Self {
        Self {
            status: Some(Some(TourStatus::Active)),
            window,
            ..Default::default()
        }
    }
}

/// Tours passing the filter, ordered by manual order then start date.
pub fn select_tours<'a, I>(tours: I, filter: &TourFilter, tz: Tz) -> Vec<&'a Tour>
where
    I: IntoIterator<Item = &'a Tour>,
{
    tours
        .into_iter()
        .filter(|t| status_matches(&filter.status, &t.status))
        .filter(|t| {
            filter
                .destination
                .as_ref()
                .map_or(true, |d| t.destination.as_ref() == Some(d))
        })
        .filter(|t| filter.featured.map_or(true, |f| t.featured == f))
        .filter(|t| availability::tour_matches(*t, &filter.window, tz))
        .sorted_by_cached_key(|t| t.listing_key(tz))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    pub status: Option<Option<OfferStatus>>,
    pub window: DateWindow,
}

impl OfferFilter {
    pub fn active(window: DateWindow) -> Self {
        Self {
            status: Some(Some(OfferStatus::Active)),
            window,
        }
    }
}

/// Offers passing the filter, hot ones first, then by start of sale.
pub fn select_offers<'a, I>(offers: I, filter: &OfferFilter, tz: Tz) -> Vec<&'a Aviatur>
where
    I: IntoIterator<Item = &'a Aviatur>,
{
    offers
        .into_iter()
        .filter(|o| status_matches(&filter.status, &o.status))
        .filter(|o| availability::offer_matches(*o, &filter.window, tz))
        .sorted_by_cached_key(|o| {
            let (from, _) = availability::sales_window(*o, tz);
            (!o.hot, from.is_none(), from)
        })
        .collect()
}

/// Tour as returned by the API: destination populated and upcoming
/// departures listed.
pub fn tour_view(work_dir: &WorkDir, tour: &Tour, today: NaiveDate, tz: Tz) -> Result<Value> {
    let mut value = serde_json::to_value(tour)?;
    let destination = tour
        .destination
        .as_ref()
        .and_then(|id| work_dir.destinations.get(id))
        .map(serde_json::to_value)
        .transpose()?
        .unwrap_or(Value::Null);

    if let Value::Object(fields) = &mut value {
        fields.insert("destination".into(), destination);
        fields.insert(
            "upcomingDates".into(),
            serde_json::to_value(tour.upcoming_dates(today, tz))?,
        );
    }
    Ok(value)
}

pub fn booking_view(work_dir: &WorkDir, booking: &Booking) -> Result<Value> {
    let mut value = serde_json::to_value(booking)?;
    let tour = work_dir
        .tours
        .get(&booking.tour)
        .map(serde_json::to_value)
        .transpose()?
        .unwrap_or(Value::Null);
    if let Value::Object(fields) = &mut value {
        fields.insert("tour".into(), tour);
    }
    Ok(value)
}

pub fn destinations_by_popularity(work_dir: &WorkDir) -> Vec<&Destination> {
    work_dir
        .destinations
        .values()
        .sorted_by(|a, b| {
            b.popularity_score
                .partial_cmp(&a.popularity_score)
                .unwrap_or(Ordering::Equal)
        })
        .collect()
}

/// Upcoming dates of an offer: what is left of its sales window from today on.
fn offer_future_dates(offer: &Aviatur, today: NaiveDate, tz: Tz) -> Vec<NaiveDate> {
    let (from, to) = availability::sales_window(offer, tz);
    match (from, to) {
        (_, Some(to)) if to < today => vec![],
        (from, Some(to)) => vec![from.map_or(today, |f| f.max(today)), to],
        (Some(from), None) => vec![from.max(today)],
        (None, None) => vec![],
    }
}

/// Instant pre-search figures for the storefront.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySummary {
    pub tours: usize,
    pub aviatury: usize,
    pub today: NaiveDate,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl AvailabilitySummary {
    pub fn compute(work_dir: &WorkDir, window: DateWindow, today: NaiveDate, tz: Tz) -> Self {
        let tours = select_tours(work_dir.tours.values(), &TourFilter::active(window), tz);
        let offers = select_offers(work_dir.aviatury.values(), &OfferFilter::active(window), tz);

        // Bounds cover every active item, not just the ones inside the window
        let active_tours = select_tours(
            work_dir.tours.values(),
            &TourFilter::active(DateWindow::unbounded()),
            tz,
        );
        let active_offers = select_offers(
            work_dir.aviatury.values(),
            &OfferFilter::active(DateWindow::unbounded()),
            tz,
        );
        let bounds = DateBounds::from_dates(
            active_tours
                .iter()
                .flat_map(|t| t.upcoming_dates(today, tz))
                .chain(
                    active_offers
                        .iter()
                        .flat_map(|o| offer_future_dates(o, today, tz)),
                ),
        );

        Self {
            tours: tours.len(),
            aviatury: offers.len(),
            today,
            min_date: bounds.map(|b| b.min_date),
            max_date: bounds.map(|b| b.max_date),
        }
    }
}

pub fn all_items_entry(value: Value, item_type: &str, views: u64) -> Value {
    let mut value = value;
    if let Value::Object(fields) = &mut value {
        fields.insert("itemType".into(), json!(item_type));
        fields.insert("views".into(), json!(views));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use crate::workdir::testing;
    use chrono_tz::Europe::Kyiv;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn ids<T: crate::collections::GetKey>(items: &[&T]) -> Vec<String> {
        items.iter().map(|i| i.get_key().to_string()).collect()
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status::<TourStatus>(None), None);
        assert_eq!(
            parse_status::<TourStatus>(Some("completed")),
            Some(Some(TourStatus::Completed))
        );
        assert_eq!(parse_status::<TourStatus>(Some("archived")), Some(None));
    }

    #[test]
    fn test_select_tours_filters_and_orders() {
        let mut early = fixtures::tour("early", &[], "2025-05-01");
        early.order = 1;
        let mut late = fixtures::tour("late", &[], "2025-04-01");
        late.order = 2;
        let mut first = fixtures::tour("first", &[], "2025-09-01");
        first.order = 0;
        let mut cancelled = fixtures::tour("cancelled", &[], "2025-05-01");
        cancelled.status = TourStatus::Cancelled;
        let mut undated = fixtures::tour("undated", &[], "soon");
        undated.order = 1;

        let tours = vec![early, late, first, cancelled, undated];
        let all = select_tours(&tours, &TourFilter::default(), Kyiv);
        assert_eq!(
            ids(&all),
            vec!["cancelled", "first", "early", "undated", "late"]
        );

        let active = select_tours(&tours, &TourFilter::active(DateWindow::unbounded()), Kyiv);
        assert_eq!(ids(&active), vec!["first", "early", "undated", "late"]);

        let unknown = TourFilter {
            status: parse_status(Some("archived")),
            ..Default::default()
        };
        assert!(select_tours(&tours, &unknown, Kyiv).is_empty());
    }

    #[test]
    fn test_select_tours_by_destination_and_featured() {
        let mut bali = fixtures::tour("bali", &[], "2025-05-01");
        bali.destination = Some("d1".into());
        bali.featured = true;
        let plain = fixtures::tour("plain", &[], "2025-05-01");
        let tours = vec![bali, plain];

        let by_destination = TourFilter {
            destination: Some("d1".into()),
            ..Default::default()
        };
        assert_eq!(ids(&select_tours(&tours, &by_destination, Kyiv)), vec!["bali"]);

        let not_featured = TourFilter {
            featured: Some(false),
            ..Default::default()
        };
        assert_eq!(ids(&select_tours(&tours, &not_featured, Kyiv)), vec!["plain"]);
    }

    #[test]
    fn test_select_tours_uses_existential_window() {
        let tours = vec![
            fixtures::tour("split", &["2025-05-01", "2025-08-01"], "2025-05-01"),
            fixtures::tour("july", &["2025-07-15"], "2025-07-15"),
            fixtures::tour("single", &[], "2025-07-31"),
        ];
        let july = TourFilter {
            window: DateWindow::new(Some(date(2025, 7, 1)), Some(date(2025, 7, 31))),
            ..Default::default()
        };
        assert_eq!(ids(&select_tours(&tours, &july, Kyiv)), vec!["july", "single"]);
    }

    #[test]
    fn test_select_offers_orders_hot_first() {
        let cold = fixtures::aviatur("cold", "2025-03-01", "2025-03-10");
        let mut hot = fixtures::aviatur("hot", "2025-04-01", "2025-04-10");
        hot.hot = true;
        let earlier = fixtures::aviatur("earlier", "2025-02-01", "2025-02-10");
        let mut inactive = fixtures::aviatur("inactive", "2025-03-01", "2025-03-10");
        inactive.status = OfferStatus::Inactive;
        let offers = vec![cold, hot, earlier, inactive];

        let active = select_offers(&offers, &OfferFilter::active(DateWindow::unbounded()), Kyiv);
        assert_eq!(ids(&active), vec!["hot", "earlier", "cold"]);

        let march = OfferFilter {
            window: DateWindow::new(Some(date(2025, 3, 9)), Some(date(2025, 3, 15))),
            ..Default::default()
        };
        assert_eq!(
            ids(&select_offers(&offers, &march, Kyiv)),
            vec!["cold", "inactive"]
        );
    }

    #[test]
    fn test_offer_future_dates() {
        let today = date(2025, 3, 5);
        let running = fixtures::aviatur("a", "2025-03-01", "2025-03-10");
        assert_eq!(
            offer_future_dates(&running, today, Kyiv),
            vec![date(2025, 3, 5), date(2025, 3, 10)]
        );
        let over = fixtures::aviatur("b", "2025-02-01", "2025-02-10");
        assert!(offer_future_dates(&over, today, Kyiv).is_empty());
    }

    #[test]
    fn test_summary_agrees_with_listing() {
        let (_dir, mut work_dir) = testing::work_dir();
        work_dir
            .insert(fixtures::tour("split", &["2025-05-01", "2025-08-01"], "2025-05-01"))
            .unwrap();
        work_dir
            .insert(fixtures::tour("june", &["2025-06-20"], "2025-06-20"))
            .unwrap();
        let mut cancelled = fixtures::tour("cancelled", &["2025-06-21"], "2025-06-21");
        cancelled.status = TourStatus::Cancelled;
        work_dir.insert(cancelled).unwrap();
        work_dir
            .insert(fixtures::aviatur("charter", "2025-06-01", "2025-06-10"))
            .unwrap();

        let today = date(2025, 6, 1);
        for (from, to) in [
            (None, None),
            (Some(date(2025, 6, 1)), Some(date(2025, 6, 30))),
            (Some(date(2025, 7, 1)), Some(date(2025, 7, 31))),
            (Some(date(2025, 8, 1)), None),
        ] {
            let window = DateWindow::new(from, to);
            let summary = AvailabilitySummary::compute(&work_dir, window, today, Kyiv);
            let listed = select_tours(work_dir.tours.values(), &TourFilter::active(window), Kyiv);
            let offers =
                select_offers(work_dir.aviatury.values(), &OfferFilter::active(window), Kyiv);
            assert_eq!(summary.tours, listed.len());
            assert_eq!(summary.aviatury, offers.len());
        }

        let summary = AvailabilitySummary::compute(&work_dir, DateWindow::unbounded(), today, Kyiv);
        assert_eq!(summary.min_date, Some(date(2025, 6, 1)));
        assert_eq!(summary.max_date, Some(date(2025, 8, 1)));
    }

    #[test]
    fn test_tour_view_populates_destination() {
        let (_dir, mut work_dir) = testing::work_dir();
        work_dir
            .insert(fixtures::destination("d1", "bali"))
            .unwrap();
        let mut tour = fixtures::tour("t1", &["2025-05-01", "2025-08-01"], "2025-05-01");
        tour.destination = Some("d1".into());

        let view = tour_view(&work_dir, &tour, date(2025, 6, 1), Kyiv).unwrap();
        assert_eq!(view["destination"]["slug"], "bali");
        assert_eq!(view["upcomingDates"], json!(["2025-08-01"]));

        tour.destination = Some("missing".into());
        let view = tour_view(&work_dir, &tour, date(2025, 6, 1), Kyiv).unwrap();
        assert!(view["destination"].is_null());
    }
}
