use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::availability::{self, Departures, DerivedRange, SalesPeriod};
use crate::collections::{Collection, GetKey};
use crate::errors::*;
use crate::workdir::WorkDir;

/// A JSON document stored in one collection file of the work directory.
pub trait Document: GetKey + Clone + Serialize + DeserializeOwned {
    /// File name inside the work directory.
    const FILE_NAME: &'static str;
    /// Human name used in error messages.
    const LABEL: &'static str;

    fn collection(work_dir: &WorkDir) -> &Collection<Self>;
    fn collection_mut(work_dir: &mut WorkDir) -> &mut Collection<Self>;

    fn set_id(&mut self, id: String);
    fn stamp(&mut self, now: DateTime<Utc>);

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn not_found() -> Error {
        Error::NotFound(format!("{} not found", Self::LABEL))
    }
}

/// Fields every document carries besides its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Meta {
    fn stamp(&mut self, now: DateTime<Utc>) {
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }
}

macro_rules! document {
    ($ty:ty, $file:expr, $label:expr, $field:ident) => {
        impl GetKey for $ty {
            fn get_key(&self) -> &str {
                &self.meta.id
            }
        }

        impl Document for $ty {
            const FILE_NAME: &'static str = $file;
            const LABEL: &'static str = $label;

            fn collection(work_dir: &WorkDir) -> &Collection<Self> {
                &work_dir.$field
            }

            fn collection_mut(work_dir: &mut WorkDir) -> &mut Collection<Self> {
                &mut work_dir.$field
            }

            fn set_id(&mut self, id: String) {
                self.meta.id = id;
            }

            fn stamp(&mut self, now: DateTime<Utc>) {
                self.meta.stamp(now);
            }

            fn validate(&self) -> Result<()> {
                <$ty>::check(self)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TourStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TourType {
    #[default]
    Exclusive,
    Package,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub day: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

fn default_max_participants() -> u32 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    #[serde(flatten)]
    pub meta: Meta,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    pub title: String,
    #[serde(default)]
    pub fancy_title: Option<String>,
    pub description: String,
    pub short_description: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    /// Display label such as "7 днів / 6 ночей".
    pub duration: String,
    /// Explicit day-count; takes precedence over the number in `duration`.
    #[serde(default)]
    pub duration_days: Option<u32>,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub available_dates: Vec<String>,
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
    pub available_spots: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub not_included: Vec<String>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub status: TourStatus,
    #[serde(default)]
    pub tour_type: TourType,
    #[serde(default)]
    pub contact_telegram: String,
    #[serde(default)]
    pub contact_instagram: String,
    #[serde(default)]
    pub order: i64,
}

document!(Tour, "tours.json", "Tour", tours);

impl Departures for Tour {
    fn available_dates(&self) -> &[String] {
        &self.available_dates
    }

    fn start_date(&self) -> &str {
        &self.start_date
    }
}

impl Tour {
    fn check(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest("Tour title is required".into()));
        }
        if self.price < 0.0 {
            return Err(Error::BadRequest("Tour price must not be negative".into()));
        }
        // Whether a date parses does not depend on the zone
        for (field, value) in [("startDate", &self.start_date), ("endDate", &self.end_date)] {
            if crate::calendar::parse_calendar_date(value, chrono_tz::UTC).is_none() {
                return Err(Error::BadRequest(format!(
                    "Tour {} must be a valid date, got {:?}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    pub fn day_count(&self) -> u32 {
        availability::day_count(self.duration_days, &self.duration)
    }

    /// Overwrite `startDate`/`endDate` from `availableDates` and the duration.
    /// Leaves them untouched when no departure parses.
    pub fn apply_derived_range(&mut self, tz: Tz) -> Option<DerivedRange> {
        let range = availability::derive_range(&self.available_dates, self.day_count(), tz)?;
        self.start_date = range.start_date.format("%Y-%m-%d").to_string();
        self.end_date = range.end_date.format("%Y-%m-%d").to_string();
        Some(range)
    }

    pub fn upcoming_dates(&self, today: NaiveDate, tz: Tz) -> Vec<NaiveDate> {
        availability::future_dates(&availability::effective_dates(self, tz), today)
    }

    /// Sort key for listings: manual order, then first departure. Tours whose
    /// start date does not parse go last within their order bucket.
    pub fn listing_key(&self, tz: Tz) -> (i64, bool, Option<NaiveDate>) {
        let start = crate::calendar::parse_calendar_date(&self.start_date, tz);
        (self.order, start.is_none(), start)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Active,
    Inactive,
}

fn default_flag() -> String {
    "🌍".to_string()
}

fn default_nights() -> u32 {
    6
}

pub const MAX_OFFER_DESCRIPTION: usize = 500;

/// A package offer sold during one contiguous window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aviatur {
    #[serde(flatten)]
    pub meta: Meta,
    pub name: String,
    pub country: String,
    #[serde(default = "default_flag")]
    pub flag: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub hot: bool,
    #[serde(default)]
    pub duration: String,
    #[serde(default = "default_nights")]
    pub nights: u32,
    pub image: String,
    #[serde(default)]
    pub available_from: Option<String>,
    #[serde(default)]
    pub available_to: Option<String>,
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub not_included: Vec<String>,
    #[serde(default)]
    pub is_resort: bool,
    #[serde(default)]
    pub status: OfferStatus,
}

document!(Aviatur, "aviatury.json", "Aviatur", aviatury);

impl SalesPeriod for Aviatur {
    fn available_from(&self) -> Option<&str> {
        self.available_from.as_deref()
    }

    fn available_to(&self) -> Option<&str> {
        self.available_to.as_deref()
    }
}

impl Aviatur {
    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest("Aviatur name is required".into()));
        }
        if self.description.chars().count() > MAX_OFFER_DESCRIPTION {
            return Err(Error::BadRequest(format!(
                "Aviatur description must be at most {} characters",
                MAX_OFFER_DESCRIPTION
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Continent {
    Europe,
    Asia,
    Africa,
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "South America")]
    SouthAmerica,
    Oceania,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    #[serde(flatten)]
    pub meta: Meta,
    pub name: String,
    pub name_uk: String,
    pub country: String,
    pub flag: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub image: String,
    #[serde(default)]
    pub gallery: Vec<String>,
    pub continent: Continent,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub popularity_score: f64,
}

document!(Destination, "destinations.json", "Destination", destinations);

impl Destination {
    fn check(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(Error::BadRequest("Destination slug is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(flatten)]
    pub meta: Meta,
    pub tour: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub number_of_people: u32,
    pub total_price: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub status: BookingStatus,
}

document!(Booking, "bookings.json", "Booking", bookings);

impl Booking {
    fn check(&self) -> Result<()> {
        if self.number_of_people == 0 {
            return Err(Error::BadRequest(
                "Number of people must be at least 1".into(),
            ));
        }
        if self.customer_name.trim().is_empty() {
            return Err(Error::BadRequest("Customer name is required".into()));
        }
        Ok(())
    }
}

/// Apply a partial update the way a document store's `$set` would: keys in
/// `patch` replace stored keys, everything else is kept. `_id` and
/// `createdAt` cannot be changed. The result is not validated, since derived
/// fields may still have to be filled in.
pub fn merge_patch<T: Document>(existing: &T, patch: Value) -> Result<T> {
    let Value::Object(patch) = patch else {
        return Err(Error::BadRequest("Update body must be a JSON object".into()));
    };

    let mut merged = serde_json::to_value(existing)?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in patch {
            if key == "_id" || key == "createdAt" {
                continue;
            }
            fields.insert(key, value);
        }
    }

    let updated: T = serde_json::from_value(merged)
        .map_err(|e| Error::BadRequest(format!("Invalid {}: {}", T::LABEL, e)))?;
    Ok(updated)
}

/// Generate a 24 character hex id.
pub fn new_id() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
