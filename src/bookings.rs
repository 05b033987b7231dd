use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::calendar::parse_calendar_date;
use crate::catalog::{new_id, Booking, BookingStatus, Document, Meta, Tour};
use crate::errors::*;
use crate::workdir::WorkDir;

/// Public booking form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub tour: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub number_of_people: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub departure_date: Option<String>,
}

/// Check the request against the tour, take the seats and store the booking.
/// Both the tour and the booking are written while the caller holds the
/// write lock, so two requests cannot oversell the same spots. The booking is
/// written first and withdrawn again if the tour cannot be saved, so a failed
/// write never takes seats without a booking to show for them.
pub fn place_booking(
    work_dir: &mut WorkDir,
    request: BookingRequest,
    today: NaiveDate,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Booking> {
    let mut tour = work_dir.find::<Tour>(&request.tour)?.clone();

    if request.number_of_people == 0 {
        return Err(Error::BadRequest(
            "Number of people must be at least 1".into(),
        ));
    }
    if tour.available_spots < request.number_of_people {
        return Err(Error::BadRequest("Not enough available spots".into()));
    }

    let departure_date = match request
        .departure_date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        None => None,
        Some(raw) => {
            let date = parse_calendar_date(raw, tz)
                .ok_or_else(|| Error::BadRequest(format!("Invalid departure date {}", raw)))?;
            if !tour.upcoming_dates(today, tz).contains(&date) {
                return Err(Error::BadRequest(format!(
                    "No departure on {} for this tour",
                    date
                )));
            }
            Some(date.format("%Y-%m-%d").to_string())
        }
    };

    let mut booking = Booking {
        meta: Meta::default(),
        tour: tour.meta.id.clone(),
        customer_name: request.customer_name,
        customer_email: request.customer_email,
        customer_phone: request.customer_phone,
        number_of_people: request.number_of_people,
        total_price: tour.price * f64::from(request.number_of_people),
        notes: request.notes,
        departure_date,
        status: BookingStatus::Pending,
    };
    booking.set_id(new_id());
    booking.stamp(now);
    booking.validate()?;

    tour.available_spots -= request.number_of_people;
    tour.stamp(now);
    work_dir.insert(booking.clone())?;
    if let Err(e) = work_dir.insert(tour) {
        if let Err(undo) = work_dir.remove::<Booking>(&booking.meta.id) {
            log::error!("Unable to withdraw booking {}: {}", booking.meta.id, undo);
        }
        return Err(e);
    }

    log::info!(
        "Booking {} for tour {} ({} people)",
        booking.meta.id,
        booking.tour,
        booking.number_of_people
    );
    Ok(booking)
}

/// Bookings newest first.
pub fn newest_first(work_dir: &WorkDir) -> Vec<&Booking> {
    let mut bookings: Vec<&Booking> = work_dir.bookings.values().collect();
    bookings.sort_by(|a, b| b.meta.created_at.cmp(&a.meta.created_at));
    bookings
}
