use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

use super::{query_window, ThreadSafeWorkDir};
use crate::calendar::LocalCalendar;
use crate::errors::*;
use crate::listing::AvailabilitySummary;
use crate::serde::empty_as_none;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default, alias = "dateFrom", deserialize_with = "empty_as_none")]
    from: Option<String>,
    #[serde(default, alias = "dateTo", deserialize_with = "empty_as_none")]
    to: Option<String>,
}

/// Counts and date-picker bounds shown before a search is run.
#[get("/api/catalog/availability")]
pub async fn availability_summary(
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    query: web::Query<WindowQuery>,
) -> Result<HttpResponse> {
    let window = query_window(&calendar, query.from.as_deref(), query.to.as_deref());
    let work_dir = store.read()?;
    let summary = AvailabilitySummary::compute(&work_dir, window, calendar.today(), calendar.tz());
    Ok(HttpResponse::Ok().json(summary))
}
