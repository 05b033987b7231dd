use actix_web::{get, web, HttpResponse, Responder};
use maud::{html, Markup};

use super::{date_time_element, AdminAccess, Css, ThreadSafeWorkDir};
use crate::calendar::LocalCalendar;
use crate::errors::*;

pub struct StartTime(pub i64);

const STYLES: &str = "body { font-family: sans-serif; margin: 2rem; } td { padding: 0 1rem; }";

#[get("/info")]
pub async fn info_handler(
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    access: web::Data<AdminAccess>,
    start_time: web::Data<StartTime>,
) -> Result<Markup> {
    let work_dir = store.read()?;
    let tz = calendar.tz();

    Ok(html! {
        (Css(STYLES))
        h1 { (work_dir.config.label) }
        p {
            "Serving "
            code { (work_dir.path.display()) }
            " as "
            code { (work_dir.config.slug) }
            " in " (tz.name())
        }
        table {
            tr { td { "Tours" } td { (work_dir.tours.len()) } }
            tr { td { "Aviatury" } td { (work_dir.aviatury.len()) } }
            tr { td { "Destinations" } td { (work_dir.destinations.len()) } }
            tr { td { "Bookings" } td { (work_dir.bookings.len()) } }
        }
        p {
            "Catalog loaded on "
            (date_time_element(i64::try_from(work_dir.loaded_at).ok(), tz))
        }
        p {
            "The server was started on "
            (date_time_element(Some(start_time.0), tz))
        }
        p {
            "Today is " (calendar.today().format("%Y-%m-%d"))
        }
        @if access.0.is_none() {
            p { strong { "No admin credentials configured; admin routes are locked." } }
        }
    })
}

#[get("/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}
