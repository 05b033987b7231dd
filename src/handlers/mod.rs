use actix_web::web;
use maud::{html, Markup};

mod analytics;
mod availability;
mod aviatury;
mod bookings;
mod common;
mod destinations;
mod info;
mod tours;

pub use common::*;
pub use info::StartTime;

use crate::analytics::AnalyticsStore;
use crate::calendar::LocalCalendar;

// Shared components
pub struct Css(pub &'static str);

impl maud::Render for Css {
    fn render(&self) -> Markup {
        html! {
            style { (self.0) }
        }
    }
}

// Common types used across handlers
pub type ThreadSafeWorkDir = crate::thread_safe_work_dir::ThreadSafeWorkDir;

/// Everything the handlers pull out of app data.
#[derive(Clone)]
pub struct AppState {
    pub store: web::Data<ThreadSafeWorkDir>,
    pub calendar: web::Data<LocalCalendar>,
    pub analytics: web::Data<AnalyticsStore>,
    pub access: web::Data<AdminAccess>,
    pub start_time: web::Data<StartTime>,
}

impl AppState {
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.store.clone())
            .app_data(self.calendar.clone())
            .app_data(self.analytics.clone())
            .app_data(self.access.clone())
            .app_data(self.start_time.clone())
            .service(info::info_handler)
            .service(info::healthz)
            .service(availability::availability_summary)
            // derive-range before the `{id}` routes
            .service(tours::derive_range)
            .service(tours::list_tours)
            .service(tours::get_tour)
            .service(tours::create_tour)
            .service(tours::update_tour)
            .service(tours::delete_tour)
            .service(aviatury::list_aviatury)
            .service(aviatury::get_aviatur)
            .service(aviatury::create_aviatur)
            .service(aviatury::update_aviatur)
            .service(aviatury::delete_aviatur)
            .service(destinations::list_destinations)
            .service(destinations::get_destination)
            .service(destinations::create_destination)
            .service(destinations::update_destination)
            .service(destinations::delete_destination)
            .service(bookings::list_bookings)
            .service(bookings::create_booking)
            .service(bookings::update_booking)
            .service(analytics::record_view)
            .service(analytics::view_stats)
            .service(analytics::all_items);
    }
}
