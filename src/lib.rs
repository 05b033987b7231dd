pub mod analytics;
pub mod availability;
pub mod bookings;
pub mod calendar;
pub mod catalog;
pub mod collections;
pub mod errors;
pub mod handlers;
pub mod listing;
pub mod serde;
pub mod thread_safe_work_dir;
pub mod workdir;
