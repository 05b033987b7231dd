use actix_web::{get, post, put, web, HttpResponse};
use serde_json::Value;

use super::{Admin, ThreadSafeWorkDir};
use crate::bookings::{newest_first, place_booking, BookingRequest};
use crate::calendar::LocalCalendar;
use crate::catalog::Booking;
use crate::errors::*;
use crate::listing::booking_view;

#[get("/api/bookings")]
pub async fn list_bookings(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
) -> Result<HttpResponse> {
    let work_dir = store.read()?;
    let bookings = newest_first(&work_dir)
        .into_iter()
        .map(|booking| booking_view(&work_dir, booking))
        .collect::<Result<Vec<_>>>()?;
    Ok(HttpResponse::Ok().json(bookings))
}

#[post("/api/bookings")]
pub async fn create_booking(
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    body: web::Json<BookingRequest>,
) -> Result<HttpResponse> {
    let mut work_dir = store.write()?;
    let booking = place_booking(
        &mut work_dir,
        body.into_inner(),
        calendar.today(),
        calendar.now(),
        calendar.tz(),
    )?;
    Ok(HttpResponse::Created().json(booking_view(&work_dir, &booking)?))
}

#[put("/api/bookings/{id}")]
pub async fn update_booking(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let booking: Booking = store.update(&id, body.into_inner(), calendar.now(), |_, _| Ok(()))?;
    let work_dir = store.read()?;
    Ok(HttpResponse::Ok().json(booking_view(&work_dir, &booking)?))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    use super::super::testing::{state, ADMIN_AUTH};
    use crate::catalog::{fixtures, Tour};
    use crate::workdir::testing;

    fn booking(people: u32) -> serde_json::Value {
        json!({
            "tour": "t1",
            "customerName": "Olena",
            "customerEmail": "olena@example.com",
            "customerPhone": "+380000000000",
            "numberOfPeople": people,
            "departureDate": "2025-08-01",
        })
    }

    fn seeded() -> (tempfile::TempDir, super::super::AppState) {
        let (dir, mut work_dir) = testing::work_dir();
        work_dir
            .insert(fixtures::tour("t1", &["2025-05-01", "2025-08-01"], "2025-05-01"))
            .unwrap();
        (dir, state(work_dir))
    }

    #[actix_web::test]
    async fn test_booking_flow() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::post()
            .uri("/api/bookings")
            .set_json(booking(4))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(created["totalPrice"], 4000.0);
        assert_eq!(created["tour"]["_id"], "t1");
        assert_eq!(created["tour"]["availableSpots"], 6);

        let req = test::TestRequest::post()
            .uri("/api/bookings")
            .set_json(booking(7))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            state.store.read().unwrap().find::<Tour>("t1").unwrap().available_spots,
            6
        );

        let id = created["_id"].as_str().unwrap();
        let req = test::TestRequest::put()
            .uri(&format!("/api/bookings/{}", id))
            .insert_header(ADMIN_AUTH)
            .set_json(json!({ "status": "confirmed", "createdAt": "2001-01-01T00:00:00Z" }))
            .to_request();
        let updated: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["status"], "confirmed");
        assert_eq!(updated["createdAt"], created["createdAt"]);

        let req = test::TestRequest::get()
            .uri("/api/bookings")
            .insert_header(ADMIN_AUTH)
            .to_request();
        let listed: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_booking_unknown_tour() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let mut body = booking(1);
        body["tour"] = json!("missing");
        let req = test::TestRequest::post()
            .uri("/api/bookings")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_listing_bookings_requires_admin() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::get().uri("/api/bookings").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
