use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{query_window, Admin, ThreadSafeWorkDir};
use crate::availability;
use crate::calendar::LocalCalendar;
use crate::catalog::Tour;
use crate::errors::*;
use crate::listing::{parse_status, select_tours, tour_view, TourFilter};
use crate::serde::empty_as_none;

#[derive(Debug, Deserialize)]
pub struct TourQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    destination: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    featured: Option<String>,
    #[serde(default, alias = "dateFrom", deserialize_with = "empty_as_none")]
    from: Option<String>,
    #[serde(default, alias = "dateTo", deserialize_with = "empty_as_none")]
    to: Option<String>,
}

#[get("/api/tours")]
pub async fn list_tours(
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    query: web::Query<TourQuery>,
) -> Result<HttpResponse> {
    let tz = calendar.tz();
    let today = calendar.today();
    let filter = TourFilter {
        status: parse_status(query.status.as_deref()),
        destination: query.destination.clone(),
        featured: query.featured.as_deref().and_then(|f| f.parse().ok()),
        window: query_window(&calendar, query.from.as_deref(), query.to.as_deref()),
    };

    let work_dir = store.read()?;
    let tours = select_tours(work_dir.tours.values(), &filter, tz)
        .into_iter()
        .map(|tour| tour_view(&work_dir, tour, today, tz))
        .collect::<Result<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(tours))
}

#[get("/api/tours/{id}")]
pub async fn get_tour(
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let work_dir = store.read()?;
    let tour = work_dir.find::<Tour>(&id)?;
    let view = tour_view(&work_dir, tour, calendar.today(), calendar.tz())?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/api/tours")]
pub async fn create_tour(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let tz = calendar.tz();
    let tour: Tour = store.create(body.into_inner(), calendar.now(), |_, tour: &mut Tour| {
        tour.apply_derived_range(tz);
        Ok(())
    })?;
    log::info!("Created tour {} ({})", tour.meta.id, tour.title);

    let work_dir = store.read()?;
    let view = tour_view(&work_dir, &tour, calendar.today(), tz)?;
    Ok(HttpResponse::Created().json(view))
}

#[put("/api/tours/{id}")]
pub async fn update_tour(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let tz = calendar.tz();
    let tour: Tour = store.update(&id, body.into_inner(), calendar.now(), |_, tour: &mut Tour| {
        tour.apply_derived_range(tz);
        Ok(())
    })?;

    let work_dir = store.read()?;
    let view = tour_view(&work_dir, &tour, calendar.today(), tz)?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/api/tours/{id}")]
pub async fn delete_tour(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let tour = store.delete::<Tour>(&id)?;
    log::info!("Deleted tour {} ({})", tour.meta.id, tour.title);
    Ok(HttpResponse::Ok().json(json!({ "message": "Tour deleted" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveRangeRequest {
    #[serde(default)]
    available_dates: Vec<String>,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    duration_days: Option<u32>,
}

/// Preview of the dates a save would store, for the admin form.
#[post("/api/tours/derive-range")]
pub async fn derive_range(
    _admin: Admin,
    calendar: web::Data<LocalCalendar>,
    body: web::Json<DeriveRangeRequest>,
) -> Result<HttpResponse> {
    let days = availability::day_count(body.duration_days, &body.duration);
    let range = availability::derive_range(&body.available_dates, days, calendar.tz())
        .ok_or_else(|| Error::BadRequest("No valid departure dates".into()))?;
    Ok(HttpResponse::Ok().json(range))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    use super::super::testing::{state, ADMIN_AUTH, WRONG_AUTH};
    use crate::catalog::fixtures;
    use crate::workdir::testing;

    fn seeded() -> (tempfile::TempDir, super::super::AppState) {
        let (dir, mut work_dir) = testing::work_dir();
        work_dir
            .insert(fixtures::destination("d1", "bali"))
            .unwrap();
        let mut split = fixtures::tour("split", &["2025-05-01", "2025-08-01"], "2025-05-01");
        split.destination = Some("d1".into());
        work_dir.insert(split).unwrap();
        work_dir
            .insert(fixtures::tour("july", &["2025-07-15"], "2025-07-15"))
            .unwrap();
        let mut cancelled = fixtures::tour("cancelled", &[], "2025-07-20");
        cancelled.status = crate::catalog::TourStatus::Cancelled;
        work_dir.insert(cancelled).unwrap();
        (dir, state(work_dir))
    }

    #[actix_web::test]
    async fn test_list_filters_by_window() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::get()
            .uri("/api/tours?status=active&from=2025-07-01&to=2025-07-31")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["july"]);

        let req = test::TestRequest::get()
            .uri("/api/tours?dateFrom=2025-08-01&dateTo=2025-08-01")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["_id"], "split");
        assert_eq!(body[0]["destination"]["slug"], "bali");
        assert_eq!(body[0]["upcomingDates"], json!(["2025-08-01"]));
    }

    #[actix_web::test]
    async fn test_list_ignores_unparseable_bounds() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::get()
            .uri("/api/tours?status=active&from=someday&to=")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/tours?status=archived")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_get_missing_tour() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::get().uri("/api/tours/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_admin_routes_require_credentials() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::delete().uri("/api/tours/july").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key("www-authenticate"));

        let req = test::TestRequest::delete()
            .uri("/api/tours/july")
            .insert_header(WRONG_AUTH)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(state.store.read().unwrap().tours.contains_key("july"));

        let req = test::TestRequest::delete()
            .uri("/api/tours/july")
            .insert_header(ADMIN_AUTH)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!state.store.read().unwrap().tours.contains_key("july"));
    }

    #[actix_web::test]
    async fn test_create_derives_range() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::post()
            .uri("/api/tours")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({
                "title": "Carpathians",
                "description": "Mountains",
                "shortDescription": "Mountains",
                "price": 300.0,
                "duration": "7 днів / 6 ночей",
                "startDate": "",
                "endDate": "",
                "availableDates": ["2025-06-10", "", "2025-06-05"],
                "availableSpots": 12,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["startDate"], "2025-06-05");
        assert_eq!(body["endDate"], "2025-06-11");
        assert_eq!(body["_id"].as_str().unwrap().len(), 24);
        assert_eq!(state.store.read().unwrap().tours.len(), 4);
    }

    #[actix_web::test]
    async fn test_create_rejects_unparseable_dates() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::post()
            .uri("/api/tours")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({
                "title": "Nowhere",
                "description": "Nowhere",
                "shortDescription": "Nowhere",
                "price": 100.0,
                "duration": "3 дні",
                "startDate": "not a date",
                "endDate": "",
                "availableSpots": 5,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.read().unwrap().tours.len(), 3);

        let req = test::TestRequest::put()
            .uri("/api/tours/july")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({ "availableDates": [], "startDate": "soon" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            state.store.read().unwrap().find::<crate::catalog::Tour>("july").unwrap().start_date,
            "2025-07-15"
        );
    }

    #[actix_web::test]
    async fn test_update_is_partial_and_rederives() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::put()
            .uri("/api/tours/july")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({
                "_id": "renamed",
                "availableDates": ["2025-09-03", "2025-09-01"],
                "durationDays": 3,
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["_id"], "july");
        assert_eq!(body["title"], "Tour july");
        assert_eq!(body["startDate"], "2025-09-01");
        assert_eq!(body["endDate"], "2025-09-03");

        let req = test::TestRequest::put()
            .uri("/api/tours/july")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({ "status": "archived" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_derive_range_endpoint() {
        let (_dir, state) = seeded();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::post()
            .uri("/api/tours/derive-range")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({
                "availableDates": ["2025-01-01"],
                "duration": "Тур без тривалості",
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "startDate": "2025-01-01", "endDate": "2025-01-01" }));

        let req = test::TestRequest::post()
            .uri("/api/tours/derive-range")
            .insert_header(ADMIN_AUTH)
            .set_json(json!({ "availableDates": ["", "later"], "duration": "5 днів" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
