use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{query_window, Admin, ThreadSafeWorkDir};
use crate::calendar::LocalCalendar;
use crate::catalog::Aviatur;
use crate::errors::*;
use crate::listing::{parse_status, select_offers, OfferFilter};
use crate::serde::empty_as_none;

#[derive(Debug, Deserialize)]
pub struct AviaturQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    status: Option<String>,
    #[serde(default, alias = "dateFrom", deserialize_with = "empty_as_none")]
    from: Option<String>,
    #[serde(default, alias = "dateTo", deserialize_with = "empty_as_none")]
    to: Option<String>,
}

#[get("/api/aviatury")]
pub async fn list_aviatury(
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    query: web::Query<AviaturQuery>,
) -> Result<HttpResponse> {
    let filter = OfferFilter {
        status: parse_status(query.status.as_deref()),
        window: query_window(&calendar, query.from.as_deref(), query.to.as_deref()),
    };
    let work_dir = store.read()?;
    let offers = select_offers(work_dir.aviatury.values(), &filter, calendar.tz());
    Ok(HttpResponse::Ok().json(offers))
}

#[get("/api/aviatury/{id}")]
pub async fn get_aviatur(
    store: web::Data<ThreadSafeWorkDir>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let work_dir = store.read()?;
    Ok(HttpResponse::Ok().json(work_dir.find::<Aviatur>(&id)?))
}

#[post("/api/aviatury")]
pub async fn create_aviatur(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let offer: Aviatur = store.create(body.into_inner(), calendar.now(), |_, _| Ok(()))?;
    log::info!("Created aviatur {} ({})", offer.meta.id, offer.name);
    Ok(HttpResponse::Created().json(offer))
}

#[put("/api/aviatury/{id}")]
pub async fn update_aviatur(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let offer: Aviatur = store.update(&id, body.into_inner(), calendar.now(), |_, _| Ok(()))?;
    Ok(HttpResponse::Ok().json(offer))
}

#[delete("/api/aviatury/{id}")]
pub async fn delete_aviatur(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let offer = store.delete::<Aviatur>(&id)?;
    log::info!("Deleted aviatur {} ({})", offer.meta.id, offer.name);
    Ok(HttpResponse::Ok().json(json!({ "message": "Aviatur deleted" })))
}
