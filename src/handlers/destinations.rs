use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::{json, Value};

use super::{Admin, ThreadSafeWorkDir};
use crate::calendar::LocalCalendar;
use crate::catalog::{Destination, Document};
use crate::errors::*;
use crate::listing::destinations_by_popularity;
use crate::workdir::WorkDir;

fn ensure_unique_slug(work_dir: &WorkDir, destination: &Destination) -> Result<()> {
    let taken = work_dir
        .destinations
        .values()
        .any(|d| d.slug == destination.slug && d.meta.id != destination.meta.id);
    if taken {
        return Err(Error::BadRequest(format!(
            "Destination slug {} is already taken",
            destination.slug
        )));
    }
    Ok(())
}

#[get("/api/destinations")]
pub async fn list_destinations(store: web::Data<ThreadSafeWorkDir>) -> Result<HttpResponse> {
    let work_dir = store.read()?;
    Ok(HttpResponse::Ok().json(destinations_by_popularity(&work_dir)))
}

#[get("/api/destinations/{slug}")]
pub async fn get_destination(
    store: web::Data<ThreadSafeWorkDir>,
    slug: web::Path<String>,
) -> Result<HttpResponse> {
    let work_dir = store.read()?;
    let destination = work_dir
        .destinations
        .values()
        .find(|d| d.slug == *slug)
        .ok_or_else(Destination::not_found)?;
    Ok(HttpResponse::Ok().json(destination))
}

#[post("/api/destinations")]
pub async fn create_destination(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let destination: Destination = store.create(
        body.into_inner(),
        calendar.now(),
        |work_dir, destination: &mut Destination| ensure_unique_slug(work_dir, destination),
    )?;
    log::info!("Created destination {}", destination.slug);
    Ok(HttpResponse::Created().json(destination))
}

#[put("/api/destinations/{id}")]
pub async fn update_destination(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    calendar: web::Data<LocalCalendar>,
    id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let destination: Destination = store.update(
        &id,
        body.into_inner(),
        calendar.now(),
        |work_dir, destination: &mut Destination| ensure_unique_slug(work_dir, destination),
    )?;
    Ok(HttpResponse::Ok().json(destination))
}

#[delete("/api/destinations/{id}")]
pub async fn delete_destination(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let destination = store.delete::<Destination>(&id)?;
    log::info!("Deleted destination {}", destination.slug);
    Ok(HttpResponse::Ok().json(json!({ "message": "Destination deleted" })))
}
