use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{request_country, Admin, ThreadSafeWorkDir};
use crate::analytics::{AnalyticsStore, ItemType, StatsPeriod, ViewEvent, ViewSource};
use crate::availability::DateWindow;
use crate::calendar::LocalCalendar;
use crate::errors::*;
use crate::listing::{all_items_entry, select_offers, select_tours, OfferFilter, TourFilter};
use crate::serde::empty_as_none;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    #[serde(default)]
    item_id: Option<Value>,
    #[serde(default)]
    item_type: Option<String>,
    #[serde(default)]
    source: Option<ViewSource>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    period: Option<String>,
}

/// Ids may arrive as strings or bare numbers (social link slots).
fn item_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[post("/api/analytics/view")]
pub async fn record_view(
    req: HttpRequest,
    analytics: web::Data<AnalyticsStore>,
    calendar: web::Data<LocalCalendar>,
    body: web::Json<ViewRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let (Some(id), Some(kind)) = (item_id(body.item_id.as_ref()), body.item_type) else {
        return Err(Error::BadRequest("itemId and itemType are required".into()));
    };
    let item_type: ItemType = kind.parse()?;

    let user_agent = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let country = request_country(&req);

    let mut event = ViewEvent::new(
        id,
        item_type,
        user_agent,
        country.as_deref(),
        calendar.now(),
    );
    event.source = body.source;
    analytics.record(&event)?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[get("/api/analytics/stats")]
pub async fn view_stats(
    _admin: Admin,
    analytics: web::Data<AnalyticsStore>,
    calendar: web::Data<LocalCalendar>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse> {
    let period = StatsPeriod::parse(query.period.as_deref());
    Ok(HttpResponse::Ok().json(analytics.stats(period, calendar.now())?))
}

/// Every active tour and offer with its view count, most viewed first.
#[get("/api/analytics/all-items")]
pub async fn all_items(
    _admin: Admin,
    store: web::Data<ThreadSafeWorkDir>,
    analytics: web::Data<AnalyticsStore>,
    calendar: web::Data<LocalCalendar>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse> {
    let period = StatsPeriod::parse(query.period.as_deref());
    let views = analytics.views_by_item(period, calendar.now())?;
    let count = |item_type: ItemType, id: &str| {
        views
            .get(&(item_type, id.to_string()))
            .copied()
            .unwrap_or(0)
    };
    let tz = calendar.tz();

    let work_dir = store.read()?;
    let mut tours = select_tours(
        work_dir.tours.values(),
        &TourFilter::active(DateWindow::unbounded()),
        tz,
    )
    .into_iter()
    .map(|t| {
        let summary = json!({
            "_id": t.meta.id,
            "title": t.title,
            "city": t.city,
            "country": t.country,
            "images": t.images,
            "price": t.price,
            "startDate": t.start_date,
        });
        (count(ItemType::Tour, &t.meta.id), summary)
    })
    .collect::<Vec<_>>();

    let mut aviatury = select_offers(
        work_dir.aviatury.values(),
        &OfferFilter::active(DateWindow::unbounded()),
        tz,
    )
    .into_iter()
    .map(|o| {
        let summary = json!({
            "_id": o.meta.id,
            "name": o.name,
            "country": o.country,
            "flag": o.flag,
            "image": o.image,
            "price": o.price,
        });
        (count(ItemType::Aviatur, &o.meta.id), summary)
    })
    .collect::<Vec<_>>();

    tours.sort_by(|a, b| b.0.cmp(&a.0));
    aviatury.sort_by(|a, b| b.0.cmp(&a.0));

    let tours: Vec<Value> = tours
        .into_iter()
        .map(|(views, summary)| all_items_entry(summary, ItemType::Tour.as_str(), views))
        .collect();
    let aviatury: Vec<Value> = aviatury
        .into_iter()
        .map(|(views, summary)| all_items_entry(summary, ItemType::Aviatur.as_str(), views))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "tours": tours,
        "aviatury": aviatury,
        "period": period,
    })))
}
