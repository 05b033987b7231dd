use actix_web::{dev::Payload, http::header::Header, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::basic::Config;
use actix_web_httpauth::extractors::AuthenticationError;
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use futures_util::future::{ready, Ready};

use crate::availability::DateWindow;
use crate::calendar::LocalCalendar;
use crate::workdir::AdminCredentials;

pub const ADMIN_REALM: &str = "Travel Admin";

/// Credentials admin routes are checked against. `None` locks every admin
/// route.
pub struct AdminAccess(pub Option<AdminCredentials>);

impl AdminAccess {
    /// `ADMIN_USERNAME` / `ADMIN_PASSWORD_HASH` take precedence over the
    /// credentials stored in `config.json`.
    pub fn from_env(fallback: Option<AdminCredentials>) -> Self {
        let username = std::env::var("ADMIN_USERNAME").unwrap_or_default();
        let password_hash = std::env::var("ADMIN_PASSWORD_HASH").unwrap_or_default();

        if username.is_empty() || password_hash.is_empty() {
            return AdminAccess(fallback);
        }
        AdminAccess(Some(AdminCredentials {
            username,
            password_hash,
        }))
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        match &self.0 {
            Some(expected) => {
                expected.username == username
                    && pwhash::unix::verify(password, &expected.password_hash)
            }
            None => false,
        }
    }
}

/// Extractor guarding admin-only handlers with HTTP Basic auth.
pub struct Admin {
    pub username: String,
}

fn challenge(req: &HttpRequest) -> actix_web::Error {
    let config = req
        .app_data::<Config>()
        .cloned()
        .unwrap_or_default()
        .realm(ADMIN_REALM);
    AuthenticationError::from(config).into()
}

fn authenticate(req: &HttpRequest) -> Result<Admin, actix_web::Error> {
    let access = req
        .app_data::<web::Data<AdminAccess>>()
        .ok_or_else(|| challenge(req))?;
    let authorization = Authorization::<Basic>::parse(req).map_err(|_| challenge(req))?;
    let credentials: &Basic = authorization.as_ref();

    let password = credentials.password().unwrap_or_default();
    if !access.verify(credentials.user_id(), password) {
        log::warn!("Rejected admin login for {}", credentials.user_id());
        return Err(challenge(req));
    }

    Ok(Admin {
        username: credentials.user_id().to_string(),
    })
}

impl FromRequest for Admin {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Date window from `from`/`to` query values; unparseable bounds are ignored.
pub fn query_window(calendar: &LocalCalendar, from: Option<&str>, to: Option<&str>) -> DateWindow {
    DateWindow::new(calendar.parse_opt(from), calendar.parse_opt(to))
}

/// Country of the visitor as reported by the fronting proxy.
pub fn request_country(req: &HttpRequest) -> Option<String> {
    ["CF-IPCountry", "X-Country-Code"]
        .iter()
        .filter_map(|name| req.headers().get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty() && *value != "XX")
        .map(str::to_string)
}

pub fn date_time_element(timestamp: Option<i64>, tz: Tz) -> maud::Markup {
    use maud::html;

    match timestamp.and_then(|ts| Utc.timestamp_millis_opt(ts).single()) {
        Some(time) => {
            let local = time.with_timezone(&tz);
            html! {
                time datetime=(time.to_rfc3339()) title=(local.to_rfc3339()) {
                    (local.format("%B %d, %Y %H:%M"))
                }
            }
        }
        None => html! {
            span { "never" }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn access() -> AdminAccess {
        AdminAccess(Some(AdminCredentials {
            username: "admin".into(),
            password_hash: pwhash::bcrypt::hash("secret").unwrap(),
        }))
    }

    #[test]
    fn test_verify() {
        let access = access();
        assert!(access.verify("admin", "secret"));
        assert!(!access.verify("admin", "wrong"));
        assert!(!access.verify("root", "secret"));
        assert!(!AdminAccess(None).verify("admin", "secret"));
    }

    #[test]
    fn test_request_country() {
        let req = TestRequest::default()
            .insert_header(("CF-IPCountry", "UA"))
            .to_http_request();
        assert_eq!(request_country(&req).as_deref(), Some("UA"));

        let req = TestRequest::default()
            .insert_header(("CF-IPCountry", "XX"))
            .insert_header(("X-Country-Code", "PL"))
            .to_http_request();
        assert_eq!(request_country(&req).as_deref(), Some("PL"));

        assert_eq!(request_country(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn test_date_time_element() {
        let rendered = date_time_element(Some(0), chrono_tz::Europe::Kyiv).into_string();
        assert!(rendered.contains("January 01, 1970 03:00"));
        assert!(date_time_element(None, chrono_tz::Europe::Kyiv)
            .into_string()
            .contains("never"));
    }
}
