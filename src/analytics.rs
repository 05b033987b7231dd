//! View and click counters.
//!
//! Events are appended to a SQLite table and aggregated on demand for the
//! admin dashboard. Recording is fire-and-forget from the storefront's point of
//! view, so nothing here feeds back into the catalog.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use regex::Regex;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::errors::*;

pub const MAX_USER_AGENT: usize = 200;
pub const TOP_COUNTRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Tour,
    Aviatur,
    Social,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Tour => "Tour",
            ItemType::Aviatur => "Aviatur",
            ItemType::Social => "Social",
        }
    }
}

impl FromStr for ItemType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Tour" => Ok(ItemType::Tour),
            "Aviatur" => Ok(ItemType::Aviatur),
            "Social" => Ok(ItemType::Social),
            _ => Err(Error::BadRequest(
                "itemType must be Tour, Aviatur or Social".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mobile => "mobile",
            Device::Tablet => "tablet",
            Device::Desktop => "desktop",
            Device::Unknown => "unknown",
        }
    }

    /// Coarse device class from a User-Agent header. Phones are checked
    /// before tablets.
    pub fn from_user_agent(user_agent: &str) -> Device {
        if user_agent.is_empty() {
            return Device::Unknown;
        }
        let ua = user_agent.to_lowercase();
        let is_match = |pattern: &str| Regex::new(pattern).map_or(false, |re| re.is_match(&ua));

        if is_match(r"mobile|android|iphone|ipod|blackberry|windows phone") {
            Device::Mobile
        } else if is_match(r"ipad|tablet") {
            Device::Tablet
        } else {
            Device::Desktop
        }
    }
}

/// Page the visitor was on when clicking a social link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ViewEvent {
    pub item_id: String,
    pub item_type: ItemType,
    pub source: Option<ViewSource>,
    pub viewed_at: DateTime<Utc>,
    pub user_agent: String,
    pub device: Device,
    pub country: String,
}

impl ViewEvent {
    pub fn new(
        item_id: String,
        item_type: ItemType,
        user_agent: &str,
        country: Option<&str>,
        viewed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            item_id,
            item_type,
            source: None,
            viewed_at,
            user_agent: user_agent.chars().take(MAX_USER_AGENT).collect(),
            device: Device::from_user_agent(user_agent),
            country: country
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or("Unknown")
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatsPeriod {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl StatsPeriod {
    /// Unknown values fall back to the last seven days.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("24h") => StatsPeriod::Day,
            Some("30d") => StatsPeriod::Month,
            Some("all") => StatsPeriod::All,
            _ => StatsPeriod::Week,
        }
    }

    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            StatsPeriod::Day => now - Duration::hours(24),
            StatsPeriod::Week => now - Duration::days(7),
            StatsPeriod::Month => now - Duration::days(30),
            StatsPeriod::All => DateTime::from_timestamp_millis(0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    #[serde(rename = "_id")]
    pub day: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub total_views: u64,
    pub views_by_type: BTreeMap<String, u64>,
    pub views_per_day: Vec<DayCount>,
    pub device_stats: BTreeMap<String, u64>,
    /// Top countries, most views first.
    pub country_stats: IndexMap<String, u64>,
    pub social_stats: BTreeMap<String, u64>,
    pub period: StatsPeriod,
}

#[derive(Clone)]
pub struct AnalyticsStore {
    pool: Pool<SqliteConnectionManager>,
}

impl AnalyticsStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_manager(SqliteConnectionManager::file(path), 8)
    }

    /// A private in-memory database. The pool holds a single connection so
    /// every query sees the same data.
    pub fn in_memory() -> Result<Self> {
        Self::with_manager(SqliteConnectionManager::memory(), 1)
    }

    fn with_manager(manager: SqliteConnectionManager, size: u32) -> Result<Self> {
        let pool = Pool::builder().max_size(size).build(manager)?;
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS views (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id TEXT NOT NULL,
                item_type TEXT NOT NULL,
                source TEXT,
                viewed_at INTEGER NOT NULL,
                user_agent TEXT NOT NULL DEFAULT '',
                device TEXT NOT NULL DEFAULT 'unknown',
                country TEXT NOT NULL DEFAULT 'Unknown'
            );
            CREATE INDEX IF NOT EXISTS views_item ON views (item_id, item_type);
            CREATE INDEX IF NOT EXISTS views_viewed_at ON views (viewed_at);
            CREATE INDEX IF NOT EXISTS views_type_viewed_at ON views (item_type, viewed_at);",
        )?;
        Ok(())
    }

    pub fn record(&self, event: &ViewEvent) -> Result<()> {
        let source = event
            .source
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO views (item_id, item_type, source, viewed_at, user_agent, device, country)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.item_id,
                event.item_type.as_str(),
                source,
                event.viewed_at.timestamp_millis(),
                event.user_agent,
                event.device.as_str(),
                event.country,
            ],
        )?;
        Ok(())
    }

    fn grouped(&self, sql: &str, since: DateTime<Utc>) -> Result<Vec<(String, u64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![since.timestamp_millis()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn stats(&self, period: StatsPeriod, now: DateTime<Utc>) -> Result<ViewStats> {
        let since = period.since(now);

        let total_views: i64 = {
            let conn = self.pool.get()?;
            conn.query_row(
                "SELECT COUNT(*) FROM views WHERE viewed_at >= ?1",
                params![since.timestamp_millis()],
                |row| row.get(0),
            )?
        };

        let views_by_type = self.grouped(
            "SELECT item_type, COUNT(*) FROM views WHERE viewed_at >= ?1 GROUP BY item_type",
            since,
        )?;
        let views_per_day = self.grouped(
            "SELECT strftime('%Y-%m-%d', viewed_at / 1000, 'unixepoch') AS day, COUNT(*)
             FROM views WHERE viewed_at >= ?1 GROUP BY day ORDER BY day ASC",
            since,
        )?;
        let device_stats = self.grouped(
            "SELECT device, COUNT(*) FROM views WHERE viewed_at >= ?1 GROUP BY device",
            since,
        )?;
        let country_stats = self.grouped(
            &format!(
                "SELECT country, COUNT(*) AS n FROM views WHERE viewed_at >= ?1
                 GROUP BY country ORDER BY n DESC, country ASC LIMIT {}",
                TOP_COUNTRIES
            ),
            since,
        )?;
        let social_stats = self.grouped(
            "SELECT item_id, COUNT(*) FROM views
             WHERE viewed_at >= ?1 AND item_type = 'Social' GROUP BY item_id",
            since,
        )?;

        Ok(ViewStats {
            total_views: total_views.max(0) as u64,
            views_by_type: views_by_type.into_iter().collect(),
            views_per_day: views_per_day
                .into_iter()
                .map(|(day, count)| DayCount { day, count })
                .collect(),
            device_stats: device_stats.into_iter().collect(),
            country_stats: country_stats.into_iter().collect(),
            social_stats: social_stats.into_iter().collect(),
            period,
        })
    }

    /// View counts keyed by (item type, item id) since the start of the period.
    pub fn views_by_item(
        &self,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<HashMap<(ItemType, String), u64>> {
        let since = period.since(now);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT item_type, item_id, COUNT(*) FROM views
             WHERE viewed_at >= ?1 GROUP BY item_type, item_id",
        )?;
        let rows = stmt.query_map(params![since.timestamp_millis()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (item_type, item_id, count) = row?;
            if let Ok(item_type) = item_type.parse::<ItemType>() {
                counts.insert((item_type, item_id), count.max(0) as u64);
            }
        }
        Ok(counts)
    }
}
