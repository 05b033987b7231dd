use std::{
    collections::BTreeMap,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{parse_timezone, DEFAULT_TIMEZONE};
use crate::catalog::{Aviatur, Booking, Destination, Document, Tour};
use crate::collections::Collection;
use crate::errors::*;

pub const CONFIG_FILE: &str = "config.json";
pub const UPLOADS_DIR: &str = "uploads";
pub const ANALYTICS_DB: &str = "analytics.sqlite3";

const COLLECTION_FILES: [&str; 4] = [
    Tour::FILE_NAME,
    Aviatur::FILE_NAME,
    Destination::FILE_NAME,
    Booking::FILE_NAME,
];

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredentials {
    pub username: String,
    /// crypt(3)-style hash, e.g. bcrypt `$2b$...`
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub slug: String,
    pub label: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub admin: Option<AdminCredentials>,
}

impl Config {
    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }
}

#[derive(Clone)]
pub struct WorkDir {
    pub path: Box<Path>,
    pub config: Config,
    pub tz: Tz,
    pub tours: Collection<Tour>,
    pub aviatury: Collection<Aviatur>,
    pub destinations: Collection<Destination>,
    pub bookings: Collection<Booking>,
    pub last_seen: Fingerprint,
    pub loaded_at: u128,
}

fn load_collection<T: Document>(path: &Path) -> Result<Collection<T>> {
    let file_path = path.join(T::FILE_NAME);
    if !file_path.exists() {
        return Ok(Collection::default());
    }
    let file = File::open(&file_path).context(&format!("Unable to open {}", T::FILE_NAME))?;
    serde_json::from_reader(file).context(&format!("{} was not well-formatted", T::FILE_NAME))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(FileStamp {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
        })
    }
}

/// Full-precision modification time and size of every collection file.
/// Any difference from the last recorded value means the file changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(BTreeMap<&'static str, FileStamp>);

impl Fingerprint {
    pub fn of(path: &Path) -> Self {
        let stamps = COLLECTION_FILES
            .iter()
            .filter_map(|name| Some((*name, FileStamp::read(&path.join(name))?)))
            .collect();
        Fingerprint(stamps)
    }

    /// Record the current state of one file, leaving the others as they were
    /// last seen.
    fn refresh(&mut self, path: &Path, name: &'static str) {
        match FileStamp::read(&path.join(name)) {
            Some(stamp) => self.0.insert(name, stamp),
            None => self.0.remove(name),
        };
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl WorkDir {
    pub fn new<P: Into<PathBuf>>(p: P) -> Result<Self> {
        let path = p.into();
        let config_file =
            File::open(path.join(CONFIG_FILE)).context("Unable to open config.json")?;
        let config: Config =
            serde_json::from_reader(config_file).context("config.json was not well-formatted")?;
        let tz = config.tz()?;

        let tours = load_collection::<Tour>(&path)?;
        let aviatury = load_collection::<Aviatur>(&path)?;
        let destinations = load_collection::<Destination>(&path)?;
        let bookings = load_collection::<Booking>(&path)?;

        let last_seen = Fingerprint::of(&path);
        let loaded_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);

        log::info!(
            "Loaded {}: {} tours, {} aviatury, {} destinations, {} bookings",
            path.display(),
            tours.len(),
            aviatury.len(),
            destinations.len(),
            bookings.len()
        );

        Ok(WorkDir {
            path: path.into(),
            config,
            tz,
            tours,
            aviatury,
            destinations,
            bookings,
            last_seen,
            loaded_at,
        })
    }

    /// Lay out a fresh work directory with an empty catalog.
    pub fn create<P: Into<PathBuf>>(p: P, config: &Config) -> Result<Self> {
        let path = p.into();
        config.tz()?;
        std::fs::create_dir_all(path.join(UPLOADS_DIR))?;

        let config_path = path.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(Error::Context(format!(
                "{} already exists",
                config_path.display()
            )));
        }
        let file = File::create(config_path)?;
        serde_json::to_writer_pretty(file, config)?;

        Self::new(path)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.path.join(UPLOADS_DIR)
    }

    pub fn analytics_path(&self) -> PathBuf {
        self.path.join(ANALYTICS_DB)
    }

    pub fn collection<T: Document>(&self) -> &Collection<T> {
        T::collection(self)
    }

    /// Whether any collection file differs from what this catalog last read
    /// or wrote.
    pub fn changed_on_disk(&self) -> bool {
        Fingerprint::of(&self.path) != self.last_seen
    }

    pub fn find<T: Document>(&self, id: &str) -> Result<&T> {
        self.collection::<T>().get(id).ok_or_else(T::not_found)
    }

    /// Write a replacement collection to disk, then swap it in. A failed
    /// write leaves both the file and memory untouched.
    pub fn commit<T: Document>(&mut self, items: Collection<T>) -> Result<()> {
        let target = self.path.join(T::FILE_NAME);
        let staging = self.path.join(format!("{}.tmp", T::FILE_NAME));
        {
            let mut file = File::create(&staging)?;
            serde_json::to_writer_pretty(&mut file, &items)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        std::fs::rename(&staging, &target)?;

        *T::collection_mut(self) = items;
        self.last_seen.refresh(&self.path, T::FILE_NAME);
        Ok(())
    }

    pub fn insert<T: Document>(&mut self, item: T) -> Result<()> {
        let mut items = self.collection::<T>().clone();
        items.upsert(item);
        self.commit(items)
    }

    pub fn remove<T: Document>(&mut self, id: &str) -> Result<T> {
        let mut items = self.collection::<T>().clone();
        let removed = items.shift_remove(id).ok_or_else(T::not_found)?;
        self.commit(items)?;
        Ok(removed)
    }
}
