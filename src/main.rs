use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use actix_web_opentelemetry::{PrometheusMetricsHandler, RequestMetrics, RequestTracing};
use chrono::Utc;
use clap::Parser;
use opentelemetry::global;
use opentelemetry_sdk::metrics::MeterProvider;
use std::{thread, time::Duration};

use travel_server::{
    analytics::AnalyticsStore,
    calendar::{LocalCalendar, DEFAULT_TIMEZONE},
    errors::{self, ResultExt},
    handlers::{AdminAccess, AppState, StartTime},
    thread_safe_work_dir::ThreadSafeWorkDir,
    workdir::{Config, WorkDir},
};

const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Serve the catalog stored in a work directory
    Serve { work_dir: String },
    /// Create an empty work directory
    Init {
        work_dir: String,
        #[arg(long)]
        slug: String,
        #[arg(long)]
        label: String,
        #[arg(long, default_value = DEFAULT_TIMEZONE)]
        timezone: String,
    },
    /// Print a bcrypt hash for ADMIN_PASSWORD_HASH or config.json
    HashPassword { password: String },
}

async fn serve(work_dir: &str) -> errors::Result<()> {
    log::info!("Loading WorkDir: {}", work_dir);
    let work_dir = WorkDir::new(work_dir.to_string())?;
    let tz = work_dir.tz;
    let uploads = work_dir.uploads_path();
    std::fs::create_dir_all(&uploads)?;
    let analytics = AnalyticsStore::open(&work_dir.analytics_path())?;
    let access = AdminAccess::from_env(work_dir.config.admin.clone());
    if access.0.is_none() {
        log::warn!("No admin credentials configured, admin routes will reject every request");
    }

    let store = ThreadSafeWorkDir::new(work_dir);
    let update_clone = store.clone();

    // Pick up edits made to the collection files by other tools
    thread::spawn(move || loop {
        thread::sleep(REFRESH_INTERVAL);
        if let Err(e) = update_clone.check_for_updates() {
            log::error!("Unable to reload work directory: {}", e);
        }
    });

    let state = AppState {
        store: web::Data::new(store),
        calendar: web::Data::new(LocalCalendar::system(tz)),
        analytics: web::Data::new(analytics),
        access: web::Data::new(access),
        start_time: web::Data::new(StartTime(Utc::now().timestamp_millis())),
    };

    let registry = prometheus::Registry::new();
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .context("Unable to build metrics exporter")?;
    let provider = MeterProvider::builder().with_reader(exporter).build();
    global::set_meter_provider(provider);

    let listen_address = std::env::var("LISTEN_ADDRESS").unwrap_or("127.0.0.1".to_owned());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    log::info!("Starting HTTP server at http://{}:{}", listen_address, port);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTracing::new())
            .wrap(RequestMetrics::default())
            .route(
                "/api/metrics",
                web::get().to(PrometheusMetricsHandler::new(registry.clone())),
            )
            .wrap(middleware::Logger::default())
            .configure(|cfg| state.configure(cfg))
            .service(Files::new("/uploads", uploads.clone()).prefer_utf8(true))
    })
    .bind((listen_address, port))?
    .run()
    .await?;

    Ok(())
}

async fn run() -> errors::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { work_dir } => serve(work_dir).await,
        Commands::Init {
            work_dir,
            slug,
            label,
            timezone,
        } => {
            let config = Config {
                slug: slug.clone(),
                label: label.clone(),
                timezone: timezone.clone(),
                admin: None,
            };
            let created = WorkDir::create(work_dir.to_string(), &config)?;
            log::info!("Initialized {}", created.path.display());
            Ok(())
        }
        Commands::HashPassword { password } => {
            let hash = pwhash::bcrypt::hash(password).context("Unable to hash password")?;
            println!("{}", hash);
            Ok(())
        }
    }
}

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        log::error!("{}", e);
        ::std::process::exit(1);
    }
}
