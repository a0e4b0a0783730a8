use std::{io, sync::Arc, time::Duration};

use actix_web::{web, App, HttpServer};
use premia_data::{
    exchange::LiveVenues,
    protocols::ws::TungsteniteTransport,
    rates::RestRateProvider,
    shared::utils::{Clock, SystemClock},
};
use premia_scanner::{
    server::{handlers::configure, hub::Hub, Supervisor, KEEP_ALIVE_SECS},
    settings::{RuntimeConfig, Settings},
    universe::{UniverseStore, DEFAULT_UNIVERSE_TTL},
    watch::{WatchDeps, BOOTSTRAP_WAIT},
};
use tracing::info;

/*----- */
// Main
/*----- */
#[tokio::main]
async fn main() -> io::Result<()> {
    // Init
    init_logging();
    let settings = Settings::from_env().map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;

    // Venues, rates and the universe cache, shared by every watch
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let deps = WatchDeps {
        directory: Arc::new(LiveVenues::new(
            Arc::new(TungsteniteTransport),
            settings.stale_ms,
            clock.clone(),
        )),
        universe: Arc::new(UniverseStore::new(settings.runtime_dir.clone(), DEFAULT_UNIVERSE_TTL, clock)),
        rates: Arc::new(RestRateProvider::from_env()),
        rate_source: settings.rate_source,
        bootstrap_wait: BOOTSTRAP_WAIT,
    };

    // Watches
    let hub = Arc::new(Hub::new());
    let supervisor = Arc::new(Supervisor::new(deps, hub.clone(), RuntimeConfig::default(), settings.ws_only));
    supervisor.start_all();

    // Keep alive for idle subscribers
    let keep_alive = hub.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(KEEP_ALIVE_SECS));
        loop {
            interval.tick().await;
            keep_alive.keep_alive();
        }
    });

    // Http server
    info!(bind = %settings.bind, port = settings.port, ws_only = settings.ws_only, "starting server");
    let supervisor_data = web::Data::new(supervisor.clone());
    let hub_data = web::Data::new(hub);
    let result = HttpServer::new(move || {
        App::new()
            .app_data(supervisor_data.clone())
            .app_data(hub_data.clone())
            .configure(configure)
    })
    .bind((settings.bind.as_str(), settings.port))?
    .run()
    .await;

    supervisor.shutdown();
    result
}

/*----- */
// Logging config
/*----- */
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        // Enable Json formatting
        .json()
        // Install this Tracing subscriber as global default
        .init()
}
