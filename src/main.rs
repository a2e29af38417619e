// src/main.rs
use std::sync::Arc;

use blockviz_layout::api::{self, ApiState};
use blockviz_layout::color::{ColorSource, NamePalette};
use blockviz_layout::config::AppConfig;
use blockviz_layout::session::spawn_session;
use blockviz_layout::workarea::WorkAreaRegistry;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let registry = Arc::new(WorkAreaRegistry::reference().clone());
    let colors: Arc<dyn ColorSource> = Arc::new(NamePalette::default());
    let chart_options = app_config.charts.chart_options();

    let (session, _session_task) = spawn_session(
        registry.clone(),
        colors.clone(),
        chart_options.clone(),
        chrono::Local::now().naive_local(),
        app_config.session.clone(),
    );

    let state = ApiState {
        layout: app_config.layout.layout_config(),
        chart_options,
        registry,
        colors,
        session,
    };

    info!("Layout service starting...");
    if let Err(err) = api::start_api_server(app_config.api.clone(), state).await {
        error!("API server terminated with an error: {err}");
        std::process::exit(1);
    }
}
