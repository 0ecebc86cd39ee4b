use crate::cli::ServeArgs;
use crate::infra::{demo_service, AppState, DemoBackend};
use crate::routes::with_booking_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Datelike, Local};
use holiday_quote::config::AppConfig;
use holiday_quote::error::AppError;
use holiday_quote::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let seed_year = args
        .seed_year
        .unwrap_or_else(|| Local::now().date_naive().year());
    let backend = DemoBackend::seeded(seed_year);
    let service = demo_service(&backend, config.engine.clone(), &[seed_year, seed_year + 1]).await;

    let app = with_booking_routes(Arc::new(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, seed_year, "holiday quote service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
