use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDesignRepository};
use crate::routes::with_design_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use home_designer::config::AppConfig;
use home_designer::design::{CatalogRuleEvaluator, DesignEngine, DesignSessionService};
use home_designer::error::AppError;
use home_designer::telemetry;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryDesignRepository::seeded()?);
    let engine = Arc::new(DesignEngine::new(CatalogRuleEvaluator));
    let design_service = Arc::new(DesignSessionService::new(
        repository,
        engine,
        config.design.session_defaults(),
    ));

    let app = with_design_routes(design_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        build_mode = ?config.design.build_mode,
        "home design service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
