use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use argus_core::detect::onnx::{OnnxDetectorProvider, YoloConfig};
use argus_core::notify::SmtpMailer;
use argus_core::pipeline::{evidence_channel, EvidenceProcessor};
use argus_core::video::rtsp::FfmpegOpener;
use argus_core::{
    catalog, ActiveViolations, ActiveWindows, Annotator, CameraDirectory, ClassCatalog,
    FleetSupervisor, FrameStore, Maintenance, MaintenanceConfig, NotificationService,
    PipelineShared, PipelineSupervisor, ScheduleEvaluator, SupabaseStore,
};

use argus_server::config::{Settings, DEFAULT_CLASS_NAMES};
use argus_server::state::AppState;
use argus_server::routes;

/// Command line arguments for the Argus monitoring server
#[derive(Parser, Debug)]
#[command(name = "argus-server")]
#[command(about = "Multi-camera PPE violation monitoring service")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::from_env()?;
    if let Some(port) = args.port {
        settings.server_port = port;
    }
    if let Some(host) = args.host {
        settings.server_host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argus_server=debug,argus_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Server configuration loaded");
    let tz = settings.schedule_tz();

    // Database and caches.
    let pool = argus_core::repo::connect(&settings.database_url).await?;
    info!("Connected to PostgreSQL");

    let store = Arc::new(SupabaseStore::new(
        settings.supabase_url.clone(),
        settings.supabase_bucket.clone(),
        settings.supabase_service_key.clone(),
    )?);

    let class_catalog = Arc::new(ClassCatalog::new(catalog::DEFAULT_TTL));
    class_catalog.refresh(&pool).await?;

    let directory = Arc::new(CameraDirectory::new());
    directory
        .refresh(&pool, Some(store.as_ref() as &dyn argus_core::EvidenceStore))
        .await?;

    let active = Arc::new(ActiveViolations::new());
    active.refresh(&pool).await?;

    let detection_settings = match argus_core::repo::settings::fetch_detection_settings(&pool).await
    {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("Could not load detection settings, using defaults: {e}");
            argus_model::DetectionSettings::default()
        }
    };
    info!("Detection settings: {detection_settings:?}");

    // Notification stack.
    let mailer = Arc::new(SmtpMailer::new());
    let notifier = Arc::new(NotificationService::new(pool.clone(), mailer, tz)?);

    // Violation processing path.
    let (emit_tx, emit_rx) = evidence_channel();
    let processor = EvidenceProcessor::new(pool.clone(), store.clone(), Some(notifier.clone()));
    processor.spawn(emit_rx);

    // Detector configuration shared by every detection worker.
    let class_names: Vec<String> = match &settings.class_names_path {
        Some(path) => YoloConfig::load_class_names(path)?,
        None => DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    };
    let mut yolo = YoloConfig::new(settings.model_path.clone(), class_names);
    yolo.confidence_threshold = detection_settings.confidence_threshold;
    let detectors = Arc::new(OnnxDetectorProvider::new(yolo));

    let annotator = Annotator::new(settings.font_path.as_deref());
    if !annotator.has_font() {
        warn!("Overlay font unavailable; banners and labels will be shapes only");
    }

    let frames = Arc::new(FrameStore::new());
    let windows = Arc::new(ActiveWindows::new());
    let opener = Arc::new(FfmpegOpener::new()?);

    let pipelines = Arc::new(PipelineSupervisor::new(PipelineShared {
        opener,
        detectors,
        frames: frames.clone(),
        catalog: class_catalog.clone(),
        active: active.clone(),
        windows: windows.clone(),
        annotator: annotator.clone(),
        settings: detection_settings,
        emit: emit_tx,
        tz,
    }));

    let evaluator = ScheduleEvaluator::new(pool.clone(), tz);
    let fleet = Arc::new(FleetSupervisor::new(
        directory.clone(),
        evaluator,
        windows,
        pipelines,
    ));

    // Bring every enabled camera up before accepting preview clients.
    fleet.refresh_scheduler_state().await;
    info!("Camera fleet initialized");

    let maintenance = Maintenance::new(
        pool.clone(),
        store,
        Some(notifier),
        fleet.clone(),
        directory.clone(),
        active,
        class_catalog,
        tz,
        MaintenanceConfig {
            retention_days: settings.retention_days,
            ..MaintenanceConfig::default()
        },
    );
    tokio::spawn(maintenance.run());

    let state = AppState {
        pool,
        frames,
        directory,
        freeze_placeholder: Arc::new(
            annotator.placeholder("Stream disconnected", argus_core::annotate::RED),
        ),
    };

    let app = routes::create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server_port));
    info!(
        "Starting Argus server (HTTP) on {}:{}",
        settings.server_host, settings.server_port
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down camera fleet");
    fleet.pipelines().stop_all().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not install Ctrl-C handler: {e}");
    }
}
