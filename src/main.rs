mod app;

use direct_uploader::config::UploaderConfig;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting direct uploader");

    let path = UploaderConfig::default_path();
    let config = match UploaderConfig::load(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), endpoint = %config.endpoint.path, "configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            UploaderConfig::default()
        }
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([640.0, 640.0])
            .with_min_inner_size([420.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Direct Uploader",
        options,
        Box::new(move |cc: &eframe::CreationContext<'_>| {
            Box::new(app::UploaderApp::new(cc, config))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to start the window: {e}"))
}
