use std::sync::Arc;

use engine::{
    compile_catalog, resolve_app_paths, FileSlotStore, GameSession, SaveCoordinator,
    SessionConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub(crate) struct AppWiring {
    pub(crate) session: GameSession,
    pub(crate) saves: SaveCoordinator,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Signal Lost Startup ===");

    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    info!(
        root = %paths.root.display(),
        content = %paths.base_content_dir.display(),
        saves = %paths.save_dir.display(),
        "app_paths_resolved"
    );

    let catalog = compile_catalog(&paths.base_content_dir).map_err(|error| error.to_string())?;
    let session = GameSession::new(Arc::new(catalog), SessionConfig::from_env())
        .map_err(|error| error.to_string())?;
    let saves = SaveCoordinator::new(FileSlotStore::new(paths.save_dir));

    Ok(AppWiring { session, saves })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
