//! Globe Viewer
//!
//! Renders a textured, image-lit globe in a native window:
//! - Four assets (HDR panorama plus colour, bump and specular maps) load in
//!   the background; the panorama is prefiltered into IBL cubemaps
//! - The sphere joins the scene once every asset is ready
//! - An orbit camera auto-rotates with damped drag and zoom input
//!
//! Configuration comes from `globe-viewer.json` (or the file named by
//! `GLOBE_VIEWER_CONFIG`); `RUST_LOG` controls log verbosity.

mod app;
mod assets;
mod config;
mod environment;
mod render;
mod scene;

use config::ViewerConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match ViewerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("❌ {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = app::run(config) {
        log::error!("❌ {err}");
        std::process::exit(1);
    }
}
