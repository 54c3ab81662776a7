//! Application entry point for the space-colonization tree viewer.
//!
//! This binary sets up logging and eframe/egui and delegates all
//! interactive logic and rendering to [`Viewer`] from the `viewer` module.
//!
//! Usage: `tree-view [config.toml]`. Missing fields in the file fall back
//! to [`Config::default`].

mod viewer;

use std::{env, fs};
use tree_core::Config;
use viewer::Viewer;

const SEED: u64 = 7;

/// Reads a [`Config`] from the TOML file named by the first argument.
fn load_config() -> Config {
    let Some(path) = env::args().nth(1) else {
        return Config::default();
    };

    match fs::read_to_string(&path).map(|text| toml::from_str::<Config>(&text)) {
        Ok(Ok(cfg)) => {
            tracing::info!("Loaded config from {}", path);
            cfg
        }
        Ok(Err(e)) => {
            tracing::warn!("Invalid config {}: {}. Using defaults.", path, e);
            Config::default()
        }
        Err(e) => {
            tracing::warn!("Cannot read {}: {}. Using defaults.", path, e);
            Config::default()
        }
    }
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if no tree can be grown, or eframe fails to create the native
///   window or event loop.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let viewer = match Viewer::new(load_config(), SEED) {
        Ok(viewer) => viewer,
        Err(e) => {
            tracing::warn!("{}. Falling back to the default config.", e);
            Viewer::new(Config::default(), SEED)?
        }
    };
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "SCA Tree",
        options,
        Box::new(move |_cc| Ok(Box::new(viewer))),
    )?;
    Ok(())
}
