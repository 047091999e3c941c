use anyhow::Result;
use seqsync_config::{load_layered_yaml, LoadedConfig};

pub mod replay;

/// Install the fmt subscriber on stderr so stdout stays machine-readable.
///
/// RUST_LOG wins; otherwise `fallback` (from config) is used.
pub fn init_tracing(fallback: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    load_layered_yaml(&refs)
}

pub fn config_hash(paths: &[String]) -> Result<()> {
    let loaded = load_config(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}
