use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "repodesk=info";
const VERBOSE_FILTER: &str = "repodesk=debug";

/// Install the global tracing subscriber, writing to stderr.
pub fn init(verbose: bool, configured: Option<&str>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, configured)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

/// `RUST_LOG` wins when set; otherwise `verbose` selects debug output, then
/// the configured filter, then `repodesk=info`.
fn filter(verbose: bool, configured: Option<&str>) -> Result<EnvFilter> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::try_new(VERBOSE_FILTER)?,
        Err(_) => EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER))?,
    };
    Ok(filter)
}
