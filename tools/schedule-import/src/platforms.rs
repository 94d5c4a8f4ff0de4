//! Route patterns and platform geometry exported from the operator's
//! real-time system as one JSON document.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::{Context, Result};
use tracing::info;

use corvallis_transit::prelude::{PlatformBundle, PlatformSource, TransitError};

fn read_platforms(path: &PathBuf) -> Result<PlatformBundle> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let bundle: PlatformBundle = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!(
        "Read {} patterns and {} platforms",
        bundle.patterns.len(),
        bundle.platforms.len()
    );
    Ok(bundle)
}

/// [`PlatformSource`] over a JSON file
pub struct JsonPlatformSource {
    path: PathBuf,
}

impl JsonPlatformSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PlatformSource for JsonPlatformSource {
    fn fetch_platforms<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = corvallis_transit::Result<PlatformBundle>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.path.clone();

            tokio::task::spawn_blocking(move || read_platforms(&path))
                .await
                .map_err(|e| TransitError::Upstream(format!("platform reader stopped: {e}")))?
                .map_err(|e| TransitError::Upstream(format!("{e:#}")))
        })
    }
}
