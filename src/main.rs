//! termatlas - tile source checker and cache warmer.
//!
//! Resolves a tile source, fetches the tiles covering an area, and reports
//! how the store behaved (fetches, failures, cache and persistence use).

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use termatlas::{config::Config, geo, RawDecoder, SourceMode, TileStore};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    run(config).await
}

async fn run(config: Config) -> ExitCode {
    info!("termatlas v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Source: {}", config.source);
    info!(
        "  Persistence: {}",
        if config.persist_downloads {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!("  Cache: {} tiles in memory", config.cache_capacity);

    let settings = config.settings();
    let store = TileStore::new(&settings, RawDecoder);

    let mode = match store.init(&config.source).await {
        Ok(mode) => mode,
        Err(e) => {
            error!("Failed to initialize tile source: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("  Mode: {:?}", mode);

    describe_source(&config, mode).await;

    let keys = warm_keys(&config);
    info!("");
    info!(
        "Warming {} tile(s) at zoom {} around {:.4},{:.4}",
        keys.len(),
        config.zoom,
        config.lat,
        config.lon
    );

    let started = Instant::now();
    let mut fetched = 0usize;
    let mut failed = 0usize;
    let mut bytes = 0usize;

    for &(z, x, y) in &keys {
        match store.get_tile(z, x, y).await {
            Ok(tile) => {
                fetched += 1;
                bytes += tile.len();
            }
            Err(e) => {
                failed += 1;
                warn!("  tile {}/{}/{}: {}", z, x, y, e);
            }
        }
    }

    let elapsed = started.elapsed();
    let stats = store.stats().await;

    if config.json {
        let report = serde_json::json!({
            "source": config.source,
            "mode": format!("{:?}", mode),
            "tiles": {
                "requested": keys.len(),
                "fetched": fetched,
                "failed": failed,
                "bytes": bytes,
            },
            "elapsed_ms": elapsed.as_millis() as u64,
            "cache": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        info!("");
        info!(
            "Fetched {}/{} tile(s), {} bytes in {:.1?}",
            fetched,
            keys.len(),
            bytes,
            elapsed
        );
        info!(
            "Cache: {}/{} resident, {} hit(s), {} miss(es)",
            stats.entries, stats.capacity, stats.hits, stats.misses
        );
    }

    if fetched == 0 && !keys.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Tile keys covering the configured area: the center tile plus `radius`
/// rings around it, clipped to the zoom level's grid.
fn warm_keys(config: &Config) -> Vec<(u8, u32, u32)> {
    let (cx, cy) = geo::lat_lon_to_tile(config.lat, config.lon, config.zoom);
    let n = 1i64 << config.zoom;
    let r = config.radius as i64;

    let mut keys = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let x = cx as i64 + dx;
            let y = cy as i64 + dy;
            if (0..n).contains(&x) && (0..n).contains(&y) {
                keys.push((config.zoom, x as u32, y as u32));
            }
        }
    }
    keys
}

/// Print source details for modes that carry metadata.
#[cfg(feature = "mbtiles")]
async fn describe_source(config: &Config, mode: SourceMode) {
    use termatlas::MbtilesFetcher;

    if mode != SourceMode::Mbtiles {
        return;
    }
    let fetcher = match MbtilesFetcher::open(config.source.clone().into()).await {
        Ok(fetcher) => fetcher,
        Err(e) => {
            warn!("  Metadata unavailable: {}", e);
            return;
        }
    };
    match fetcher.metadata().await {
        Ok(metadata) => {
            if let Some(name) = metadata.name {
                info!("  Name: {}", name);
            }
            if let Some(format) = metadata.format {
                info!("  Format: {}", format);
            }
            if let Some(bounds) = metadata.bounds {
                info!("  Bounds: {}", bounds);
            }
        }
        Err(e) => warn!("  Metadata unavailable: {}", e),
    }
}

#[cfg(not(feature = "mbtiles"))]
async fn describe_source(_config: &Config, _mode: SourceMode) {}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "termatlas=debug"
    } else {
        "termatlas=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
