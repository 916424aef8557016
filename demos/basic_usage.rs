//! Basic usage: setup from the environment, named loggers and rules
//!
//! Run with: LOG_LEVEL=debug cargo run --example basic_usage

use named_logger_system::prelude::*;
use named_logger_system::{debug, info, notice, warn, DEFAULT_SHUTDOWN_TIMEOUT};

fn main() -> Result<()> {
    let config = LogConfig::from_env()?;
    setup("basic_usage", &config)?;

    let db = get_logger_named("demo.db");
    let http = get_logger_named("demo.http");

    info!(db, "connected to {}", "postgres://localhost/demo");
    debug!(db, "pool size {}", 8);
    notice!(http, "listening on port {}", 8080);

    // Only the cache gets debug output from here on
    set_level(Some("^demo\\.db\\.cache"), LogLevel::Debug)?;
    let cache = get_logger_named("demo.db.cache");
    debug!(cache, "warmed {} entries", 1024);
    debug!(db, "still filtered");

    warn!(http, "slow request: {}ms", 1200);

    // Dependencies using the `log` crate land on the "stdlog" logger
    log::warn!("message from a dependency");

    let report = shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    if report.lost > 0 {
        eprintln!("{} records lost", report.lost);
    }
    Ok(())
}
