//! Buffered file output with a drop-newest overflow policy
//!
//! Run with: cargo run --example buffered_output

use named_logger_system::prelude::*;
use named_logger_system::LogRegistry;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let path = std::env::temp_dir().join("buffered_output_demo.log");
    let file = Arc::new(WriterOutput::file(&path)?);

    let buffered = Arc::new(
        BufferedOutput::builder(file)
            .capacity(64)
            .overflow_policy(OverflowPolicy::DropNewest)
            .on_overflow(Arc::new(|dropped| {
                if dropped == 1 {
                    eprintln!("queue full, dropping records");
                }
            }))
            .build(),
    );

    let registry = LogRegistry::new(
        LogLevel::Info,
        Arc::new(TextHandler::new(Template::standard(), buffered.clone())),
    );
    registry.register_output(Arc::clone(&buffered));

    let logger = registry.get_logger_named("demo.burst");
    for i in 0..10_000 {
        logger.info(format!("burst record {}", i));
    }

    let report = registry.shutdown(Duration::from_secs(5));
    println!(
        "delivered {} dropped {} lost {} -> {}",
        report.delivered,
        buffered.metrics().dropped_count(),
        report.lost,
        path.display()
    );
    Ok(())
}
