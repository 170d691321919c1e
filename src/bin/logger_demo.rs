use authlane::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "authlane=trace,warp=info".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!(target: "authlane::demo", "application trace log");
    debug!(target: "authlane::demo", "application debug log");
    info!(target: "authlane::demo", "application info log");

    Ok(())
}
