use authlane::api;
use authlane::logger::*;
use authlane::server::*;
use authlane::settings::*;
use std::fs;
use std::sync::Arc;
use tokio::signal;
use warp::Filter;

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("could not listen for SIGINT: {}", e);
        std::future::pending::<()>().await;
    }
    info!("SIGINT received, draining connections");
}

fn ensure_file(kind: &str, path: &str) -> anyhow::Result<()> {
    if !fs::metadata(path)?.is_file() {
        return Err(anyhow::anyhow!("TLS {} is not a regular file: {:?}", kind, path));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let address: std::net::SocketAddr = project_settings.http.address.parse()?;
    let server = Arc::new(Server::try_new(&project_settings).await?);

    let api_v1 = api::v1::routes(server.clone()).recover(api::v1::recover_error);

    match (
        &project_settings.http.cert_path,
        &project_settings.http.key_path,
    ) {
        (Some(cert_path), Some(key_path)) => {
            ensure_file("cert", cert_path)?;
            ensure_file("key", key_path)?;
            let (bound, serving) = warp::serve(api_v1)
                .tls()
                .cert_path(cert_path)
                .key_path(key_path)
                .bind_with_graceful_shutdown(address, shutdown_signal());
            info!("listening on https://{}", bound);
            serving.await;
        }
        (None, None) => {
            let (bound, serving) =
                warp::serve(api_v1).try_bind_with_graceful_shutdown(address, shutdown_signal())?;
            info!("listening on http://{}", bound);
            serving.await;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "http.cert_path and http.key_path must be set together"
            ));
        }
    }

    info!("server shutdown successfully");
    Ok(())
}
