use anyhow::Context;
use skirmish::{config, relay, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    telemetry::init_tracing();

    let host = config::relay_host();
    let port = config::relay_port().context("SKIRMISH_RELAY_PORT must be a valid port number")?;
    let client_origin = config::client_origin();

    let bind_address = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    relay::run(listener, &client_origin)
        .await
        .context("relay server stopped")
}
