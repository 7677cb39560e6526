use castle::{CastleServerBuilder, StandardChess};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("CASTLE_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:4000".to_string());

    let server = CastleServerBuilder::new()
        .bind(&addr)
        .build::<StandardChess>()
        .await?;

    tracing::info!(%addr, "castle listening");
    server.run().await?;
    Ok(())
}
