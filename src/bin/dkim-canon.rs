//! HTTP service canonicalizing DKIM header blocks and bodies.
//!
//! Configuration comes from `dkim-canon.toml` (optional), `.env` and `DKIM_CANON_*` variables.

use dkim_canon::server::{self, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let config = ServerConfig::load()?;
    server::start_server(config).await
}
