//! mklocal - keys, CSRs and certificates for local hosts, via openssl.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mklocal_cli::run().await
}
