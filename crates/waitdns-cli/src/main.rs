//! waitdns - wait for DNS propagation on every authoritative server.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    waitdns_cli::run().await
}
