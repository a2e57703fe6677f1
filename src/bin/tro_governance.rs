use anyhow::Result;
use clap::Parser;
use tro_governance::ServeArgs;

#[tokio::main]
async fn main() -> Result<()> {
  ServeArgs::parse().serve().await
}
