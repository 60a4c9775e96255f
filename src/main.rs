use clap::Parser;
use escrow_dapp::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    escrow_dapp::run(args).await
}
