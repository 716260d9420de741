use clap::Parser;
use logtail::cli::TailArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logtail")]
#[command(about = "Tail Compute log output for a service", long_about = None)]
struct Cli {
    #[command(flatten)]
    tail: TailArgs,

    /// Dump request and response details while tailing
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "logtail=trace" } else { "logtail=info" };

    // Diagnostics go to stderr, stdout belongs to the tailed logs
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.tail.into_config()?;
    logtail::cli::run(config).await?;

    Ok(())
}
