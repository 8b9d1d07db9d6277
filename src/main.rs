use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use rss2db::{Config, IngestPipeline};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = rss2db::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        rss2db::logging::init_console_only(&config.logging.level);
    }

    info!("RSS Feed to Database Application");

    match run(&config).await {
        Ok(summary) => info!("Run finished: {}", summary),
        Err(e) => error!("Run failed: {}", e),
    }

    if config.app.pause_on_exit {
        println!("Press Enter to exit...");
        let mut line = String::new();
        let _ = BufReader::new(tokio::io::stdin()).read_line(&mut line).await;
    }
}

async fn run(config: &Config) -> rss2db::Result<rss2db::RunSummary> {
    config.validate()?;
    let pipeline = IngestPipeline::from_config(&config.feed)?;
    info!("Feed: {}", pipeline.feed_url());
    pipeline.run_once(&config.database).await
}
