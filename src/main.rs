//! cleanroom - run SQL as Databricks clean room jobs from the command line.

use cleanroom_portal::app;
use cleanroom_portal::cli::Cli;
use cleanroom_portal::logging::init_stderr_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    init_stderr_logging(cli.verbose);

    if let Err(e) = app::run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}
