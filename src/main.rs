use clap::Parser;
use log::{debug, error, info};
use meetinvite::cli::Cli;
use meetinvite::env_manager::load_env_file;
use meetinvite::error::{exit_code_for, EXIT_OK};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // .env may set RUST_LOG, so load it before the logger reads the filter
    let env_file = load_env_file();
    meetinvite::init_logger();
    match env_file {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    let cli = Cli::parse();

    let code = match meetinvite::run(cli).await {
        Ok(()) => EXIT_OK,
        Err(err) => {
            error!("{:#}", err);
            exit_code_for(&err)
        }
    };

    std::process::exit(code);
}
