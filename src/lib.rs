pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod env_manager;
pub mod error;
pub mod feedback;
pub mod invites;
pub mod services;
pub mod wait;

use anyhow::Result;
use log::*;

pub async fn run(cli: cli::Cli) -> Result<()> {
    let command = cli.resolved_command();

    // init-config must work even when the existing settings file is broken
    if let cli::Commands::InitConfig { force } = command {
        return app::init_config(cli.config.as_deref(), force);
    }

    let app = app::Application::new(&cli)?;
    info!("Running meetinvite {:?}", command);
    app.execute(command).await
}

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

// Re-export commonly used types
pub use calendar::{MeetingGroup, MeetingGroups};
pub use config::Settings;
pub use services::CalendarService;
