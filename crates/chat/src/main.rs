use std::path::PathBuf;
use std::process::ExitCode;

use chatty::chat::ConversationPresenter;
use chatty::settings::Settings;
use chatty::terminal::{self, TerminalSurface};
use tracing_subscriber::EnvFilter;

/// Entry point.
///
/// 1. Read settings (defaults, JSON file, `CHATTY_*` environment)
/// 2. Initialize tracing on stderr so stdout belongs to the conversation, then
///    report a skipped settings file
/// 3. Open the configured message store
/// 4. Run the terminal conversation loop until `/quit` or end of input
fn main() -> ExitCode {
    let config_path = std::env::var_os("CHATTY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    let loaded = Settings::extract(&config_path);
    let settings = &loaded.settings;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    loaded.log_file_error(&config_path);

    if !config_path.exists()
        && let Err(error) = settings.persist(&config_path)
    {
        tracing::warn!("could not write default settings: {}", error);
    }

    let store = match terminal::open_store(&settings.store_location()) {
        Ok(store) => store,
        Err(error) => {
            tracing::error!("{}", error);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(database = %settings.database, "starting conversation");
    let mut presenter = ConversationPresenter::new(store);
    let mut surface = TerminalSurface::new(std::io::stdout(), settings.viewport_rows);

    match terminal::run(&mut presenter, std::io::stdin().lock(), &mut surface) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{}", error);
            ExitCode::FAILURE
        }
    }
}
