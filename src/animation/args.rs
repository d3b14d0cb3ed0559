use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "cpuparrot", version, long_about = None)]
#[command(about = "Animated tray icon showing current CPU usage", long_about = None)]
pub struct AppArgs {
    #[arg(long, help = "Stay attached to the launching terminal instead of detaching")]
    pub foreground: bool,
    #[arg(
        long,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    #[arg(
        long = "initial-interval",
        help = "Delay before the first tick in milliseconds",
        default_value_t = 50,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub initial_interval_ms: u64,
}
