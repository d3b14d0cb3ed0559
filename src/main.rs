// The tray needs no console on windows. Disable during development to see stdout.
#![windows_subsystem = "windows"]

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use cpuparrot::{
    animation::{args::AppArgs, start_tray_app},
    utils::{
        dir::{absolute_dir, create_application_default_path, ensure_dir},
        logging::{enable_logging, LOG_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

fn main() -> Result<()> {
    let args = AppArgs::parse();

    // Resolved before detaching, the detached process runs from `/`.
    let app_dir = match &args.dir {
        Some(dir) => {
            let dir = absolute_dir(dir)?;
            ensure_dir(&dir)?;
            dir
        }
        None => create_application_default_path()?,
    };

    #[cfg(unix)]
    if !args.foreground && detach()? {
        return Ok(());
    }

    run(args, app_dir)
}

/// Forks into the background. Returns true in the parent, which should exit right away.
#[cfg(unix)]
fn detach() -> Result<bool> {
    use daemonize::{Daemonize, Outcome};

    let outcome = Daemonize::new()
        .stdout(daemonize::Stdio::devnull())
        .stderr(daemonize::Stdio::devnull())
        .execute();
    match outcome {
        Outcome::Parent(parent) => {
            parent.inspect_err(|e| eprintln!("Failed to detach from terminal {e:?}"))?;
            println!("Started tray in the background");
            Ok(true)
        }
        Outcome::Child(child) => {
            child?;
            Ok(false)
        }
    }
}

fn run(args: AppArgs, app_dir: PathBuf) -> Result<()> {
    enable_logging(LOG_PREFIX, &app_dir.join("logs"), args.log, args.log_console)?;

    let initial_interval = Duration::from_millis(args.initial_interval_ms);
    single_thread_runtime()?
        .block_on(start_tray_app(initial_interval))
        .inspect_err(|e| error!("Tray application failed {e:?}"))
}
