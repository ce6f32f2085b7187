use anyhow::{bail, Result};
use clap::Parser;
use fmirror_core::{
    combine_settings, find_config_paths, run_command_loop, sanitize, start_listening, SyncTuning,
};
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fmirror", version, about = "Mirror a filtered directory tree, kept in sync")]
struct Cli {
    /// Directory to start config discovery from (defaults to the current
    /// directory). The watched root is the project config's directory when
    /// one is found.
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let start_dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    info!(
        "File sync starting in {} ...",
        sanitize(&start_dir.to_string_lossy())
    );

    let paths = find_config_paths(&start_dir);
    if let Some(user) = &paths.user {
        info!("Found user config at {}", user.display());
    }
    if let Some(project) = &paths.project {
        info!("Found project config at {}", project.display());
    }

    let settings = combine_settings(&paths)?;
    if settings.output_folder.as_os_str().is_empty() {
        bail!("no output folder configured; set outputFolder in a config file");
    }
    let root = paths.listen_dir(&start_dir);

    let cancel = CancellationToken::new();
    let handle = start_listening(root, settings, cancel.clone(), SyncTuning::default())?;

    // stdin drives sync / clear / exit; Ctrl-C stops like `exit` does
    let commands = tokio::spawn(run_command_loop(
        BufReader::new(tokio::io::stdin()),
        handle.controller(),
    ));
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    handle.wait().await;
    ctrl_c.abort();
    commands.abort();
    Ok(())
}
