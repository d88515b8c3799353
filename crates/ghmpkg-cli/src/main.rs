use std::{env, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use error::{CliError, CliResult};
use ghmpkg_config::{
    config::{Config, CONFIG_PATH},
    env::{collect_overrides, load_dotenv},
};
use ghmpkg_events::{ChannelSink, EventSinkHandle, NullSink};
use ghmpkg_operations::{export, pull, sync, MigrateContext};
use ghmpkg_utils::path::resolve_path;
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use report::print_report;
use tracing::debug;
use utils::{progress_enabled, set_color, set_progress};

mod cli;
mod error;
mod logging;
mod progress;
mod report;
mod utils;

fn create_context(config: Config) -> CliResult<(MigrateContext, Option<ProgressGuard>)> {
    if progress_enabled() {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        let ctx = MigrateContext::new(config, events)?;
        let guard = spawn_event_handler(receiver);
        Ok((ctx, Some(guard)))
    } else {
        let events: EventSinkHandle = Arc::new(NullSink);
        Ok((MigrateContext::new(config, events)?, None))
    }
}

/// Layers `.env`, the process environment and command-line flags, in rising precedence.
fn load_config(args: &Args) -> CliResult<Config> {
    if let Some(ref path) = args.config {
        let path = resolve_path(path)?;
        if let Ok(mut config_path) = CONFIG_PATH.write() {
            *config_path = path;
        }
    }

    let dotenv = env::current_dir()
        .map_err(|source| {
            CliError::IoError {
                action: "current directory".into(),
                source,
            }
        })
        .map(|dir| dir.join(".env"))?;
    let mut overrides = collect_overrides(load_dotenv(&dotenv)?, env::vars());
    overrides.extend(args.settings.overrides());

    let config = Config::new(&overrides)?;
    debug!(types = ?config.package_types(), "resolved configuration");
    Ok(config)
}

async fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    setup_logging(&args);
    if args.no_color {
        set_color(false);
    }
    if args.no_progress || args.json {
        set_progress(false);
    }

    let config = load_config(&args)?;
    let (ctx, progress_guard) = create_context(config)?;

    let result = match args.command {
        Commands::Export => export(&ctx).await,
        Commands::Pull => pull(&ctx).await,
        Commands::Sync => sync(&ctx).await,
    };

    // Drop the context first to close the event channel, then join the
    // progress handler thread so remaining events are fully drained.
    drop(ctx);
    if let Some(guard) = progress_guard {
        guard.finish();
    }
    progress::stop();

    let summary = result?;
    print_report(&summary, args.json)?;
    if summary.has_failures() {
        return Err(CliError::Failures {
            title: summary.title,
        });
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
