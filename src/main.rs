mod demo;
mod host;

use clap::Parser;
use host::Host;
use nucleus_core::commands::CommandRegistry;
use nucleus_core::config::{CommandsConfig, CoreConfig};
use nucleus_core::messages::MessageBundle;
use nucleus_core::services::scheduler::TokioScheduler;
use nucleus_core::services::{Services, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding nucleus.toml and the commands config
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
    /// Write the command documentation as JSON to this file and exit
    #[arg(long, value_name = "FILE")]
    docgen: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    let logfile = tracing_appender::rolling::daily("./logs", "nucleus.log");
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("NUCLEUS_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_writer(logfile.and(std::io::stdout))
        .with_env_filter(env_filter)
        .init();

    let args = Args::parse();
    let config = Arc::new(CoreConfig::load(&args.config_dir.join("nucleus.toml"))?);
    let commands_path = args.config_dir.join(&config.commands_file);
    let mut commands_config = CommandsConfig::load(&commands_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("Nucleus worker")
        .enable_time()
        .build()?;
    let (scheduler, main_thread) = TokioScheduler::new(runtime.handle().clone());
    let services = Services::new(
        Arc::new(host::ConsolePermissions),
        Arc::new(MessageBundle::default()),
        Arc::new(scheduler),
        Arc::new(SystemClock),
        config,
    );

    let mut registry = CommandRegistry::new(services);
    demo::register_commands(&mut registry);
    let dispatcher = registry.build(&mut commands_config)?;
    if commands_config.save()? {
        info!("Wrote command defaults to {}", commands_path.display());
    }

    if let Some(path) = args.docgen {
        std::fs::write(&path, dispatcher.documentation_json()?)?;
        info!("Wrote documentation for {} commands to {}", dispatcher.controls().count(), path.display());
        return Ok(());
    }

    Host::new(dispatcher, main_thread)?.run();
    Ok(())
}
