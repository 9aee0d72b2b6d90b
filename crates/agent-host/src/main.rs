use agent_host::config::Cli;
use agent_host::config::Commands;
use agent_host::session;
use agent_host::AgentMetrics;
use agent_host::NativeLibrary;
use agent_host::RestoreRequest;
use agent_host::Telemetry;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use utils::logging;
use utils::version;

const SUCCESS_MESSAGE: &str = "Agent ran successfully";

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    let _guard = match &cli.global.log_file {
        Some(log_file) => Some(
            logging::init_with_file(log_file)
                .with_context(|| format!("initialize logging to {}", log_file.display()))?,
        ),
        None => {
            logging::init();
            None
        }
    };

    tracing::info!(
        "Starting agent host {} (branch {})",
        &**version::VERSION,
        version::branch().unwrap_or("unknown")
    );

    let telemetry =
        Telemetry::init(&cli.global.telemetry_config()).context("initialize telemetry")?;

    let result = run(cli, telemetry.metrics());
    telemetry.shutdown();
    result?;

    println!("{SUCCESS_MESSAGE}");
    Ok(())
}

fn run(cli: Cli, metrics: &AgentMetrics) -> Result<()> {
    let library = NativeLibrary::load(&cli.global.library)
        .with_context(|| format!("load agent library {}", cli.global.library.display()))?;

    match cli.command.unwrap_or_else(|| Commands::Backup(Default::default())) {
        Commands::Backup(args) => {
            let request = args.into_request().context("read backup payload")?;
            session::run_backup(&library, &request, metrics).context("backup")?;
        }
        Commands::Restore(args) => {
            let request = RestoreRequest::from(args);
            session::run_restore(&library, &request, metrics).context("restore")?;
        }
    }
    Ok(())
}
