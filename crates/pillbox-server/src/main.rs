use clap::Parser;
use pillbox_logging::PillboxSubscriberBuilder;
use pillbox_server::cli::{Cli, Command};
use pillbox_server::{DataServer, IndexDataServer, LookupRequest, ServerConfig, seed};
use serde::Serialize;

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(logdir) = cli.logdir {
        config.logdir = logdir;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    let _guard = PillboxSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .try_init()?;

    match cli.command {
        Command::Seed { logdir } => {
            let seeded = seed::seed_debugger_logdir(&logdir, &config.multiplexer.run_log)?;
            for run in &seeded {
                println!("{}\t{}\t{} records", run.name, run.path.display(), run.records);
            }
        }

        Command::Runs => {
            let server = open_and_reload(&config).await?;
            print_json(&server.multiplexer().list_runs())?;
        }

        Command::Tags { run } => {
            let server = open_and_reload(&config).await?;
            print_json(&server.multiplexer().list_tags(&run)?)?;
        }

        Command::Lookup {
            run,
            tag,
            start,
            end,
        } => {
            let server = open_and_reload(&config).await?;
            let mut request = LookupRequest::new(run, tag);
            if start.is_some() || end.is_some() {
                request = request.with_step_range(start, end);
            }
            print_json(&server.lookup(&request).await?)?;
        }

        Command::HealthPills { run, nodes, step } => {
            let server = open_and_reload(&config).await?;
            print_json(&server.health_pills(&run, &nodes, step).await?)?;
        }
    }

    Ok(())
}

async fn open_and_reload(config: &ServerConfig) -> anyhow::Result<IndexDataServer> {
    let server = IndexDataServer::open(config).await?;
    if !server.refresh(server.request_timeout()).await? {
        anyhow::bail!(
            "Reload of {} did not finish within {}ms",
            config.logdir.display(),
            config.request_timeout_ms
        );
    }
    Ok(server)
}
