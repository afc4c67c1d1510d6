use anyhow::{Context, Result};
use capitol_app::bootstrap::{self, Capitol};
use capitol_app::cli::{Cli, Command};
use clap::Parser;
use capitol_app::commands::{account, health, run, serve};
use capitol_app::config::Config;
use capitol_app::load::spawn_load_sampler;
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOAD_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = Cli::parse().command;
    if let Command::WriteConfig { path } = &command {
        Config::default().save(path)?;
        println!("Wrote default configuration to {path}");
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;
    let stores = bootstrap::open_stores(&config)?;
    let capitol = bootstrap::build(&config, stores)?;
    execute(&capitol, command).await
}

async fn execute(capitol: &Capitol, command: Command) -> Result<()> {
    match command {
        Command::Run(args) => {
            let tier = args.tier;
            let response = run::run(capitol, args.into_job()?, tier).await?;
            print_json(&response)?;
            if !response.approved {
                std::process::exit(2);
            }
        }
        Command::User { user_id, tier } => {
            print_json(&account::provision(capitol, &user_id, tier).await?)?;
        }
        Command::Coins { user_id, op } => match op {
            Some(op) => {
                let outcome = account::apply(capitol, &user_id, &op.into()).await;
                print_json(&outcome)?;
                if !outcome.allowed {
                    anyhow::bail!(outcome.reason.unwrap_or_else(|| "Refused".to_string()));
                }
            }
            None => print_json(&account::view(capitol, &user_id).await?)?,
        },
        Command::Health => {
            let report = health::health(capitol).await;
            print_json(&report)?;
            if report.snapshot.is_degraded() {
                anyhow::bail!("Health check failed");
            }
        }
        Command::Compliance => print_json(&health::compliance(capitol).await?)?,
        Command::Serve => {
            let sampler = spawn_load_sampler(capitol.stores.health.clone(), LOAD_SAMPLE_INTERVAL);
            let result = serve::serve(capitol, tokio::io::stdin(), tokio::io::stdout()).await;
            sampler.abort();
            result?;
        }
        Command::WriteConfig { .. } => {}
    }
    Ok(())
}
