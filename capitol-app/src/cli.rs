use anyhow::{Context, Result};
use capitol_core::{JobRequest, Tier};
use clap::{Args, Parser, Subcommand};

/// Governed AI engine pipeline
#[derive(Debug, Parser)]
#[command(name = "capitol")]
#[command(about = "Route, authorize, audit and settle AI engine jobs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAction {
    Award(String),
    Deduct(String),
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit one job and print the response
    Run(RunArgs),

    /// Create or update a profile (awards signup coins once)
    User { user_id: String, tier: Tier },

    /// Show balances, or award/deduct coins for an action
    Coins {
        user_id: String,

        #[command(subcommand)]
        op: Option<CoinsOp>,
    },

    /// Print the health snapshot and run a system audit
    Health,

    /// Print the compliance score and open violations
    Compliance,

    /// Read JSON commands from stdin, one per line
    Serve,

    /// Write the default configuration
    #[command(name = "config")]
    WriteConfig {
        #[arg(default_value = crate::config::DEFAULT_CONFIG_PATH)]
        path: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CoinsOp {
    /// Award the coins configured for an action
    Award { action: String },
    /// Deduct the coins configured for an action
    Deduct { action: String },
}

impl From<CoinsOp> for LedgerAction {
    fn from(op: CoinsOp) -> Self {
        match op {
            CoinsOp::Award { action } => LedgerAction::Award(action),
            CoinsOp::Deduct { action } => LedgerAction::Deduct(action),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    pub user_id: String,
    pub feature: String,
    pub action: String,

    /// Job payload as JSON
    pub payload: Option<String>,

    #[arg(long)]
    pub sub_type: Option<String>,

    /// Caller-supplied id; resubmissions are rejected
    #[arg(long)]
    pub request_id: Option<String>,

    /// Provision the user on this tier before running
    #[arg(long)]
    pub tier: Option<Tier>,

    /// Run output quality checks even for non-generated output
    #[arg(long)]
    pub quality: bool,
}

impl RunArgs {
    pub fn into_job(self) -> Result<JobRequest> {
        let mut job = JobRequest::new(self.user_id, self.feature, self.action);
        if let Some(payload) = self.payload {
            job = job.with_payload(
                serde_json::from_str(&payload).context("Payload must be valid JSON")?,
            );
        }
        if let Some(sub_type) = self.sub_type {
            job = job.with_sub_type(sub_type);
        }
        if let Some(request_id) = self.request_id {
            job = job.with_request_id(request_id);
        }
        if self.quality {
            job = job.requiring_quality();
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("capitol").chain(line.split_whitespace()))
    }

    #[test]
    fn test_parse_run_with_flags() {
        let cli = parse(
            r#"run u1 messaging message {"name":"Dana"} --sub-type linkedin --tier elite"#,
        )
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.tier, Some(Tier::Elite));
        let job = args.into_job().unwrap();
        assert_eq!(job.user_id, "u1");
        assert_eq!(job.action, "message");
        assert_eq!(job.sub_type.as_deref(), Some("linkedin"));
        assert_eq!(job.payload["name"], "Dana");
        assert!(job.request_id.is_none());
    }

    #[test]
    fn test_invalid_payload_is_rejected() {
        let Command::Run(args) = parse("run u1 scanning scan {oops").unwrap().command else {
            panic!("expected run");
        };
        assert!(args.into_job().is_err());
    }

    #[test]
    fn test_parse_coins() {
        let cli = parse("coins u1 award daily_login").unwrap();
        let Command::Coins { user_id, op } = cli.command else {
            panic!("expected coins");
        };
        assert_eq!(user_id, "u1");
        assert_eq!(
            op.map(LedgerAction::from),
            Some(LedgerAction::Award("daily_login".to_string()))
        );

        let cli = parse("coins u1").unwrap();
        assert!(matches!(cli.command, Command::Coins { op: None, .. }));
        assert!(parse("coins u1 steal scan").is_err());
    }

    #[test]
    fn test_parse_config_default_path() {
        let cli = parse("config").unwrap();
        assert!(matches!(
            cli.command,
            Command::WriteConfig { ref path } if path == crate::config::DEFAULT_CONFIG_PATH
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("run u1 scanning").is_err());
        assert!(parse("user u1 platinum").is_err());
        assert!(parse("launch").is_err());
        assert!(parse("").is_err());
    }
}
