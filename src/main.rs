use acme_r53::{
    keys, Account, Api, Error, Identifier, OrderOrchestrator, PollConfig, Route53Provider,
    LETS_ENCRYPT_PRODUCTION_URL, LETS_ENCRYPT_STAGING_URL,
};
use clap::{Args, Parser, Subcommand};
use std::{
    io,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const DEFAULT_ACCOUNT_KEY: &str = "account.pem";
const DEFAULT_CERTIFICATE_KEY: &str = "domain.pem";
const MAX_POOLED_NONCES: usize = 16;

/// Obtain certificates from Let's Encrypt by answering DNS-01 challenges in
/// Amazon Route 53
#[derive(Parser)]
#[command(name = "acme-r53", version)]
struct Cli {
    /// Use the Let's Encrypt staging environment
    #[arg(long, global = true)]
    staging: bool,

    /// Existing account private key (generated at ./account.pem when omitted)
    #[arg(long, global = true, value_name = "account.pem")]
    account: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register an ACME account for the account key
    Register(RegisterArgs),
    /// Order a certificate, printing the PEM chain to stdout
    Sign(SignArgs),
}

#[derive(Args)]
struct RegisterArgs {
    /// Contact email address for the account
    #[arg(long)]
    email: String,

    /// Agree to the certificate authority's terms of service
    #[arg(long)]
    agree_terms: bool,
}

#[derive(Args)]
struct SignArgs {
    /// Domain private key (generated at ./domain.pem when omitted)
    #[arg(long, value_name = "domain.pem")]
    domain: Option<PathBuf>,

    /// Domains to certify; the first becomes the common name, and a `*.`
    /// prefix requests a wildcard
    #[arg(required = true, value_name = "DOMAIN")]
    domains: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "operation failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let directory_url = if cli.staging {
        LETS_ENCRYPT_STAGING_URL
    } else {
        LETS_ENCRYPT_PRODUCTION_URL
    };

    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let api = Api::from_url(directory_url, http, MAX_POOLED_NONCES).await?;

    let account_key =
        keys::load_or_generate(cli.account.as_deref(), Path::new(DEFAULT_ACCOUNT_KEY)).await?;

    match cli.command {
        Command::Register(args) => {
            let account = Account::register(api, account_key, &args.email, args.agree_terms).await?;

            info!(kid = account.id(), "account registered");
        }
        Command::Sign(args) => {
            let account = Account::lookup(api, account_key).await?;
            let identifiers: Vec<Identifier> =
                args.domains.iter().map(|domain| Identifier::parse(domain)).collect();

            // Resolve the certificate key before touching any remote state
            let certificate_key = keys::load_or_generate(
                args.domain.as_deref(),
                Path::new(DEFAULT_CERTIFICATE_KEY),
            )
            .await?;

            let dns = Route53Provider::from_env().await;
            let orchestrator = OrderOrchestrator::new(&account, &dns, PollConfig::default());

            let certificate = orchestrator.issue(&identifiers, &certificate_key).await?;
            print!("{certificate}");
        }
    }

    Ok(())
}
