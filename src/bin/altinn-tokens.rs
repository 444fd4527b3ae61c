//! Altinn token command-line tool.
//!
//! Prints a single bearer token to stdout so it can be captured by scripts:
//!
//! ```bash
//! export TOKEN_GENERATOR_USERNAME=... TOKEN_GENERATOR_PASSWORD=...
//! altinn-tokens enterprise --org-no 991825827 --scopes altinn:serviceowner
//! altinn-tokens personal --pid 21818297804
//!
//! export MASKINPORTEN_CLIENT_ID=... MASKINPORTEN_JWK="$(base64 -w0 key.json)"
//! altinn-tokens maskinporten --scope altinn:enterprise
//! altinn-tokens consent --consent-request-id <id> --from 21818297804
//! ```
//!
//! Logs go to stderr and are controlled with `RUST_LOG`.

use altinn_tokens::{
    config::{Config, Environment},
    http::build_http_client,
    oauth::{ConsentTokenOrchestrator, ConsentTokenRequest, JwkSigningKey, MaskinportenClient},
    testtools::{PersonIdentity, TestTokenClient},
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "altinn-tokens",
    about = "Fetch Altinn test tokens and Maskinporten access tokens",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Environment selector, overrides ALTINN_ENVIRONMENT
    #[arg(long)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enterprise token from the test-token generator
    Enterprise(EnterpriseArgs),
    /// Personal token from the test-token generator
    Personal(PersonalArgs),
    /// Platform access token from the test-token generator
    Platform(PlatformArgs),
    /// Access token from a self-signed JWT-bearer grant
    Maskinporten(MaskinportenArgs),
    /// Access token bound to an approved consent request
    Consent(ConsentArgs),
    /// Print the public JWK of MASKINPORTEN_JWK for client registration
    PublicJwk,
}

#[derive(Args)]
struct EnterpriseArgs {
    #[arg(long)]
    org_no: String,

    /// Space-separated scopes
    #[arg(long)]
    scopes: String,
}

#[derive(Args)]
struct PersonalArgs {
    /// National identity number
    #[arg(long)]
    pid: String,

    /// User id; when omitted, user and party ids are looked up from the pid
    #[arg(long, requires_all = ["party_id", "party_uuid"])]
    user_id: Option<String>,

    #[arg(long, requires_all = ["user_id", "party_uuid"])]
    party_id: Option<String>,

    #[arg(long, requires_all = ["user_id", "party_id"])]
    party_uuid: Option<String>,

    /// Space-separated scopes, defaults to altinn:portal/enduser
    #[arg(long)]
    scopes: Option<String>,
}

#[derive(Args)]
struct PlatformArgs {
    /// App name, defaults to PLATFORM_TOKEN_APP
    #[arg(long)]
    app: Option<String>,
}

#[derive(Args)]
struct MaskinportenArgs {
    /// Space-separated scopes
    #[arg(long)]
    scope: String,
}

#[derive(Args)]
struct ConsentArgs {
    #[arg(long)]
    consent_request_id: String,

    /// National identity number of the person who gave consent
    #[arg(long = "from")]
    from_person_id: String,

    /// Organization number for on-behalf-of exchanges
    #[arg(long)]
    consumer_org: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "altinn_tokens=info,warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::new()?;
    if let Some(env) = cli.env {
        config.environment = Environment::try_from(env)?;
    }

    tracing::debug!(version = %config.version, environment = %config.environment, "starting");

    let http_client = build_http_client(&config)?;

    let token = match cli.command {
        Commands::PublicJwk => {
            let key = JwkSigningKey::from_encoded(config.maskinporten()?.private_jwk.expose())?;
            println!("{}", serde_json::to_string_pretty(&key.public_jwk())?);
            return Ok(());
        }
        Commands::Enterprise(args) => {
            test_token_client(&config, http_client)?
                .enterprise_token(&args.org_no, &args.scopes)
                .await?
        }
        Commands::Personal(args) => {
            let client = test_token_client(&config, http_client)?;
            match (args.user_id, args.party_id, args.party_uuid) {
                (Some(user_id), Some(party_id), Some(party_uuid)) => {
                    let identity = PersonIdentity {
                        pid: args.pid,
                        user_id,
                        party_id,
                        party_uuid,
                    };
                    client.personal_token(&identity, args.scopes.as_deref()).await?
                }
                _ => {
                    client
                        .personal_token_for_pid(&args.pid, args.scopes.as_deref())
                        .await?
                }
            }
        }
        Commands::Platform(args) => {
            test_token_client(&config, http_client)?
                .platform_access_token(args.app.as_deref())
                .await?
        }
        Commands::Maskinporten(args) => {
            MaskinportenClient::new(http_client, config.maskinporten()?)?
                .access_token(&args.scope)
                .await?
        }
        Commands::Consent(args) => {
            ConsentTokenOrchestrator::new(http_client, config.maskinporten()?)?
                .consent_token(&ConsentTokenRequest {
                    consent_request_id: &args.consent_request_id,
                    from_person_id: &args.from_person_id,
                    consumer_org: args.consumer_org.as_deref(),
                })
                .await?
        }
    };

    println!("{token}");
    Ok(())
}

fn test_token_client(config: &Config, http_client: reqwest::Client) -> Result<TestTokenClient> {
    Ok(TestTokenClient::new(
        http_client,
        config.environment.clone(),
        config.token_generator()?,
    )?)
}
