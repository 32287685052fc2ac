use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scout_auth::{CustomTokenSigner, MemoryUserDirectory, UserDirectory};
use scout_clients::{IdentityToolkitClient, IdmeClient, ServiceConfig};
use scout_exchange::logger::{self, LoggerConfig, LoggerFormat};
use scout_exchange::{server, ServerConfig, TokenExchange, VerificationPolicy};
use tracing::{info, warn};

const DEV_ISSUER: &str = "scout-exchange-dev@localhost";

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Sets a port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// ID.me groups that count as verified
    #[arg(
        long = "recognized-group",
        env = "IDME_RECOGNIZED_GROUPS",
        value_delimiter = ',',
        default_value = "military"
    )]
    pub recognized_groups: Vec<String>,
    /// Sets the log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LoggerFormat::Json)]
    pub log_format: LoggerFormat,
    /// Keep accounts in memory instead of calling Firebase Auth
    #[arg(long)]
    pub in_memory: bool,
    /// HS256 secret for custom tokens in in-memory mode
    #[arg(long, env = "DEV_SIGNING_SECRET", hide_env_values = true)]
    pub dev_signing_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_logger(LoggerConfig {
        format: args.log_format,
    });

    let config = ServiceConfig::from_env();
    let idme = IdmeClient::new(config.idme.clone(), config.timeout())
        .context("failed to build ID.me client")?;
    let users = user_directory(&args, &config)?;

    let Some(policy) = VerificationPolicy::from_configured(&args.recognized_groups) else {
        anyhow::bail!("no recognized verification group configured");
    };
    info!(groups = ?policy.recognized_groups, "recognized verification groups");

    let exchange = TokenExchange::new(Arc::new(idme), users, policy);
    server::run(
        Arc::new(exchange),
        ServerConfig {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port)),
        },
    )
    .await
}

fn user_directory(args: &Args, config: &ServiceConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
    if args.in_memory {
        let secret = args
            .dev_signing_secret
            .clone()
            .context("--in-memory needs DEV_SIGNING_SECRET")?;
        warn!("accounts are kept in memory and custom tokens are HS256 signed");
        let signer = CustomTokenSigner::with_secret(secret, DEV_ISSUER)?;
        return Ok(Arc::new(MemoryUserDirectory::new(signer)));
    }

    if !config.uses_emulator() {
        config.validate_for_production()?;
    }
    let client = IdentityToolkitClient::from_config(config)
        .context("failed to build Identity Toolkit client")?;
    Ok(Arc::new(client))
}
