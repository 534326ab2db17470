use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;
use stateless_dns::config::Service;
use stateless_dns::error::Error::DNSError;
use stateless_dns::{Config, SharedConfig};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stateless-dns")]
#[command(version)]
#[command(about = "Stateless DNS - answers queries for signed, self-describing hostnames")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the DNS server
    Serve {
        /// Configuration file path, the environment is used if omitted
        #[arg(short = 'c', long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print a signed hostname resolving to IP
    Issue {
        /// Configuration file path, the environment is used if omitted
        #[arg(short = 'c', long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Address the hostname resolves to
        ip: Ipv4Addr,

        /// Seconds until the hostname expires
        #[arg(long, default_value_t = 10 * 60 * 60)]
        valid_for: i64,

        /// Sign with this secret instead of the first configured one
        #[arg(long)]
        secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    match Cli::parse().command {
        Command::Serve { config } => serve(config_init(config)?).await,
        Command::Issue {
            config,
            ip,
            valid_for,
            secret,
        } => {
            let config = config_init(config)?;
            issue(&config, ip, valid_for, secret)
        }
    }
}

async fn serve(config: SharedConfig) -> Result<()> {
    let resolver = stateless_dns::resolver::from_config(&config);

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    if let Some(tcp_addr) = &config.dns_tcp_bind_addr {
        tracing::info!("DNS listening on TCP {tcp_addr}");
    }
    let dns_server = stateless_dns::dns::new(config.clone(), resolver).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        dns_res = dns_handle => {
            // With no socket left there is nothing to serve.
            tracing::error!("DNS server stopped");
            dns_res?.map_err(DNSError)?;
            return Err(anyhow!("DNS server stopped"));
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

fn issue(config: &Config, ip: Ipv4Addr, valid_for: i64, secret: Option<String>) -> Result<()> {
    let Service::Token(service) = &config.service else {
        return Err(anyhow!("issuing hostnames requires a token service config"));
    };
    let secret = secret.map_or_else(
        || service.secrets.signing_secret().to_vec(),
        String::into_bytes,
    );
    let expires = expiry(OffsetDateTime::now_utc(), valid_for)?;
    let domain = service.domain.to_string();
    let domain = domain.strip_suffix('.').unwrap_or(&domain);
    println!(
        "{}",
        stateless_dns::create_hostname(ip, expires, &secret, domain)
    );
    Ok(())
}

/// The instant `valid_for` seconds after `now`.
fn expiry(now: OffsetDateTime, valid_for: i64) -> Result<OffsetDateTime> {
    if valid_for <= 0 {
        return Err(anyhow!("--valid-for must be positive, got {valid_for}"));
    }
    now.checked_add(Duration::seconds(valid_for))
        .ok_or_else(|| anyhow!("--valid-for {valid_for} is out of range"))
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stateless_dns=info".into()),
        )
        .init();
}

fn config_init(config_file: Option<PathBuf>) -> Result<SharedConfig> {
    let config = match config_file {
        None => {
            tracing::debug!("loading config from the environment");
            Config::try_from_env()?
        }
        Some(config_file) => {
            tracing::debug!("loading config from {}", config_file.display());
            Config::try_from_file(&config_file)?
        }
    };
    Ok(Arc::new(config))
}
