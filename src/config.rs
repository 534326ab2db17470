use crate::error::Error;
use crate::token::Secrets;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_server::client::rr::{LowerName, Name};

pub type SharedConfig = Arc<Config>;

pub const DEFAULT_PORT: u16 = 55553;
pub const DEFAULT_TTL: u32 = 600;

/// TXT map key for queries at the apex of the configured domain.
pub const APEX_KEY: &str = ".";

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_udp_bind_addr")]
    pub dns_udp_bind_addr: SocketAddr,
    #[serde(default)]
    pub dns_tcp_bind_addr: Option<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_tcp_timeout")]
    pub dns_tcp_timeout: Duration,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(flatten)]
    pub service: Service,
}

/// The resolver a server instance runs.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum Service {
    /// Answer `A` queries for signed token hostnames, and `TXT` queries from a static map.
    Token(TokenService),
    /// Answer queries under configured suffixes with rewritten `CNAME` records.
    Cname(CnameService),
}

#[derive(Deserialize, Debug, Clone)]
pub struct TokenService {
    pub domain: LowerName,
    pub secrets: Secrets,
    /// TXT payloads keyed by subdomain, or [`APEX_KEY`] for the domain itself.
    #[serde(default)]
    pub txt_records: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CnameService {
    pub rules: Vec<MappingRule>,
}

/// Rewrites names ending in `source` to `CNAME`s ending in `target`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub source: String,
    pub target: String,
}

fn default_udp_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

fn default_tcp_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

impl Config {
    /// Load a [`Config`] from the JSON file at the given path, or return an Error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the path can't be opened or read, and [`Error::InvalidJSON`] if
    /// the content isn't a valid configuration.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        Ok(conf)
    }

    /// Build a token service [`Config`] from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::try_from_env_vars`].
    pub fn try_from_env() -> Result<Self, Error> {
        Self::try_from_env_vars(std::env::vars())
    }

    /// Build a token service [`Config`] from `PORT`, `TTL`, `DOMAIN` and `SECRETS` (comma
    /// separated, newest first) or `SECRET`. The server listens on UDP only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEnv`] if `DOMAIN` or both of `SECRETS` and `SECRET` are unset,
    /// [`Error::InvalidEnv`] if `PORT` or `TTL` aren't numbers, [`Error::InvalidDomain`] if
    /// `DOMAIN` isn't a DNS name, and [`Error::NoSecrets`] or [`Error::EmptySecret`] for an
    /// unusable secret list.
    pub fn try_from_env_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let port = parse_env(&vars, "PORT")?.unwrap_or(DEFAULT_PORT);
        let ttl = parse_env(&vars, "TTL")?.unwrap_or(DEFAULT_TTL);
        let domain = vars.get("DOMAIN").ok_or(Error::MissingEnv("DOMAIN"))?;
        let domain = Name::from_str(domain)
            .map_err(|err| Error::InvalidDomain(domain.clone(), err))?;
        let secrets = match (vars.get("SECRETS"), vars.get("SECRET")) {
            (Some(secrets), _) => Secrets::new(secrets.split(','))?,
            (None, Some(secret)) => Secrets::new([secret])?,
            (None, None) => return Err(Error::MissingEnv("SECRETS")),
        };

        Ok(Config {
            dns_udp_bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            dns_tcp_bind_addr: None,
            dns_tcp_timeout: default_tcp_timeout(),
            ttl,
            service: Service::Token(TokenService {
                domain: domain.into(),
                secrets,
                txt_records: HashMap::default(),
            }),
        })
    }
}

fn parse_env<T: FromStr>(
    vars: &HashMap<String, String>,
    var: &'static str,
) -> Result<Option<T>, Error> {
    vars.get(var)
        .map(|value| {
            value.parse().map_err(|_| Error::InvalidEnv {
                var,
                value: value.clone(),
            })
        })
        .transpose()
}
