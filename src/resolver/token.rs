use crate::config::{TokenService, APEX_KEY};
use crate::resolver::Resolver;
use crate::token::{self, Secrets};
use std::collections::HashMap;
use time::OffsetDateTime;
use tracing::debug;
use trust_dns_server::client::op::LowerQuery;
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{RData, Record, RecordType};

/// Maximum length of a single TXT character-string.
const MAX_CHARACTER_STRING: usize = 255;

/// Answers `A` queries of the form `<token>.<domain>` with the IP carried by a valid token,
/// and `TXT` queries for the domain and its subdomains from a static map.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct TokenResolver {
    domain: String,
    ttl: u32,
    secrets: Secrets,
    txt_records: HashMap<String, String>,
}

impl TokenResolver {
    pub fn new(service: &TokenService, ttl: u32) -> Self {
        let txt_records = service
            .txt_records
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        TokenResolver {
            domain: relative(&service.domain.to_string()).to_ascii_lowercase(),
            ttl,
            secrets: service.secrets.clone(),
            txt_records,
        }
    }

    /// Answer `query` as if received at `now`.
    pub fn answer_at(&self, query: &LowerQuery, now: OffsetDateTime) -> Vec<Record> {
        let name = query.name().to_string();
        let name = relative(&name);
        let rdata = match query.query_type() {
            RecordType::TXT => self.txt_rdata(name),
            RecordType::A => self.a_rdata(name, now),
            _ => None,
        };
        rdata
            .map(|rd| Record::from_rdata(query.name().into(), self.ttl, rd))
            .into_iter()
            .collect()
    }

    fn txt_rdata(&self, name: &str) -> Option<RData> {
        let key = self.txt_key(name);
        let txt = self.txt_records.get(key)?;
        // Longer values span several character-strings, which clients concatenate.
        let mut strings: Vec<&[u8]> = txt.as_bytes().chunks(MAX_CHARACTER_STRING).collect();
        if strings.is_empty() {
            strings.push(&[]);
        }
        Some(RData::TXT(TXT::from_bytes(strings)))
    }

    fn txt_key<'a>(&self, name: &'a str) -> &'a str {
        if name == self.domain {
            return APEX_KEY;
        }
        name.strip_suffix(self.domain.as_str())
            .and_then(|subdomain| subdomain.strip_suffix('.'))
            .unwrap_or(name)
    }

    fn a_rdata(&self, name: &str, now: OffsetDateTime) -> Option<RData> {
        // Exactly one label, the token, in front of the domain.
        let (label, rest) = name.split_once('.')?;
        if rest != self.domain {
            return None;
        }
        match token::verify(label, &self.secrets, now) {
            Some(ip) => {
                debug!("token for \"{name}\" resolves to {ip}");
                Some(RData::A(ip))
            }
            None => {
                debug!("no valid token for \"{name}\"");
                None
            }
        }
    }
}

impl Resolver for TokenResolver {
    fn answer(&self, query: &LowerQuery) -> Vec<Record> {
        self.answer_at(query, OffsetDateTime::now_utc())
    }
}

/// Strip the root label's trailing dot, if any.
fn relative(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
