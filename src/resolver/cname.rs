use crate::config::MappingRule;
use crate::resolver::Resolver;
use tracing::debug;
use trust_dns_server::client::op::LowerQuery;
use trust_dns_server::client::rr::{DNSClass, Name, RData, Record};

/// Stands in for a `.` inside a single label of a rewritten name.
pub const ESCAPE_TOKEN: &str = "-dot-";

/// Answers `IN` queries for names under a rule's source suffix with a `CNAME` to the same
/// prefix, unescaped, under the rule's target suffix.
///
/// E.g. with the rule `.proxy.example.com` → `.example.net`, a query for
/// `www-dot-shop.proxy.example.com` is answered with `CNAME www.shop.example.net.`
///
/// Every matching rule produces an answer.
#[derive(Debug, Clone)]
pub struct CnameRewriter {
    rules: Vec<MappingRule>,
    ttl: u32,
}

impl CnameRewriter {
    pub fn new(rules: &[MappingRule], ttl: u32) -> Self {
        let rules = rules
            .iter()
            .map(|rule| MappingRule {
                source: relative(&rule.source).to_ascii_lowercase(),
                target: relative(&rule.target).to_string(),
            })
            .collect();
        CnameRewriter { rules, ttl }
    }

    fn rewrite(rule: &MappingRule, name: &str) -> Option<String> {
        let prefix = name.strip_suffix(rule.source.as_str())?;
        Some(format!("{}{}", prefix.replace(ESCAPE_TOKEN, "."), rule.target))
    }

    fn target_name(target: &str) -> Option<Name> {
        match Name::from_ascii(target) {
            Ok(mut name) => {
                name.set_fqdn(true);
                Some(name)
            }
            Err(err) => {
                debug!("skipping invalid CNAME target \"{target}\": {err}");
                None
            }
        }
    }
}

impl Resolver for CnameRewriter {
    fn answer(&self, query: &LowerQuery) -> Vec<Record> {
        if query.query_class() != DNSClass::IN {
            return Vec::new();
        }
        let name = query.name().to_string();
        let name = relative(&name);
        self.rules
            .iter()
            .filter_map(|rule| Self::rewrite(rule, name))
            .filter_map(|target| Self::target_name(&target))
            .map(|target| Record::from_rdata(query.name().into(), self.ttl, RData::CNAME(target)))
            .collect()
    }
}

fn relative(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
