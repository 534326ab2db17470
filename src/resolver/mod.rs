//! Stateless resolvers.
//!
//! A [`Resolver`] derives the answer to a question from the question alone, plus the
//! immutable configuration it was built with. Two are provided:
//!
//! * [`token::TokenResolver`] answers `A` queries for hostnames whose first label is a signed
//!   [token][crate::token], and `TXT` queries from a static map.
//! * [`cname::CnameRewriter`] answers queries under configured suffixes with a `CNAME` derived
//!   from the query name.

use crate::config::{Config, Service};
use std::sync::Arc;
use tracing::debug;
use trust_dns_server::client::op::LowerQuery;
use trust_dns_server::client::rr::Record;

pub mod cname;
pub mod token;

pub use cname::CnameRewriter;
pub use token::TokenResolver;

/// `DynResolver` is a type alias for a [`Resolver`] shared between concurrently handled
/// requests.
#[allow(clippy::module_name_repetitions)]
pub type DynResolver = Arc<dyn Resolver + Send + Sync>;

/// Produces the answer records for a single question.
///
/// Questions that can't be answered, for whatever reason, produce no records.
pub trait Resolver {
    fn answer(&self, query: &LowerQuery) -> Vec<Record>;
}

/// Answer every question in `queries`, in order, collecting all of the records.
pub fn answer_all(resolver: &dyn Resolver, queries: &[LowerQuery]) -> Vec<Record> {
    queries
        .iter()
        .flat_map(|query| {
            let records = resolver.answer(query);
            debug!(
                "  question {} {} {}: {} answer(s)",
                query.name(),
                query.query_class(),
                query.query_type(),
                records.len()
            );
            records
        })
        .collect()
}

/// Build the resolver for the configured [`Service`].
pub fn from_config(config: &Config) -> DynResolver {
    match &config.service {
        Service::Token(service) => Arc::new(TokenResolver::new(service, config.ttl)),
        Service::Cname(service) => Arc::new(CnameRewriter::new(&service.rules, config.ttl)),
    }
}
