//! Stateless DNS
//!
//! An authoritative DNS server that derives every answer from the query itself, so that any
//! number of interchangeable instances can serve a domain without storage or coordination.
//!
//! Clients are issued hostnames whose first label is a signed [token][crate::token] carrying
//! an IPv4 address and an expiry time. Any instance sharing one of the signing
//! [secrets][crate::token::Secrets] verifies the token and answers with the address until the
//! token expires. Secrets can be rotated by configuring the new secret first and keeping the
//! old one until the tokens it signed have expired.
//!
//! A second [resolver][crate::resolver::CnameRewriter] answers queries under configured
//! suffixes with `CNAME`s computed from the query name.
//!
#![warn(clippy::pedantic)]

pub mod config;
pub mod dns;
pub mod error;
pub mod resolver;
pub mod token;

pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use resolver::{CnameRewriter, DynResolver, Resolver, TokenResolver};
pub use token::{create_hostname, Secrets};
