//! Stateless DNS server.
//!
//! Every question in a request is answered by the configured
//! [`Resolver`][crate::resolver::Resolver], and the answers of all questions are sent back in a
//! single authoritative response. The response is sent even if there are no answers: a
//! hostname with an expired token, a bad signature, or under another domain all get the same
//! empty `NOERROR` reply. Requests that aren't standard queries get `NOTIMP`.
//!
//! # Token hostnames
//!
//! With config:
//! ```json
//! {
//!   "service": "token",
//!   "domain": "test-domain.co.uk",
//!   "secrets": ["no-secret"],
//!   "txt_records": { ".": "TLD TXT", "abc": "abc TXT" },
//!   ...
//! }
//! ```
//!
//! A hostname issued out of band, e.g. with the `issue` command:
//!
//! ```bash
//! ❯ stateless-dns issue --config config.json 127.0.0.1
//! ahaaaaabaaaaaaa...qyd5q.test-domain.co.uk
//! ```
//!
//! resolves to the IP it carries until it expires:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 55553 +short ahaaaaabaaaaaaa...qyd5q.test-domain.co.uk A
//! 127.0.0.1
//! ```
//!
//! `TXT` queries for the domain itself are answered from the `"."` entry of `txt_records`, and
//! for its subdomains from the entry of the same name:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 55553 +short abc.test-domain.co.uk TXT
//! "abc TXT"
//! ```
//!
//! # CNAME rewriting
//!
//! With config:
//! ```json
//! {
//!   "service": "cname",
//!   "rules": [ { "source": ".proxy.example.com", "target": ".example.net" } ],
//!   ...
//! }
//! ```
//!
//! Names under `proxy.example.com` are answered with a `CNAME`, with each `-dot-` turned into
//! a `.`:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 55553 +short www-dot-shop.proxy.example.com
//! www.shop.example.net.
//! ```

mod handlers;
pub mod server;

pub use server::new;
