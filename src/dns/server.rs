use crate::config::SharedConfig;
use crate::dns::handlers::Handler;
use crate::resolver::DynResolver;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

/// Build a DNS server answering with `resolver` on the configured UDP socket, and the TCP
/// listener if one is configured.
///
/// # Errors
///
/// Returns an error if a socket can't be bound.
pub async fn new(
    config: SharedConfig,
    resolver: DynResolver,
) -> anyhow::Result<ServerFuture<Handler>> {
    let dns_handler = Handler::new(resolver);
    let mut dns_server = ServerFuture::new(dns_handler);
    dns_server.register_socket(UdpSocket::bind(config.dns_udp_bind_addr).await?);
    if let Some(tcp_addr) = config.dns_tcp_bind_addr {
        dns_server.register_listener(TcpListener::bind(tcp_addr).await?, config.dns_tcp_timeout);
    }
    Ok(dns_server)
}
