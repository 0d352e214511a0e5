//! UDP transport. One socket per host, bound to the listen port with
//! broadcast enabled; multicast targets are joined on bind.

use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::{Inbox, Outbound};
use super::targets::local_addresses;
use crate::error::TransportError;

pub struct UdpTransport {
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
    local_addresses: HashSet<IpAddr>,
    port: u16,
}

impl UdpTransport {
    /// Binds `0.0.0.0:listen_port`. A bind failure is fatal for the host.
    pub async fn bind(listen_port: u16, targets: Vec<SocketAddr>) -> Result<Self, TransportError> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), listen_port);
        let groups: Vec<Ipv4Addr> = targets
            .iter()
            .filter_map(|target| match target.ip() {
                IpAddr::V4(ip) if ip.is_multicast() => Some(ip),
                _ => None,
            })
            .collect();

        let std_socket = Self::open_socket(addr, &groups)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let socket =
            UdpSocket::from_std(std_socket).map_err(|source| TransportError::Bind { addr, source })?;
        let port = socket
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?
            .port();

        info!(port, ?targets, "transport bound");
        Ok(Self {
            socket,
            targets,
            local_addresses: local_addresses(),
            port,
        })
    }

    fn open_socket(addr: SocketAddr, groups: &[Ipv4Addr]) -> io::Result<std::net::UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        for group in groups {
            socket.join_multicast_v4(group, &Ipv4Addr::UNSPECIFIED)?;
        }
        Ok(socket.into())
    }

    pub fn local_port(&self) -> u16 {
        self.port
    }

    /// Broadcasts loop back to the sender; those copies carry one of our own
    /// addresses and our own port.
    pub fn is_self_echo(&self, source: SocketAddr) -> bool {
        source.port() == self.port && self.local_addresses.contains(&source.ip())
    }

    /// Waits for the next datagram, skipping our own echoes.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        loop {
            let (len, source) = self
                .socket
                .recv_from(buf)
                .await
                .map_err(TransportError::Recv)?;
            if self.is_self_echo(source) {
                continue;
            }
            debug!(%source, len, "datagram received");
            return Ok((len, source));
        }
    }
}

#[async_trait]
impl Inbox for UdpTransport {
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        UdpTransport::recv(self, buf).await
    }
}

#[async_trait]
impl Outbound for UdpTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(source) = self.socket.send_to(payload, target).await {
                first_error.get_or_insert(TransportError::Send {
                    target: *target,
                    source,
                });
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
