//! UDP transport for the responder.

use crate::dns::responder::Responder;
use crate::dns::wire::MAX_PACKET_SIZE;
use crate::seeds::AddressSelector;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

/// Counters shared across responder loops.
#[derive(Debug, Default)]
pub struct ServerStats {
    requests: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        ServerStats::default()
    }

    /// Count one received datagram, returning the running total.
    pub fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Datagrams received so far, counted before any processing.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

/// Bind a UDP socket for a responder loop. With `reuse_port`, several
/// loops can bind the same address and the kernel spreads queries
/// across them.
pub fn bind_socket(addr: SocketAddr, reuse_port: bool) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    {
        if reuse_port {
            socket.set_reuse_port(true)?;
        }
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Serve queries on `socket` until the task is dropped. Socket errors
/// are logged and the loop continues; they never affect query handling.
pub async fn run_server<S>(
    socket: UdpSocket,
    responder: Arc<Responder<S>>,
    stats: Arc<ServerStats>,
) -> io::Result<()>
where
    S: AddressSelector + 'static,
{
    let local = socket.local_addr()?;
    info!(
        listen = %local,
        zone = %responder.zone().host,
        ns = %responder.zone().ns,
        "dns server listening"
    );

    let mut inbuf = [0u8; MAX_PACKET_SIZE];
    let mut outbuf = [0u8; MAX_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut inbuf).await {
            Ok(received) => received,
            Err(e) => {
                error!(error = %e, "recv failed");
                continue;
            }
        };
        let request = stats.record_request();
        debug!(request, client = %src, bytes = len, "query received");

        let Some(reply_len) = responder.handle(&inbuf[..len], &mut outbuf) else {
            // runt datagram, no reply
            continue;
        };

        if let Err(e) = socket.send_to(&outbuf[..reply_len], src).await {
            error!(client = %src, error = %e, "send failed");
            continue;
        }
        debug!(client = %src, bytes = reply_len, "reply sent");
    }
}
