//! In-process integration tests for the DNS server.
//!
//! These start the real server components on a loopback UDP socket and
//! exchange raw datagrams with a plain std socket, the way a resolver
//! would.

use std::net::{IpAddr, SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::Duration;

use seedns::dns::{bind_socket, run_server, Responder, ServerStats, Zone};
use seedns::seeds::{AddressSelector, StaticSeedList};

fn test_zone() -> Zone {
    Zone {
        host: "seed.example.org".to_string(),
        ns: "ns1.example.org".to_string(),
        mbox: Some("hostmaster.example.org".to_string()),
        data_ttl: 60,
        ns_ttl: 86400,
    }
}

fn test_seeds() -> StaticSeedList {
    StaticSeedList::new([
        "203.0.113.7".parse::<IpAddr>().unwrap(),
        "203.0.113.21".parse::<IpAddr>().unwrap(),
        "2001:db8::1".parse::<IpAddr>().unwrap(),
    ])
}

/// Start a server with the given selector; returns its address and stats.
async fn start_server<S: AddressSelector + 'static>(
    zone: Zone,
    selector: S,
) -> (SocketAddr, Arc<ServerStats>) {
    let socket = bind_socket("127.0.0.1:0".parse().unwrap(), false).unwrap();
    let addr = socket.local_addr().unwrap();
    let responder = Arc::new(Responder::new(zone, selector));
    let stats = Arc::new(ServerStats::new());
    let server_stats = Arc::clone(&stats);
    tokio::spawn(async move {
        let _ = run_server(socket, responder, server_stats).await;
    });
    (addr, stats)
}

/// Build a single-question query datagram.
fn build_query(domain: &str, qtype: u16, id: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&[0x01, 0x00]); // RD=1
    buf.extend_from_slice(&[0x00, 0x01]); // QDCOUNT = 1
    buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    for label in domain.split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    buf.extend_from_slice(&qtype.to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x01]); // IN
    buf
}

/// Send one datagram and wait for a reply.
fn exchange(server: SocketAddr, query: &[u8]) -> std::io::Result<Vec<u8>> {
    let socket = StdUdpSocket::bind("127.0.0.1:0")?;
    socket.set_read_timeout(Some(Duration::from_secs(2)))?;
    socket.send_to(query, server)?;
    let mut buf = [0u8; 512];
    let (len, _) = socket.recv_from(&mut buf)?;
    Ok(buf[..len].to_vec())
}

fn counts(reply: &[u8]) -> (u16, u16, u16, u16) {
    (
        u16::from_be_bytes([reply[4], reply[5]]),
        u16::from_be_bytes([reply[6], reply[7]]),
        u16::from_be_bytes([reply[8], reply[9]]),
        u16::from_be_bytes([reply[10], reply[11]]),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_a_query_end_to_end() {
    let (addr, _) = start_server(test_zone(), test_seeds()).await;

    let query = build_query("seed.example.org", 1, 0x1234);
    let reply = exchange(addr, &query).unwrap();

    assert!(reply.len() <= 512);
    assert_eq!(&reply[..2], &[0x12, 0x34]);
    assert_ne!(reply[2] & 0x80, 0, "QR set");
    assert_ne!(reply[2] & 0x04, 0, "AA set");
    assert_eq!(reply[3] & 0x0F, 0, "NOERROR");

    let (qd, an, ns, ar) = counts(&reply);
    assert_eq!(qd, 1);
    assert_eq!(an, 2, "both IPv4 seeds answered");
    assert_eq!(ns, 1, "NS in authority");
    assert_eq!(ar, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_aaaa_query_end_to_end() {
    let (addr, _) = start_server(test_zone(), test_seeds()).await;

    let query = build_query("seed.example.org", 28, 0x0a0b);
    let reply = exchange(addr, &query).unwrap();

    let (_, an, ns, _) = counts(&reply);
    assert_eq!(an, 1, "one IPv6 seed answered");
    assert_eq!(ns, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_out_of_zone_is_refused() {
    let (addr, _) = start_server(test_zone(), test_seeds()).await;

    let query = build_query("other.example.org", 1, 0x0001);
    let reply = exchange(addr, &query).unwrap();

    assert_eq!(reply.len(), 12);
    assert_eq!(reply[3] & 0x0F, 5, "REFUSED");
    assert_eq!(counts(&reply), (0, 0, 0, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runt_datagram_gets_no_reply() {
    let (addr, stats) = start_server(test_zone(), test_seeds()).await;

    let socket = StdUdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
    socket.send_to(&[0u8; 5], addr).unwrap();

    let mut buf = [0u8; 512];
    assert!(socket.recv_from(&mut buf).is_err(), "no reply expected");

    // a valid query still works afterwards, and both datagrams counted
    let query = build_query("seed.example.org", 1, 7);
    let reply = exchange(addr, &query).unwrap();
    assert_eq!(reply[3] & 0x0F, 0);
    assert_eq!(stats.requests(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_counter_increments() {
    let (addr, stats) = start_server(test_zone(), test_seeds()).await;

    for id in 0..3u16 {
        let query = build_query("seed.example.org", 1, id);
        exchange(addr, &query).unwrap();
    }
    assert_eq!(stats.requests(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_pool_negative_response() {
    let (addr, _) = start_server(test_zone(), StaticSeedList::new([])).await;

    let query = build_query("seed.example.org", 1, 0x0042);
    let reply = exchange(addr, &query).unwrap();

    assert_eq!(reply[3] & 0x0F, 0);
    let (_, an, ns, _) = counts(&reply);
    assert_eq!(an, 0);
    assert_eq!(ns, 1, "SOA negative response in authority");
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reuse_port_binds_twice() {
    let first = bind_socket("127.0.0.1:0".parse().unwrap(), true).unwrap();
    let addr = first.local_addr().unwrap();
    let second = bind_socket(addr, true);
    assert!(second.is_ok(), "second SO_REUSEPORT bind should succeed");
}
