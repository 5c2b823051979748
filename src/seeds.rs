//! Address selection for seed answers.

use rand::seq::SliceRandom;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Supplies the addresses served in A/AAAA answers. Called once per
/// accepted query; implementations must be non-blocking.
pub trait AddressSelector: Send + Sync {
    /// Fill `out` with up to `out.len()` addresses of the requested
    /// families for `qname` and return how many were written. The
    /// responder emits them in the returned order.
    fn select(&self, qname: &str, out: &mut [IpAddr], want_v4: bool, want_v6: bool) -> usize;
}

/// Fixed peer pool serving a freshly shuffled sample per query, so
/// resolvers rotate across all configured peers.
pub struct StaticSeedList {
    v4: Vec<Ipv4Addr>,
    v6: Vec<Ipv6Addr>,
}

impl StaticSeedList {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut v4 = Vec::new();
        let mut v6 = Vec::new();
        for addr in addrs {
            match addr {
                IpAddr::V4(a) => v4.push(a),
                IpAddr::V6(a) => v6.push(a),
            }
        }
        StaticSeedList { v4, v6 }
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

impl AddressSelector for StaticSeedList {
    fn select(&self, _qname: &str, out: &mut [IpAddr], want_v4: bool, want_v6: bool) -> usize {
        let mut pool: Vec<IpAddr> = Vec::new();
        if want_v4 {
            pool.extend(self.v4.iter().copied().map(IpAddr::V4));
        }
        if want_v6 {
            pool.extend(self.v6.iter().copied().map(IpAddr::V6));
        }

        // Shuffle for load distribution across peers
        pool.shuffle(&mut rand::thread_rng());

        let n = pool.len().min(out.len());
        out[..n].copy_from_slice(&pool[..n]);
        n
    }
}
