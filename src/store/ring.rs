//! Consistent Hash Ring
//!
//! Maps keys to the servers that own them. Each server contributes a fixed
//! number of virtual nodes so the keyspace spreads evenly, and adding or
//! removing a server only reassigns the keys in the arcs it touches.
//!
//! The hash is a MurmurHash-style 64-bit recurrence. Its exact constants and
//! rounds are part of the routing contract: every client must compute the same
//! ring positions or keys end up on the wrong server.

use crate::network::types::Endpoint;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

const VIRTUAL_NODES_PER_SERVER: usize = 100;

const HASH_SEED: u64 = 0x1234_ABCD;
const HASH_MULTIPLIER: u64 = 0xc6a4_a793_5bd1_e995;
const HASH_SHIFT: u32 = 47;

pub struct HashRing {
    ring: RwLock<BTreeMap<u64, Endpoint>>,
    server_points: DashMap<Endpoint, HashSet<u64>>,
}

impl HashRing {
    pub fn new() -> Self {
        Self {
            ring: RwLock::new(BTreeMap::new()),
            server_points: DashMap::new(),
        }
    }

    /// Inserts a server's virtual nodes into the ring.
    pub fn add_server(&self, server: Endpoint) {
        tracing::info!("Adding server {} to hash ring", server);
        let mut points = HashSet::new();
        let mut ring = self.ring.write().unwrap();
        for i in 0..VIRTUAL_NODES_PER_SERVER {
            let virtual_node = format!("{}#{}", server, i);
            let point = hash(virtual_node.as_bytes());
            ring.insert(point, server.clone());
            points.insert(point);
        }
        drop(ring);
        self.server_points.insert(server, points);
    }

    /// Removes all of a server's virtual nodes from the ring.
    pub fn remove_server(&self, server: &Endpoint) {
        tracing::info!("Removing server {} from hash ring", server);
        if let Some((_, points)) = self.server_points.remove(server) {
            let mut ring = self.ring.write().unwrap();
            for point in points {
                ring.remove(&point);
            }
        }
    }

    /// Returns the server owning `key`: the first ring entry at or after the
    /// key's hash, wrapping to the start of the ring past the last entry.
    ///
    /// # Panics
    /// Panics if the ring is empty.
    pub fn server_for_key(&self, key: &str) -> Endpoint {
        let point = hash(key.as_bytes());
        let ring = self.ring.read().unwrap();
        let server = ring
            .range(point..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, server)| server.clone())
            .expect("hash ring has no servers");
        tracing::debug!("Key {} mapped to server {}", key, server);
        server
    }

    /// Walks clockwise from the key's position collecting up to `count`
    /// distinct servers, stopping early after a full revolution.
    pub fn servers_for_key(&self, key: &str, count: usize) -> Vec<Endpoint> {
        let point = hash(key.as_bytes());
        let ring = self.ring.read().unwrap();
        let mut servers: Vec<Endpoint> = Vec::new();
        for (_, server) in ring.range(point..).chain(ring.range(..point)) {
            if servers.len() >= count {
                break;
            }
            if !servers.contains(server) {
                servers.push(server.clone());
            }
        }
        tracing::debug!("Key {} mapped to {} servers", key, servers.len());
        servers
    }

    /// All servers currently on the ring.
    pub fn servers(&self) -> Vec<Endpoint> {
        self.server_points
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.server_points.is_empty()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

/// 64-bit MurmurHash-style digest.
///
/// The recurrence must stay bit-for-bit stable: `h = seed ^ (len * m)`, then
/// per byte `h = (h + b) * m; h ^= h >> 47`, then two finalization rounds of
/// `h = h * m; h ^= h >> 47`.
fn hash(data: &[u8]) -> u64 {
    let m = HASH_MULTIPLIER;
    let mut h = HASH_SEED ^ (data.len() as u64).wrapping_mul(m);

    for &b in data {
        h = h.wrapping_add(b as u64).wrapping_mul(m);
        h ^= h >> HASH_SHIFT;
    }

    h = h.wrapping_mul(m);
    h ^= h >> HASH_SHIFT;
    h = h.wrapping_mul(m);
    h ^= h >> HASH_SHIFT;

    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let h1 = hash(b"customer-CUST0001");
        let h2 = hash(b"customer-CUST0001");
        assert_eq!(h1, h2);
        assert_ne!(hash(b"customer-CUST0001"), hash(b"customer-CUST0002"));
    }

    #[test]
    fn test_each_server_owns_virtual_node_count() {
        let ring = HashRing::new();
        ring.add_server(Endpoint::new("localhost", 9001));
        ring.add_server(Endpoint::new("localhost", 9002));

        for entry in ring.server_points.iter() {
            assert_eq!(entry.value().len(), VIRTUAL_NODES_PER_SERVER);
        }
        assert_eq!(
            ring.ring.read().unwrap().len(),
            2 * VIRTUAL_NODES_PER_SERVER
        );
    }

    #[test]
    fn test_remove_server_clears_its_points() {
        let ring = HashRing::new();
        let a = Endpoint::new("localhost", 9001);
        let b = Endpoint::new("localhost", 9002);
        ring.add_server(a.clone());
        ring.add_server(b.clone());

        ring.remove_server(&a);

        assert_eq!(ring.servers(), vec![b.clone()]);
        assert_eq!(
            ring.ring.read().unwrap().len(),
            VIRTUAL_NODES_PER_SERVER
        );
        // Every remaining key routes to the surviving server.
        for i in 0..50 {
            assert_eq!(ring.server_for_key(&format!("key-{}", i)), b);
        }
    }

    #[test]
    fn test_servers_for_key_returns_distinct_servers() {
        let ring = HashRing::new();
        for port in 9001..9005 {
            ring.add_server(Endpoint::new("localhost", port));
        }

        let servers = ring.servers_for_key("some-key", 3);
        assert_eq!(servers.len(), 3);
        let unique: std::collections::HashSet<_> = servers.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_servers_for_key_caps_at_ring_size() {
        let ring = HashRing::new();
        ring.add_server(Endpoint::new("localhost", 9001));
        ring.add_server(Endpoint::new("localhost", 9002));

        let servers = ring.servers_for_key("some-key", 10);
        assert_eq!(servers.len(), 2);
    }
}
