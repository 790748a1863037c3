use super::balance::LoadBalance;
use crate::error::BalanceError;
use crate::option::ServiceInfo;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// One registered server instance plus its liveness stamp.
struct Replica {
    info: ServiceInfo,
    last_ping: Instant,
}

impl Replica {
    #[inline]
    fn is_stale(&self, factor: f64, now: Instant) -> bool {
        now.duration_since(self.last_ping) > self.info.timeout.mul_f64(factor)
    }
}

/// Rotation ring for one service: replica addresses in registration
/// order, with the cursor naming the next candidate. Index arithmetic
/// wraps in `get`, so the vector behaves as a cycle.
#[derive(Default)]
struct Ring {
    order: Vec<String>,
    cursor: usize,
}

impl Ring {
    /// Remove `addr` wherever it sits, keeping the cursor on the element
    /// that followed it.
    fn remove_addr(&mut self, addr: &str) {
        if let Some(pos) = self.order.iter().position(|a| a == addr) {
            self.order.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
    }
}

#[derive(Default)]
struct State {
    /// Service name → rotation ring.
    services: HashMap<String, Ring>,
    /// Replica address → owned record. Every entry here occupies exactly
    /// one ring slot, and vice versa; heartbeats refresh through this map
    /// without touching ring order.
    info: HashMap<String, Replica>,
}

/// Round-robin balancer.
///
/// Eviction is lazy: stale replicas fall out only while `get` scans for a
/// live one. Registration and heartbeats never remove anything. A single
/// mutex serializes all three operations; registry traffic is orders of
/// magnitude below call traffic, so contention here is not a concern.
#[derive(Default)]
pub struct RoundRobin {
    state: Mutex<State>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn replica_count(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.services.get(name).map_or(0, |ring| ring.order.len())
    }
}

impl LoadBalance for RoundRobin {
    fn register(&self, reg: ServiceInfo) {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        if let Some(existing) = state.info.get_mut(&reg.addr) {
            if existing.info.name == reg.name {
                // The same replica came back (likely a restart); refresh
                // in place instead of growing the ring.
                existing.info.timeout = reg.timeout;
                existing.last_ping = now;
                return;
            }
            // Address reused by a different service: retire the old entry.
            let old_name = existing.info.name.clone();
            state.info.remove(&reg.addr);
            if let Some(ring) = state.services.get_mut(&old_name) {
                ring.remove_addr(&reg.addr);
            }
        }
        state.services.entry(reg.name.clone()).or_default().order.push(reg.addr.clone());
        state.info.insert(reg.addr.clone(), Replica { info: reg, last_ping: now });
    }

    fn heart_beat(&self, name: &str, addr: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(replica) = state.info.get_mut(addr) {
            if replica.info.name == name {
                replica.last_ping = Instant::now();
            }
        }
    }

    fn get(&self, name: &str, factor: f64) -> Result<String, BalanceError> {
        let mut guard = self.state.lock().unwrap();
        let now = Instant::now();
        let State { services, info } = &mut *guard;
        let ring =
            services.get_mut(name).ok_or_else(|| BalanceError::NotFound(name.to_string()))?;
        loop {
            if ring.order.is_empty() {
                return Err(BalanceError::NotFound(name.to_string()));
            }
            if ring.cursor >= ring.order.len() {
                ring.cursor = 0;
            }
            let addr = ring.order[ring.cursor].clone();
            // A slot without a record cannot happen while the maps stay
            // consistent; drop it like a stale replica if it ever does.
            let stale = info.get(&addr).map_or(true, |r| r.is_stale(factor, now));
            if stale {
                info.remove(&addr);
                ring.order.remove(ring.cursor);
                // The cursor now names the entry that followed the
                // evicted one; no extra advance.
                continue;
            }
            ring.cursor = (ring.cursor + 1) % ring.order.len();
            return Ok(addr);
        }
    }
}
