use crate::error::BalanceError;
use crate::option::ServiceInfo;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::RwLock;

/// Tag of the supplied round-robin balancer.
pub const TYPE_ROUND_ROBIN: &str = "round_robin";

/// Replica-selection strategy behind the registry.
///
/// Implementations guard their own state; the registry calls them
/// concurrently without external locking. Weighted strategies are not
/// part of the contract.
pub trait LoadBalance: Send + Sync {
    /// Add a replica, or refresh it when the `(name, addr)` pair is
    /// already present.
    fn register(&self, info: ServiceInfo);

    /// Refresh liveness of a registered `(name, addr)` pair. Unknown
    /// pairs are ignored.
    fn heart_beat(&self, name: &str, addr: &str);

    /// Pick one live replica address for `name`. Replicas whose last
    /// heartbeat is older than `timeout × factor` are evicted on the
    /// way; when none survive the lookup fails.
    fn get(&self, name: &str, factor: f64) -> Result<String, BalanceError>;
}

/// Constructor signature a balancer registers under its tag.
pub type BalanceCtor = fn() -> Box<dyn LoadBalance>;

fn new_round_robin() -> Box<dyn LoadBalance> {
    Box::new(super::round_robin::RoundRobin::new())
}

static BALANCERS: Lazy<RwLock<HashMap<String, BalanceCtor>>> = Lazy::new(|| {
    let mut m: HashMap<String, BalanceCtor> = HashMap::new();
    m.insert(TYPE_ROUND_ROBIN.to_string(), new_round_robin);
    RwLock::new(m)
});

/// Register a third-party balancing strategy under `tag`.
pub fn register_balancer(tag: &str, ctor: BalanceCtor) {
    BALANCERS.write().unwrap().insert(tag.to_string(), ctor);
}

/// Construct the balancer registered under `tag`, if any.
pub fn new_balancer(tag: &str) -> Option<Box<dyn LoadBalance>> {
    BALANCERS.read().unwrap().get(tag).map(|ctor| ctor())
}
