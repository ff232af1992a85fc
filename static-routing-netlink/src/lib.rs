mod convert;
mod error;
#[cfg(any(test, feature = "testing"))]
mod memory;
mod netlink;

pub use error::{Error, Result};
#[cfg(any(test, feature = "testing"))]
pub use memory::{GatewayCall, InMemoryGateway};
pub use netlink::NetlinkGateway;
use static_routing_common::{Entry, EntryMap, RouteEntry, RuleEntry};

/// The boundary to the kernel routing subsystem. Only entries carrying the
/// agent's realm are ever listed or written.
///
/// Calls for routes and rules may run concurrently, calls for the same kind
/// are issued one at a time.
pub trait RoutingGateway: Send + Sync + 'static {
    fn list_routes_in_realm(&self) -> impl Future<Output = Result<EntryMap<RouteEntry>>> + Send;

    fn add_route(&self, route: &RouteEntry) -> impl Future<Output = Result<()>> + Send;

    fn delete_route(&self, route: &RouteEntry) -> impl Future<Output = Result<()>> + Send;

    fn list_rules_in_realm(&self) -> impl Future<Output = Result<EntryMap<RuleEntry>>> + Send;

    fn add_rule(&self, rule: &RuleEntry) -> impl Future<Output = Result<()>> + Send;

    fn delete_rule(&self, rule: &RuleEntry) -> impl Future<Output = Result<()>> + Send;
}

/// Routes the generic list/add/delete of an entry kind to the matching
/// gateway operations.
pub trait GatewayEntry: Entry {
    /// Human readable kind, used in messages.
    const KIND: &'static str;

    fn list<G: RoutingGateway>(gateway: &G) -> impl Future<Output = Result<EntryMap<Self>>> + Send;

    fn add<G: RoutingGateway>(gateway: &G, entry: &Self) -> impl Future<Output = Result<()>> + Send;

    fn delete<G: RoutingGateway>(
        gateway: &G,
        entry: &Self,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl GatewayEntry for RouteEntry {
    const KIND: &'static str = "route";

    fn list<G: RoutingGateway>(gateway: &G) -> impl Future<Output = Result<EntryMap<Self>>> + Send {
        gateway.list_routes_in_realm()
    }

    fn add<G: RoutingGateway>(gateway: &G, entry: &Self) -> impl Future<Output = Result<()>> + Send {
        gateway.add_route(entry)
    }

    fn delete<G: RoutingGateway>(
        gateway: &G,
        entry: &Self,
    ) -> impl Future<Output = Result<()>> + Send {
        gateway.delete_route(entry)
    }
}

impl GatewayEntry for RuleEntry {
    const KIND: &'static str = "rule";

    fn list<G: RoutingGateway>(gateway: &G) -> impl Future<Output = Result<EntryMap<Self>>> + Send {
        gateway.list_rules_in_realm()
    }

    fn add<G: RoutingGateway>(gateway: &G, entry: &Self) -> impl Future<Output = Result<()>> + Send {
        gateway.add_rule(entry)
    }

    fn delete<G: RoutingGateway>(
        gateway: &G,
        entry: &Self,
    ) -> impl Future<Output = Result<()>> + Send {
        gateway.delete_rule(entry)
    }
}
