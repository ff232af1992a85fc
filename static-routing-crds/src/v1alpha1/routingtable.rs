use kube::{CustomResource, KubeSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use static_routing_common::{Expanded, RouteEntry};

use crate::v1alpha1::condition::ExtendedCondition;

/// Routes one node has to hold in a single routing table.
#[derive(
    CustomResource, KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug,
)]
#[kube(
    group = "network.deckhouse.io",
    version = "v1alpha1",
    kind = "SDNInternalNodeRoutingTable",
    root = "NodeRoutingTable",
    shortname = "nrt",
    status = "NodeRoutingTableStatus",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct NodeRoutingTableSpec {
    pub node_name: String,
    #[serde(rename = "ipRoutingTableID")]
    pub ip_routing_table_id: u32,
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub destination: String,
    pub gateway: String,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeRoutingTableStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub applied_routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "crate::v1alpha1::condition::conditions")]
    pub conditions: Vec<ExtendedCondition>,
}

impl NodeRoutingTable {
    pub fn desired_routes(&self) -> Expanded<RouteEntry> {
        expand_routes(self.spec.ip_routing_table_id, &self.spec.routes)
    }

    /// Routes recorded as applied by the last successful pass. They are
    /// resolved against the current table id.
    pub fn applied_routes(&self) -> Expanded<RouteEntry> {
        let applied = self
            .status
            .as_ref()
            .map(|s| s.applied_routes.as_slice())
            .unwrap_or_default();
        expand_routes(self.spec.ip_routing_table_id, applied)
    }
}

pub fn expand_routes(table: u32, routes: &[Route]) -> Expanded<RouteEntry> {
    let mut expanded = Expanded::default();
    for route in routes {
        expanded.push(RouteEntry::parse(table, &route.destination, &route.gateway));
    }
    expanded
}
