use static_routing_common::{Expanded, RouteEntry};
use static_routing_crds::v1alpha1::condition::ExtendedCondition;
use static_routing_crds::v1alpha1::routingtable::NodeRoutingTable;

use crate::NodeRecord;

impl NodeRecord for NodeRoutingTable {
    type Entry = RouteEntry;

    const APPLIED_FIELD: &'static str = "appliedRoutes";

    fn node_name(&self) -> &str {
        &self.spec.node_name
    }

    fn desired(&self) -> Expanded<RouteEntry> {
        self.desired_routes()
    }

    fn last_applied(&self) -> Expanded<RouteEntry> {
        self.applied_routes()
    }

    fn spec_entries(&self) -> serde_json::Value {
        serde_json::to_value(&self.spec.routes).unwrap_or_default()
    }

    fn observed_generation(&self) -> Option<i64> {
        self.status.as_ref().and_then(|s| s.observed_generation)
    }

    fn conditions(&self) -> &[ExtendedCondition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    fn set_conditions(&mut self, conditions: Vec<ExtendedCondition>) {
        self.status.get_or_insert_with(Default::default).conditions = conditions;
    }
}
