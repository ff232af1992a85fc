mod client;
mod context;
mod controller;
mod error;
mod pass;
mod routes;
mod rules;
mod runtime;
mod status;
mod summary;
#[cfg(test)]
mod testing;

use std::fmt::Debug;

pub use client::{KubeRecordClient, RecordClient};
pub use error::{Error, FailureKind};
use kube::Resource;
pub use pass::{PassOutcome, run_pass};
pub use runtime::{ControllerConfig, start_routing_controllers};
use serde::Serialize;
use serde::de::DeserializeOwned;
use static_routing_common::Expanded;
use static_routing_crds::v1alpha1::condition::ExtendedCondition;
use static_routing_netlink::GatewayEntry;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A cluster record prescribing kernel entries for one node.
pub trait NodeRecord:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Entry: GatewayEntry;

    /// Status field holding the spec entries of the last successful pass.
    const APPLIED_FIELD: &'static str;

    fn node_name(&self) -> &str;

    fn desired(&self) -> Expanded<Self::Entry>;

    fn last_applied(&self) -> Expanded<Self::Entry>;

    /// Spec entries in their wire form.
    fn spec_entries(&self) -> serde_json::Value;

    fn observed_generation(&self) -> Option<i64>;

    fn conditions(&self) -> &[ExtendedCondition];

    fn set_conditions(&mut self, conditions: Vec<ExtendedCondition>);
}
