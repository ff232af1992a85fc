//! In-memory cluster double and record fixtures for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::ResourceExt;
use kube::api::ObjectMeta;
use kube::core::ErrorResponse;
use serde_json::{Map, Value, json};
use static_routing_crds::v1alpha1::condition::{CONDITION_TYPE_READY, ExtendedCondition};
use static_routing_crds::v1alpha1::ipruleset::{
    IPRule, LookupAction, NodeIPRuleSet, NodeIPRuleSetSpec, RuleActions, RuleSelectors,
};
use static_routing_crds::v1alpha1::routingtable::{NodeRoutingTable, NodeRoutingTableSpec, Route};
use static_routing_crds::{FINALIZER, NODE_NAME_LABEL};
use static_routing_k8s_utils::NodeScope;

use crate::{NodeRecord, RecordClient};

pub(crate) struct InMemoryRecordClient<K> {
    state: Mutex<ClientState<K>>,
}

struct ClientState<K> {
    records: BTreeMap<String, K>,
    status_patches: Vec<(String, Value)>,
    metadata_patches: Vec<(String, Value)>,
    fail_list: bool,
    failing_status_patches: usize,
}

fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: reason.into(),
        reason: reason.into(),
        code,
    })
}

/// JSON merge patch as the API server applies it.
fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn apply<K: NodeRecord>(record: &K, patch: &Value) -> kube::Result<K> {
    let mut value = serde_json::to_value(record).map_err(kube::Error::SerdeError)?;
    merge(&mut value, patch);
    serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

fn bump_generation<K: NodeRecord>(record: &mut K) {
    let meta = record.meta_mut();
    meta.generation = Some(meta.generation.unwrap_or_default() + 1);
}

impl<K: NodeRecord> InMemoryRecordClient<K> {
    pub(crate) fn new(records: impl IntoIterator<Item = K>) -> Self {
        Self {
            state: Mutex::new(ClientState {
                records: records.into_iter().map(|r| (r.name_any(), r)).collect(),
                status_patches: Vec::new(),
                metadata_patches: Vec::new(),
                fail_list: false,
                failing_status_patches: 0,
            }),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<K> {
        self.state.lock().unwrap().records.get(name).cloned()
    }

    pub(crate) fn insert(&self, record: K) {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(record.name_any(), record);
    }

    /// Edits a record the way its author would, bumping the generation.
    pub(crate) fn update(&self, name: &str, edit: impl FnOnce(&mut K)) {
        let mut state = self.state.lock().unwrap();
        let record = state.records.get_mut(name).unwrap();
        edit(record);
        bump_generation(record);
    }

    /// Requests deletion. The record stays until its finalizers are gone.
    pub(crate) fn delete(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let record = state.records.get_mut(name).unwrap();
        record.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
        bump_generation(record);
    }

    pub(crate) fn status_patches(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().status_patches.clone()
    }

    pub(crate) fn metadata_patches(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().metadata_patches.clone()
    }

    pub(crate) fn clear_patches(&self) {
        let mut state = self.state.lock().unwrap();
        state.status_patches.clear();
        state.metadata_patches.clear();
    }

    pub(crate) fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    /// Fails the next `count` status patches.
    pub(crate) fn fail_status_patches(&self, count: usize) {
        self.state.lock().unwrap().failing_status_patches = count;
    }
}

impl<K: NodeRecord> RecordClient<K> for InMemoryRecordClient<K> {
    async fn list(&self, scope: &NodeScope) -> kube::Result<Vec<K>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(api_error(500, "InternalError"));
        }
        Ok(state
            .records
            .values()
            .filter(|r| scope.matches(r.labels()))
            .cloned()
            .collect())
    }

    async fn patch_status(&self, name: &str, patch: &Value) -> kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.status_patches.push((name.to_string(), patch.clone()));
        if state.failing_status_patches > 0 {
            state.failing_status_patches -= 1;
            return Err(api_error(500, "InternalError"));
        }
        let record = state
            .records
            .get_mut(name)
            .ok_or_else(|| api_error(404, "NotFound"))?;
        // the status subresource ignores everything but status
        let patch = json!({ "status": patch.get("status").cloned().unwrap_or_default() });
        *record = apply(record, &patch)?;
        Ok(())
    }

    async fn patch_metadata(&self, name: &str, patch: &Value) -> kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.metadata_patches.push((name.to_string(), patch.clone()));
        let record = state
            .records
            .get_mut(name)
            .ok_or_else(|| api_error(404, "NotFound"))?;
        *record = apply(record, patch)?;
        if record.meta().deletion_timestamp.is_some() && record.finalizers().is_empty() {
            state.records.remove(name);
        }
        Ok(())
    }
}

pub(crate) fn scope(node_name: &str) -> NodeScope {
    NodeScope::new(NODE_NAME_LABEL, node_name)
}

fn metadata(name: &str, node_name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        labels: Some(BTreeMap::from([(
            NODE_NAME_LABEL.to_string(),
            node_name.to_string(),
        )])),
        finalizers: Some(vec![FINALIZER.into()]),
        generation: Some(1),
        ..Default::default()
    }
}

pub(crate) fn routes(pairs: &[(&str, &str)]) -> Vec<Route> {
    pairs
        .iter()
        .map(|(destination, gateway)| Route {
            destination: destination.to_string(),
            gateway: gateway.to_string(),
        })
        .collect()
}

pub(crate) fn nrt(name: &str, node_name: &str, table: u32, routes: &[Route]) -> NodeRoutingTable {
    NodeRoutingTable {
        metadata: metadata(name, node_name),
        spec: NodeRoutingTableSpec {
            node_name: node_name.into(),
            ip_routing_table_id: table,
            routes: routes.to_vec(),
        },
        status: None,
    }
}

pub(crate) fn ip_rule(priority: u32, from: &[&str], to: &[&str], table: u32) -> IPRule {
    IPRule {
        priority,
        selectors: RuleSelectors {
            from: from.iter().map(|s| s.to_string()).collect(),
            to: to.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        },
        actions: RuleActions {
            lookup: LookupAction {
                ip_routing_table_id: table,
                routing_table_name: None,
            },
        },
    }
}

pub(crate) fn nirs(name: &str, node_name: &str, rules: Vec<IPRule>) -> NodeIPRuleSet {
    NodeIPRuleSet {
        metadata: metadata(name, node_name),
        spec: NodeIPRuleSetSpec {
            node_name: node_name.into(),
            rules,
        },
        status: None,
    }
}

pub(crate) fn ready<K: NodeRecord>(record: &K) -> Option<ExtendedCondition> {
    record
        .conditions()
        .iter()
        .find(|c| c.type_ == CONDITION_TYPE_READY)
        .cloned()
}
