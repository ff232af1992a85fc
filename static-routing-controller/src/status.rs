use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::ResourceExt;
use serde_json::{Map, Value, json};
use static_routing_crds::FINALIZER;
use static_routing_crds::v1alpha1::condition::{ConditionUpdate, is_ready, set_condition};
use tracing::{debug, info, warn};

use crate::summary::{ReconciliationStatus, RecordSummary};
use crate::{Error, NodeRecord, RecordClient, Result};

pub(crate) fn now() -> Time {
    Time(Utc::now())
}

/// Whether the last pass already converged the current generation.
pub(crate) fn is_up_to_date<K: NodeRecord>(record: &K) -> bool {
    record.meta().deletion_timestamp.is_none()
        && record.meta().generation == record.observed_generation()
        && is_ready(record.conditions())
}

pub(crate) fn needs_pending<K: NodeRecord>(record: &K) -> bool {
    record.meta().generation != record.observed_generation()
}

/// Publishes the Pending condition ahead of the convergence work. Failures
/// are logged and do not stop the pass.
pub(crate) async fn mark_pending<K, C>(client: &C, record: &mut K, now: &Time)
where
    K: NodeRecord,
    C: RecordClient<K>,
{
    let name = record.name_any();
    let conditions = set_condition(record.conditions(), &ConditionUpdate::pending(), now);
    let patch = json!({ "status": { "conditions": conditions } });
    match client.patch_status(&name, &patch).await {
        Ok(()) => {
            debug!(record = %name, "marked pending");
            record.set_conditions(conditions);
        }
        Err(e) => warn!(record = %name, %e, "unable to mark record pending"),
    }
}

/// Merge patch keeping every finalizer except the agent's.
pub(crate) fn finalizer_patch<K: NodeRecord>(record: &K) -> Value {
    let remaining: Vec<&String> = record
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .collect();
    json!({ "metadata": { "finalizers": remaining } })
}

/// Merge patch carrying the Ready condition, the observed generation and, on
/// success, the applied entries.
pub(crate) fn status_patch<K: NodeRecord>(
    record: &K,
    status: &ReconciliationStatus,
    now: &Time,
) -> Value {
    let update = if status.is_success() {
        ConditionUpdate::succeeded()
    } else {
        ConditionUpdate::failed(status.message())
    };
    let conditions = set_condition(record.conditions(), &update, now);

    let mut body = Map::new();
    body.insert(
        "observedGeneration".into(),
        json!(record.meta().generation),
    );
    body.insert("conditions".into(), json!(conditions));
    if status.is_success() {
        body.insert(K::APPLIED_FIELD.into(), record.spec_entries());
    }
    json!({ "status": body })
}

/// Writes the outcome of a pass back to the record: first the finalizer,
/// then the status.
pub(crate) async fn publish<K, C>(client: &C, summary: &RecordSummary<K>, now: &Time) -> Result<()>
where
    K: NodeRecord,
    C: RecordClient<K>,
{
    let name = summary.record.meta().name.as_deref().ok_or(Error::MissingName)?;

    if summary.wipe_finalizer && summary.record.finalizers().iter().any(|f| f == FINALIZER) {
        client
            .patch_metadata(name, &finalizer_patch(&summary.record))
            .await
            .map_err(Error::ClusterWrite)?;
        info!(record = %name, "removed finalizer");
    }

    let patch = status_patch(&summary.record, &summary.status, now);
    match client.patch_status(name, &patch).await {
        Ok(()) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 && summary.wipe_finalizer => {
            debug!(record = %name, "record is gone after finalizer removal");
            Ok(())
        }
        Err(e) => Err(Error::ClusterWrite(e)),
    }
}
