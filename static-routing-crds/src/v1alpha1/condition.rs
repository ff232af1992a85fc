use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::json_schema;
use serde::{Deserialize, Serialize};

pub const CONDITION_TYPE_READY: &str = "Ready";

pub const REASON_RECONCILIATION_SUCCEED: &str = "ReconciliationSucceed";
pub const REASON_RECONCILIATION_FAILED: &str = "ReconciliationFailed";
pub const REASON_PENDING: &str = "Pending";

pub const PENDING_MESSAGE: &str = "Reconciliation in progress";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Condition with a heartbeat, refreshed on every write.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

/// The condition a pass wants to publish, without timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionUpdate {
    pub type_: &'static str,
    pub status: ConditionStatus,
    pub reason: &'static str,
    pub message: String,
}

impl ConditionUpdate {
    pub fn succeeded() -> Self {
        Self {
            type_: CONDITION_TYPE_READY,
            status: ConditionStatus::True,
            reason: REASON_RECONCILIATION_SUCCEED,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            type_: CONDITION_TYPE_READY,
            status: ConditionStatus::False,
            reason: REASON_RECONCILIATION_FAILED,
            message: message.into(),
        }
    }

    pub fn pending() -> Self {
        Self {
            type_: CONDITION_TYPE_READY,
            status: ConditionStatus::False,
            reason: REASON_PENDING,
            message: PENDING_MESSAGE.into(),
        }
    }
}

/// Merges `update` into `conditions`.
///
/// The condition with a matching type gets a fresh heartbeat, its reason and
/// message overwritten, and a fresh transition time only if its status
/// changed. Without a match a new condition is appended.
pub fn set_condition(
    conditions: &[ExtendedCondition],
    update: &ConditionUpdate,
    now: &Time,
) -> Vec<ExtendedCondition> {
    let mut conditions = conditions.to_vec();
    match conditions.iter_mut().find(|c| c.type_ == update.type_) {
        Some(existing) => {
            if existing.status != update.status || existing.last_transition_time.is_none() {
                existing.last_transition_time = Some(now.clone());
            }
            existing.status = update.status;
            existing.reason = update.reason.to_string();
            existing.message = update.message.clone();
            existing.last_heartbeat_time = Some(now.clone());
        }
        None => conditions.push(ExtendedCondition {
            type_: update.type_.to_string(),
            status: update.status,
            reason: update.reason.to_string(),
            message: update.message.clone(),
            last_heartbeat_time: Some(now.clone()),
            last_transition_time: Some(now.clone()),
        }),
    }
    conditions
}

/// Whether the latest `Ready` condition reports success.
pub fn is_ready(conditions: &[ExtendedCondition]) -> bool {
    conditions
        .iter()
        .rev()
        .find(|c| c.type_ == CONDITION_TYPE_READY)
        .is_some_and(|c| c.status == ConditionStatus::True)
}

pub(crate) fn conditions(_: &mut schemars::generate::SchemaGenerator) -> schemars::Schema {
    json_schema!({
        "type": "array",
        "x-kubernetes-list-type": "map",
        "x-kubernetes-list-map-keys": ["type"],
        "items": {
            "type": "object",
            "properties": {
                "lastHeartbeatTime": { "format": "date-time", "type": "string" },
                "lastTransitionTime": { "format": "date-time", "type": "string" },
                "message": { "type": "string" },
                "reason": { "type": "string" },
                "status": { "type": "string", "enum": ["True", "False", "Unknown"] },
                "type": { "type": "string" }
            },
            "required": ["status", "type"],
        },
    })
}
