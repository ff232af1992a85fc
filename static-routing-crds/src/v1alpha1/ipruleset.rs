use ipnetwork::{IpNetwork, Ipv4Network};
use kube::{CustomResource, KubeSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use static_routing_common::{
    Error as EntryError, Expanded, FwMark, PortRange, RuleEntry, Tos, UidRange, route,
};

use crate::v1alpha1::condition::ExtendedCondition;

/// Policy routing rules one node has to hold.
#[derive(
    CustomResource, KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug,
)]
#[kube(
    group = "network.deckhouse.io",
    version = "v1alpha1",
    kind = "SDNInternalNodeIPRuleSet",
    root = "NodeIPRuleSet",
    shortname = "nirs",
    status = "NodeIPRuleSetStatus",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct NodeIPRuleSetSpec {
    pub node_name: String,
    #[serde(default)]
    pub rules: Vec<IPRule>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IPRule {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: u32,
    #[serde(default)]
    pub selectors: RuleSelectors,
    pub actions: RuleActions,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleSelectors {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub not: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_mark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iif: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oif: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_range: Option<UidRangeSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_proto: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport_range: Option<PortRangeSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dport_range: Option<PortRangeSelector>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
pub struct PortRangeSelector {
    pub start: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u16>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
pub struct UidRangeSelector {
    pub start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
pub struct RuleActions {
    pub lookup: LookupAction,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LookupAction {
    #[serde(rename = "ipRoutingTableID")]
    pub ip_routing_table_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_table_name: Option<String>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeIPRuleSetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, rename = "appliedIPRules")]
    pub applied_ip_rules: Vec<IPRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "crate::v1alpha1::condition::conditions")]
    pub conditions: Vec<ExtendedCondition>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl NodeIPRuleSet {
    pub fn desired_rules(&self) -> Expanded<RuleEntry> {
        expand_rules(&self.spec.rules)
    }

    pub fn applied_rules(&self) -> Expanded<RuleEntry> {
        let applied = self
            .status
            .as_ref()
            .map(|s| s.applied_ip_rules.as_slice())
            .unwrap_or_default();
        expand_rules(applied)
    }
}

/// Expands every rule into the `from` x `to` cross product of entries.
pub fn expand_rules(rules: &[IPRule]) -> Expanded<RuleEntry> {
    let mut expanded = Expanded::default();
    for rule in rules {
        match rule.expand() {
            Ok(entries) => entries.into_iter().for_each(|e| expanded.push(Ok(e))),
            Err(e) => expanded.push(Err(e)),
        }
    }
    expanded
}

impl IPRule {
    pub fn expand(&self) -> Result<Vec<RuleEntry>, EntryError> {
        let template = self.template()?;
        let sources = parse_networks(&self.selectors.from)?;
        let destinations = parse_networks(&self.selectors.to)?;

        let mut entries = Vec::with_capacity(sources.len() * destinations.len());
        for source in &sources {
            for destination in &destinations {
                entries.push(RuleEntry {
                    source: *source,
                    destination: *destination,
                    ..template.clone()
                });
            }
        }
        Ok(entries)
    }

    /// Every field but the address selectors.
    fn template(&self) -> Result<RuleEntry, EntryError> {
        let selectors = &self.selectors;
        let tos = selectors
            .tos
            .as_deref()
            .map(str::parse::<Tos>)
            .transpose()?
            .unwrap_or_default();
        let fw_mark = selectors
            .fw_mark
            .as_deref()
            .map(str::parse::<FwMark>)
            .transpose()?;
        let sport = match &selectors.sport_range {
            Some(r) => PortRange::from_bounds(r.start, r.end)?,
            None => None,
        };
        let dport = match &selectors.dport_range {
            Some(r) => PortRange::from_bounds(r.start, r.end)?,
            None => None,
        };
        let uid_range = match &selectors.uid_range {
            Some(r) => UidRange::from_bounds(r.start, r.end)?,
            None => None,
        };
        let entry = RuleEntry {
            priority: self.priority,
            invert: selectors.not,
            source: None,
            destination: None,
            ip_proto: selectors.ip_proto.unwrap_or_default(),
            sport,
            dport,
            tos,
            fw_mark,
            iif: selectors.iif.clone().unwrap_or_default(),
            oif: selectors.oif.clone().unwrap_or_default(),
            uid_range,
            table: self.actions.lookup.ip_routing_table_id,
        };
        entry.validate()?;
        Ok(entry)
    }
}

/// Parses an address selector list. An empty list and `0.0.0.0/0` both mean
/// any address.
fn parse_networks(cidrs: &[String]) -> Result<Vec<Option<Ipv4Network>>, EntryError> {
    if cidrs.is_empty() {
        return Ok(vec![None]);
    }
    cidrs.iter().map(|c| parse_network(c)).collect()
}

fn parse_network(cidr: &str) -> Result<Option<Ipv4Network>, EntryError> {
    let net: IpNetwork = cidr
        .parse()
        .map_err(|e| EntryError::InvalidEntry(format!("unable to parse address {cidr}: {e}")))?;
    let IpNetwork::V4(net) = net else {
        return Err(EntryError::InvalidEntry(format!(
            "address {cidr} is not supported, only IPv4 rules are handled"
        )));
    };
    if net.prefix() == 0 {
        return Ok(None);
    }
    Ok(Some(route::canonical_network(net)))
}
