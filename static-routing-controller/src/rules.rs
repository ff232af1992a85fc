use static_routing_common::{Expanded, RuleEntry};
use static_routing_crds::v1alpha1::condition::ExtendedCondition;
use static_routing_crds::v1alpha1::ipruleset::NodeIPRuleSet;

use crate::NodeRecord;

impl NodeRecord for NodeIPRuleSet {
    type Entry = RuleEntry;

    const APPLIED_FIELD: &'static str = "appliedIPRules";

    fn node_name(&self) -> &str {
        &self.spec.node_name
    }

    fn desired(&self) -> Expanded<RuleEntry> {
        self.desired_rules()
    }

    fn last_applied(&self) -> Expanded<RuleEntry> {
        self.applied_rules()
    }

    fn spec_entries(&self) -> serde_json::Value {
        serde_json::to_value(&self.spec.rules).unwrap_or_default()
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

#[cfg(test)]
mod tests {
    use ipnetwork::Ipv4Network;
    use static_routing_common::PortRange;
    use static_routing_crds::v1alpha1::condition::ConditionStatus;
    use static_routing_crds::v1alpha1::ipruleset::PortRangeSelector;
    use static_routing_netlink::{GatewayCall, InMemoryGateway};

    use super::*;
    use crate::testing::{InMemoryRecordClient, ip_rule, nirs, ready, scope};
    use crate::{PassOutcome, Result, run_pass};

    async fn pass(
        client: &InMemoryRecordClient<NodeIPRuleSet>,
        gateway: &InMemoryGateway,
    ) -> Result<PassOutcome> {
        run_pass::<NodeIPRuleSet, _, _>(&scope("node-a"), client, gateway).await
    }

    fn net(s: &str) -> Option<Ipv4Network> {
        Some(s.parse().unwrap())
    }

    #[tokio::test]
    async fn test_rule_expands_over_sources() -> Result<()> {
        let client = InMemoryRecordClient::new([nirs(
            "s1",
            "node-a",
            vec![ip_rule(
                100,
                &["192.168.0.0/24", "192.168.1.0/24"],
                &["10.0.0.0/8"],
                300,
            )],
        )]);
        let gateway = InMemoryGateway::new();

        assert_eq!(pass(&client, &gateway).await?, PassOutcome::Converged);
        let rules: Vec<RuleEntry> = gateway.rules().iter().cloned().collect();
        assert_eq!(rules.len(), 2);
        for rule in &rules {
            assert_eq!(rule.priority, 100);
            assert_eq!(rule.table, 300);
            assert_eq!(rule.destination, net("10.0.0.0/8"));
        }
        let mut sources: Vec<_> = rules.iter().map(|r| r.source).collect();
        sources.sort();
        assert_eq!(sources, vec![net("192.168.0.0/24"), net("192.168.1.0/24")]);

        let record = client.get("s1").unwrap();
        let status = record.status.as_ref().unwrap();
        assert_eq!(status.applied_ip_rules, record.spec.rules);
        assert_eq!(ready(&record).unwrap().status, ConditionStatus::True);
        Ok(())
    }

    #[tokio::test]
    async fn test_unset_priority_is_adopted_without_churn() -> Result<()> {
        let client = InMemoryRecordClient::new([nirs(
            "s1",
            "node-a",
            vec![ip_rule(0, &["192.168.0.0/24"], &[], 300)],
        )]);
        let gateway = InMemoryGateway::new();

        pass(&client, &gateway).await?;
        let added: Vec<_> = gateway.calls();
        assert!(matches!(added.as_slice(), [GatewayCall::AddRule(r)] if r.priority == 0));
        let kernel: Vec<RuleEntry> = gateway.rules().iter().cloned().collect();
        assert_eq!(kernel.len(), 1);
        assert_ne!(kernel[0].priority, 0);

        // the kernel assigned priority is taken over, nothing is rewritten
        gateway.clear_calls();
        assert_eq!(pass(&client, &gateway).await?, PassOutcome::Converged);
        assert!(gateway.calls().is_empty());
        assert_eq!(gateway.rules().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_single_port_range() -> Result<()> {
        let mut rule = ip_rule(200, &[], &[], 300);
        rule.selectors.sport_range = Some(PortRangeSelector {
            start: 8080,
            end: None,
        });
        let client = InMemoryRecordClient::new([nirs("s1", "node-a", vec![rule])]);
        let gateway = InMemoryGateway::new();

        pass(&client, &gateway).await?;
        let kernel: Vec<RuleEntry> = gateway.rules().iter().cloned().collect();
        assert_eq!(kernel.len(), 1);
        assert_eq!(
            kernel[0].sport,
            Some(PortRange {
                start: 8080,
                end: 8080
            })
        );
        assert_eq!(kernel[0].source, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_rule_set_is_released() -> Result<()> {
        let client = InMemoryRecordClient::new([nirs(
            "s1",
            "node-a",
            vec![ip_rule(100, &["192.168.0.0/24"], &[], 300)],
        )]);
        let gateway = InMemoryGateway::new();
        pass(&client, &gateway).await?;
        assert_eq!(gateway.rules().len(), 1);

        client.delete("s1");
        assert_eq!(pass(&client, &gateway).await?, PassOutcome::Converged);
        assert!(gateway.rules().is_empty());
        assert!(client.get("s1").is_none());
        assert_eq!(client.metadata_patches().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_rule_does_not_block_others() -> Result<()> {
        let mut broken = ip_rule(100, &["192.168.0.0/24"], &[], 300);
        broken.selectors.fw_mark = Some("42".into());
        let client = InMemoryRecordClient::new([nirs(
            "s1",
            "node-a",
            vec![broken, ip_rule(101, &["192.168.1.0/24"], &[], 300)],
        )]);
        let gateway = InMemoryGateway::new();

        let outcome = pass(&client, &gateway).await?;
        assert!(!outcome.should_requeue());
        assert_eq!(gateway.rules().len(), 1);
        let record = client.get("s1").unwrap();
        let condition = ready(&record).unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert!(condition.message.contains("0x prefix"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unset_priority_never_takes_a_pinned_twin() -> Result<()> {
        let client = InMemoryRecordClient::new([
            nirs("a", "node-a", vec![ip_rule(0, &["192.168.0.0/24"], &[], 300)]),
            nirs("b", "node-a", vec![ip_rule(100, &["192.168.0.0/24"], &[], 300)]),
        ]);
        let gateway = InMemoryGateway::new();
        let priorities = |gateway: &InMemoryGateway| {
            let mut p: Vec<u32> = gateway.rules().iter().map(|r| r.priority).collect();
            p.sort();
            p
        };

        pass(&client, &gateway).await?;
        let settled = priorities(&gateway);
        assert_eq!(settled.len(), 2);
        assert!(settled.contains(&100));

        for _ in 0..2 {
            gateway.clear_calls();
            assert_eq!(pass(&client, &gateway).await?, PassOutcome::Converged);
            assert!(gateway.calls().is_empty());
            assert_eq!(priorities(&gateway), settled);
        }

        // the pinned rule leaves with its record, the unset one stays
        client.delete("b");
        assert_eq!(pass(&client, &gateway).await?, PassOutcome::Converged);
        let remaining = priorities(&gateway);
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0], 100);
        Ok(())
    }
}
