use thiserror::Error;

pub mod v1alpha1;

use kube::CustomResourceExt;

pub const GROUP: &str = "network.deckhouse.io";

/// Label carrying the name of the node a record is addressed to.
pub const NODE_NAME_LABEL: &str = "routing-manager.network.deckhouse.io/node-name";

/// Finalizer placed by the cluster controller and released by the agent once
/// the kernel no longer holds entries owned by the record.
pub const FINALIZER: &str = "routing-tables-manager.network.deckhouse.io";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid entry: {0}")]
    InvalidEntry(#[from] static_routing_common::Error),

    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub fn crd_gen_all() -> Result<()> {
    let crds = vec![
        v1alpha1::routingtable::NodeRoutingTable::crd(),
        v1alpha1::ipruleset::NodeIPRuleSet::crd(),
    ];
    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;

    use crate::v1alpha1::{ipruleset::NodeIPRuleSet, routingtable::NodeRoutingTable};

    #[test]
    fn test_crd_names() {
        let nrt = NodeRoutingTable::crd();
        assert_eq!(
            nrt.metadata.name.as_deref(),
            Some("sdninternalnoderoutingtables.network.deckhouse.io")
        );
        assert_eq!(nrt.spec.scope, "Cluster");
        assert_eq!(nrt.spec.names.kind, "SDNInternalNodeRoutingTable");

        let nirs = NodeIPRuleSet::crd();
        assert_eq!(
            nirs.metadata.name.as_deref(),
            Some("sdninternalnodeiprulesets.network.deckhouse.io")
        );
        assert_eq!(nirs.spec.scope, "Cluster");
    }
}
