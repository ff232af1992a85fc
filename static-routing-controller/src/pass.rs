use std::collections::BTreeSet;

use kube::ResourceExt;
use static_routing_common::EntryMap;
use static_routing_k8s_utils::NodeScope;
use static_routing_netlink::{GatewayEntry, RoutingGateway};
use tracing::{debug, info, warn};

use crate::status::{self, mark_pending, needs_pending, publish};
use crate::summary::RecordSummary;
use crate::{Error, FailureKind, NodeRecord, RecordClient, Result};

/// What a completed pass asks of the control loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    Converged,
    /// At least one record failed. Carries every failure kind seen.
    RetryLater(BTreeSet<FailureKind>),
}

impl PassOutcome {
    fn from_failures(kinds: BTreeSet<FailureKind>) -> Self {
        if kinds.is_empty() {
            PassOutcome::Converged
        } else {
            PassOutcome::RetryLater(kinds)
        }
    }

    /// Invalid entries alone fail the same way on every attempt, so they do
    /// not ask for a retry.
    pub fn should_requeue(&self) -> bool {
        match self {
            PassOutcome::Converged => false,
            PassOutcome::RetryLater(kinds) => kinds.iter().any(FailureKind::is_retryable),
        }
    }
}

/// Runs one convergence pass for every record of kind `K` addressed at the
/// node.
///
/// Additions of all records run before any deletion. An entry dropped by one
/// record survives as long as another live record desires it. Realm entries
/// no record desires are swept at the end. Failing to read either side aborts
/// the pass before any write.
#[tracing::instrument(skip_all, fields(kind = %K::kind(&()), node = %scope.node_name()))]
pub async fn run_pass<K, C, G>(scope: &NodeScope, client: &C, gateway: &G) -> Result<PassOutcome>
where
    K: NodeRecord,
    C: RecordClient<K>,
    G: RoutingGateway,
{
    let mut records = client.list(scope).await.map_err(Error::ClusterRead)?;
    records.retain(|r| {
        let local = r.node_name() == scope.node_name();
        if !local {
            warn!(
                record = %r.name_any(),
                "record is labeled for this node but addressed at {}",
                r.node_name()
            );
        }
        local
    });
    records.sort_by_key(|r| r.name_any());

    let mut actual = K::Entry::list(gateway).await?;
    debug!(
        "reconciling {} records against {} entries",
        records.len(),
        actual.len()
    );

    let now = status::now();
    for record in records.iter_mut() {
        if needs_pending(record) {
            mark_pending(client, record, &now).await;
        }
    }

    let mut verbatim: EntryMap<K::Entry> = EntryMap::new();
    for record in &records {
        verbatim.extend(record.desired().entries.iter());
    }
    let claimable = actual.difference(&verbatim);

    let mut global = EntryMap::new();
    let mut summaries = Vec::with_capacity(records.len());
    for record in records {
        let mut summary = RecordSummary::discover(record, &actual, &claimable, &mut global);
        summary.add_entries(gateway, &mut actual).await;
        summaries.push(summary);
    }

    for summary in &mut summaries {
        summary.delete_entries(gateway, &global, &mut actual).await;
    }

    sweep_orphans::<K::Entry, G>(gateway, &global, &actual).await;

    let mut failures = BTreeSet::new();
    let now = status::now();
    for summary in &summaries {
        failures.extend(summary.status.kinds().iter().copied());
        if let Err(e) = publish(client, summary, &now).await {
            warn!(record = %summary.name, %e, "unable to update record");
            failures.insert(FailureKind::from(&e));
        }
    }

    let outcome = PassOutcome::from_failures(failures);
    match &outcome {
        PassOutcome::Converged => debug!("pass converged"),
        PassOutcome::RetryLater(kinds) => info!(?kinds, "pass finished with failures"),
    }
    Ok(outcome)
}

/// Deletes realm entries that no live record desires. Failures only get
/// logged, the entries belong to no record.
async fn sweep_orphans<E, G>(gateway: &G, global: &EntryMap<E>, actual: &EntryMap<E>)
where
    E: GatewayEntry,
    G: RoutingGateway,
{
    for entry in actual.difference(global).iter() {
        match E::delete(gateway, entry).await {
            Ok(()) => info!("deleted orphan {} {entry}", E::KIND),
            Err(e) if e.is_idempotent_success() => {}
            Err(e) => warn!(%e, "unable to delete orphan {} {entry}", E::KIND),
        }
    }
}
