use std::collections::BTreeSet;

use kube::ResourceExt;
use static_routing_common::EntryMap;
use static_routing_netlink::{self as netlink, GatewayEntry, RoutingGateway};
use tracing::{debug, info, warn};

use crate::{FailureKind, NodeRecord};

/// Outcome of one record within a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ReconciliationStatus {
    errors: Vec<String>,
    kinds: BTreeSet<FailureKind>,
}

impl ReconciliationStatus {
    pub(crate) fn record(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.kinds.insert(kind);
        self.errors.push(message.into());
    }

    pub(crate) fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn kinds(&self) -> &BTreeSet<FailureKind> {
        &self.kinds
    }

    /// Every error, one per line.
    pub(crate) fn message(&self) -> String {
        self.errors.join("\n")
    }
}

/// Per record bookkeeping of a pass.
pub(crate) struct RecordSummary<K: NodeRecord> {
    pub(crate) record: K,
    pub(crate) name: String,
    to_add: EntryMap<K::Entry>,
    to_delete: EntryMap<K::Entry>,
    pub(crate) was_deleted: bool,
    pub(crate) wipe_finalizer: bool,
    pub(crate) status: ReconciliationStatus,
}

impl<K: NodeRecord> RecordSummary<K> {
    /// Works out what `record` wants added and removed. Entries a live record
    /// desires are folded into `global`.
    ///
    /// Entries are resolved against `claimable`, the kernel entries no record
    /// desires verbatim, so an unset priority never takes over a rule another
    /// record pinned.
    pub(crate) fn discover(
        record: K,
        actual: &EntryMap<K::Entry>,
        claimable: &EntryMap<K::Entry>,
        global: &mut EntryMap<K::Entry>,
    ) -> Self {
        let name = record.name_any();
        let mut status = ReconciliationStatus::default();

        if record.meta().deletion_timestamp.is_some() {
            // entries that fail to expand were never written to the kernel
            let mut to_delete = record.desired().entries;
            to_delete.resolve_against(claimable);
            return Self {
                record,
                name,
                to_add: EntryMap::new(),
                to_delete,
                was_deleted: true,
                wipe_finalizer: false,
                status,
            };
        }

        let desired = record.desired();
        for error in &desired.errors {
            status.record(FailureKind::InvalidEntry, error.to_string());
        }
        let mut desired = desired.entries;
        desired.resolve_against(claimable);
        global.extend(desired.iter());

        let mut last_applied = record.last_applied().entries;
        last_applied.resolve_against(claimable);

        Self {
            to_add: desired.difference(actual),
            to_delete: last_applied.difference(&desired),
            record,
            name,
            was_deleted: false,
            wipe_finalizer: false,
            status,
        }
    }

    pub(crate) async fn add_entries<G: RoutingGateway>(
        &mut self,
        gateway: &G,
        actual: &mut EntryMap<K::Entry>,
    ) {
        let kind = <K::Entry as GatewayEntry>::KIND;
        for entry in self.to_add.iter() {
            if actual.contains(entry) {
                continue;
            }
            match K::Entry::add(gateway, entry).await {
                Ok(()) => {
                    info!(record = %self.name, "added {kind} {entry}");
                    actual.insert(entry.clone());
                }
                Err(netlink::Error::AlreadyExists) => {
                    debug!(record = %self.name, "{kind} {entry} already present");
                    actual.insert(entry.clone());
                }
                Err(e) => {
                    warn!(record = %self.name, %e, "unable to add {kind} {entry}");
                    self.status
                        .record((&e).into(), format!("unable to add {kind} {entry}: {e}"));
                }
            }
        }
    }

    /// Removes entries the record no longer wants, unless another record
    /// still desires them.
    pub(crate) async fn delete_entries<G: RoutingGateway>(
        &mut self,
        gateway: &G,
        global: &EntryMap<K::Entry>,
        actual: &mut EntryMap<K::Entry>,
    ) {
        let kind = <K::Entry as GatewayEntry>::KIND;
        for entry in self.to_delete.iter() {
            if global.contains(entry) {
                debug!(record = %self.name, "{kind} {entry} is still desired, keeping it");
                continue;
            }
            if !actual.contains(entry) {
                continue;
            }
            match K::Entry::delete(gateway, entry).await {
                Ok(()) => {
                    info!(record = %self.name, "deleted {kind} {entry}");
                    actual.remove(entry);
                }
                Err(netlink::Error::NotFound) => {
                    debug!(record = %self.name, "{kind} {entry} already gone");
                    actual.remove(entry);
                }
                Err(e) => {
                    warn!(record = %self.name, %e, "unable to delete {kind} {entry}");
                    self.status
                        .record((&e).into(), format!("unable to delete {kind} {entry}: {e}"));
                }
            }
        }
        if self.was_deleted && self.status.is_success() {
            self.wipe_finalizer = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_joins_errors() {
        let mut status = ReconciliationStatus::default();
        assert!(status.is_success());
        status.record(FailureKind::InvalidEntry, "first");
        status.record(FailureKind::KernelWrite, "second");
        assert!(!status.is_success());
        assert_eq!(status.message(), "first\nsecond");
        assert_eq!(status.kinds().len(), 2);
    }
}
