use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::serde::de::DeserializeOwned;
use kube::api::ListParams;
use kube::core::{Expression, Selector, SelectorExt};
use kube::runtime::reflector::{ReflectHandle, Store};
use kube::runtime::{WatchStreamExt, reflector, watcher};
use kube::{Api, Resource};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to create store: {0}")]
    StoreCreation(String),

    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Restricts cluster-scoped records to the ones addressed at one node through
/// a node-name label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeScope {
    label: String,
    node_name: String,
}

impl NodeScope {
    pub fn new(label: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn selector(&self) -> Selector {
        Expression::Equal(self.label.clone(), self.node_name.clone()).into()
    }

    /// Server side filter for watches.
    pub fn watcher_config(&self) -> watcher::Config {
        watcher::Config::default().labels_from(&self.selector())
    }

    /// Server side filter for lists.
    pub fn list_params(&self) -> ListParams {
        ListParams::default().labels_from(&self.selector())
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.selector().matches(labels)
    }
}

/// Starts a label filtered reflector for `K` and waits until its store is
/// populated.
pub async fn create_store_and_subscriber<K>(
    api: Api<K>,
    config: watcher::Config,
    timeout: Option<Duration>,
) -> Result<(Store<K>, ReflectHandle<K>)>
where
    K: Resource + Send + Clone + Debug + DeserializeOwned + Sync + 'static,
    <K as Resource>::DynamicType: Default + Eq + Send + DeserializeOwned + Hash + Clone,
{
    let (store, writer) = reflector::store_shared(256);
    let subscriber: ReflectHandle<K> = writer
        .subscribe()
        .ok_or_else(|| Error::StoreCreation("failed to create subscriber".into()))?;

    let stream = watcher(api, config)
        .default_backoff()
        .reflect_shared(writer)
        .for_each(|res| async move {
            match res {
                Ok(ev) => trace!("received event: {:?}", ev),
                Err(e) => {
                    error!(%e, "unexpected error with stream")
                }
            }
        });

    tokio::spawn(stream);
    let wait = store.wait_until_ready();
    if let Some(timeout) = timeout {
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::StoreCreation("timed out waiting for store".into()))?
            .map_err(|e| Error::StoreCreation(e.to_string()))?;
    } else {
        wait.await
            .map_err(|e| Error::StoreCreation(e.to_string()))?;
    }
    Ok((store, subscriber))
}

pub async fn shutdown(cancel: CancellationToken) {
    cancel.cancelled().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_node_scope_matches_label() {
        let scope = NodeScope::new("example.com/node-name", "node-a");
        assert!(scope.matches(&labels(&[("example.com/node-name", "node-a")])));
        assert!(!scope.matches(&labels(&[("example.com/node-name", "node-b")])));
        assert!(!scope.matches(&labels(&[])));
    }

    #[test]
    fn test_node_scope_selectors() {
        let scope = NodeScope::new("example.com/node-name", "node-a");
        assert_eq!(
            scope.list_params().label_selector.as_deref(),
            Some("example.com/node-name=node-a")
        );
        assert_eq!(
            scope.watcher_config().label_selector.as_deref(),
            Some("example.com/node-name=node-a")
        );
    }
}
