use kube::Api;
use kube::api::{Patch, PatchParams};
use serde_json::Value;
use static_routing_k8s_utils::NodeScope;

use crate::NodeRecord;

/// The cluster operations a pass needs on one record kind.
pub trait RecordClient<K>: Send + Sync + 'static {
    /// Records labeled for the node in `scope`.
    fn list(&self, scope: &NodeScope) -> impl Future<Output = kube::Result<Vec<K>>> + Send;

    /// Merge patch on the status subresource.
    fn patch_status(&self, name: &str, patch: &Value)
    -> impl Future<Output = kube::Result<()>> + Send;

    /// Merge patch on the record itself.
    fn patch_metadata(
        &self,
        name: &str,
        patch: &Value,
    ) -> impl Future<Output = kube::Result<()>> + Send;
}

pub struct KubeRecordClient<K> {
    api: Api<K>,
}

impl<K> KubeRecordClient<K> {
    pub fn new(api: Api<K>) -> Self {
        Self { api }
    }
}

impl<K: NodeRecord> RecordClient<K> for KubeRecordClient<K> {
    async fn list(&self, scope: &NodeScope) -> kube::Result<Vec<K>> {
        Ok(self.api.list(&scope.list_params()).await?.items)
    }

    async fn patch_status(&self, name: &str, patch: &Value) -> kube::Result<()> {
        self.api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn patch_metadata(&self, name: &str, patch: &Value) -> kube::Result<()> {
        self.api
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
