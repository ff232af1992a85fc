use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use static_routing_k8s_utils::NodeScope;
use static_routing_netlink::RoutingGateway;
use tokio::sync::Mutex;

use crate::{NodeRecord, PassOutcome, RecordClient, Result, pass};

pub struct Context<K, C, G> {
    pub scope: NodeScope,
    pub client: C,
    pub gateway: Arc<G>,
    pub requeue_interval: Duration,
    /// Serializes passes triggered by events and by the timer.
    pass_lock: Mutex<()>,
    _record: PhantomData<fn() -> K>,
}

impl<K, C, G> Context<K, C, G>
where
    K: NodeRecord,
    C: RecordClient<K>,
    G: RoutingGateway,
{
    pub fn new(scope: NodeScope, client: C, gateway: Arc<G>, requeue_interval: Duration) -> Self {
        Self {
            scope,
            client,
            gateway,
            requeue_interval,
            pass_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let _guard = self.pass_lock.lock().await;
        pass::run_pass::<K, C, G>(&self.scope, &self.client, self.gateway.as_ref()).await
    }
}
