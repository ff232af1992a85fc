use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::reflector::{ReflectHandle, Store};
use kube::runtime::{Config, Controller};
use kube::{Api, Client};
use static_routing_crds::NODE_NAME_LABEL;
use static_routing_crds::v1alpha1::ipruleset::NodeIPRuleSet;
use static_routing_crds::v1alpha1::routingtable::NodeRoutingTable;
use static_routing_k8s_utils::{NodeScope, create_store_and_subscriber, shutdown};
use static_routing_netlink::RoutingGateway;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::controller::{error_policy, reconcile};
use crate::{KubeRecordClient, NodeRecord, RecordClient, Result};

const STORE_READY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub node_name: String,
    pub periodic_reconcile_interval: Duration,
    pub requeue_interval: Duration,
}

/// Runs the route and rule controllers until `cancel` fires. `ready` is
/// cancelled once both watches have synced.
pub async fn start_routing_controllers<G: RoutingGateway>(
    client: Client,
    gateway: Arc<G>,
    config: ControllerConfig,
    ready: CancellationToken,
    cancel: CancellationToken,
) -> Result<()> {
    let (routes, rules) = tokio::try_join!(
        RecordController::<NodeRoutingTable, G>::prepare(client.clone(), gateway.clone(), &config),
        RecordController::<NodeIPRuleSet, G>::prepare(client, gateway, &config),
    )?;
    ready.cancel();
    info!(node = %config.node_name, "routing controllers started");

    tokio::join!(routes.run(cancel.clone()), rules.run(cancel));
    Ok(())
}

type KubeContext<K, G> = Context<K, KubeRecordClient<K>, G>;

/// The event and timer driven loop of one record kind.
struct RecordController<K: NodeRecord, G> {
    ctx: Arc<KubeContext<K, G>>,
    store: Store<K>,
    subscriber: ReflectHandle<K>,
    periodic_reconcile_interval: Duration,
}

impl<K, G> RecordController<K, G>
where
    K: NodeRecord,
    G: RoutingGateway,
{
    async fn prepare(client: Client, gateway: Arc<G>, config: &ControllerConfig) -> Result<Self> {
        let scope = NodeScope::new(NODE_NAME_LABEL, config.node_name.clone());
        let api = Api::<K>::all(client);
        let (store, subscriber) =
            create_store_and_subscriber(api.clone(), scope.watcher_config(), Some(STORE_READY_TIMEOUT))
                .await?;
        let ctx = Arc::new(Context::new(
            scope,
            KubeRecordClient::new(api),
            gateway,
            config.requeue_interval,
        ));
        Ok(Self {
            ctx,
            store,
            subscriber,
            periodic_reconcile_interval: config.periodic_reconcile_interval,
        })
    }

    async fn run(self, cancel: CancellationToken) {
        let ticker = tokio::spawn(periodic(
            self.ctx.clone(),
            self.periodic_reconcile_interval,
            cancel.clone(),
        ));

        // one reconcile at a time, the pass covers every record of the kind
        let config = Config::default().concurrency(1);
        Controller::for_shared_stream(self.subscriber, self.store)
            .graceful_shutdown_on(shutdown(cancel))
            .with_config(config)
            .run(
                reconcile::<K, KubeRecordClient<K>, G>,
                error_policy::<K, KubeRecordClient<K>, G>,
                self.ctx,
            )
            .for_each(|res| async move {
                match res {
                    Ok((record, _)) => debug!(record = %record.name, "reconciled"),
                    Err(e) => warn!(%e, "reconcile failed"),
                }
            })
            .await;

        if let Err(e) = ticker.await {
            error!(%e, "periodic reconcile task failed");
        }
    }
}

/// Runs a full pass every `interval` regardless of events, so orphans are
/// swept and kernel drift is repaired even without records.
async fn periodic<K, C, G>(
    ctx: Arc<Context<K, C, G>>,
    interval: Duration,
    cancel: CancellationToken,
) where
    K: NodeRecord,
    C: RecordClient<K>,
    G: RoutingGateway,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match ctx.run_pass().await {
                Ok(outcome) if outcome.should_requeue() => {
                    warn!(kind = %K::kind(&()), ?outcome, "periodic pass failed")
                }
                Ok(_) => debug!(kind = %K::kind(&()), "periodic pass finished"),
                Err(e) => error!(kind = %K::kind(&()), %e, "periodic pass aborted"),
            },
        }
    }
    debug!(kind = %K::kind(&()), "periodic reconcile stopped");
}
