use std::sync::Arc;

use kube::{ResourceExt, runtime::controller::Action};
use static_routing_netlink::RoutingGateway;
use tracing::{debug, error, trace, warn};

use crate::context::Context;
use crate::status::is_up_to_date;
use crate::{Error, NodeRecord, PassOutcome, RecordClient, Result};

#[tracing::instrument(skip(record, ctx), fields(record = %record.name_any()))]
pub(crate) async fn reconcile<K, C, G>(record: Arc<K>, ctx: Arc<Context<K, C, G>>) -> Result<Action>
where
    K: NodeRecord,
    C: RecordClient<K>,
    G: RoutingGateway,
{
    if !ctx.scope.matches(record.labels()) || record.node_name() != ctx.scope.node_name() {
        debug!("record is addressed at {}, skipping", record.node_name());
        return Ok(Action::await_change());
    }
    if is_up_to_date(record.as_ref()) {
        trace!("record is up to date");
        return Ok(Action::await_change());
    }

    match ctx.run_pass().await? {
        outcome @ PassOutcome::RetryLater(_) if outcome.should_requeue() => {
            warn!(?outcome, "requeueing after failed pass");
            Ok(Action::requeue(ctx.requeue_interval))
        }
        _ => Ok(Action::await_change()),
    }
}

pub(crate) fn error_policy<K, C, G>(record: Arc<K>, error: &Error, ctx: Arc<Context<K, C, G>>) -> Action
where
    K: NodeRecord,
    C: RecordClient<K>,
    G: RoutingGateway,
{
    error!(?error, "reconcile error for {}", record.name_any());
    Action::requeue(ctx.requeue_interval)
}
