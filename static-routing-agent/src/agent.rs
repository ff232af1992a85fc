use std::sync::Arc;

use static_routing_controller::start_routing_controllers;
use static_routing_netlink::NetlinkGateway;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;
use crate::config::AgentArgs;

/// Runs both record controllers against the kernel of `args.netns_path`
/// until cancelled. `ready` is cancelled once the controllers are watching.
pub async fn start(args: AgentArgs, ready: CancellationToken, cancel: CancellationToken) -> Result<()> {
    let kube_client = kube::Client::try_default().await?;
    let gateway = Arc::new(NetlinkGateway::new(args.netns_path.clone()));
    info!(
        node = %args.node_name,
        netns = %args.netns_path.display(),
        "starting static routing agent"
    );

    start_routing_controllers(
        kube_client,
        gateway,
        args.controller_config(),
        ready,
        cancel,
    )
    .await?;
    info!("routing controllers stopped");
    Ok(())
}
