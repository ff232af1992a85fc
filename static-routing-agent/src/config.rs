use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use static_routing_controller::ControllerConfig;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Commands {
    /// Run the node agent
    Agent(AgentArgs),
    /// Print the CustomResourceDefinitions as YAML
    Crdgen,
}

#[derive(Parser, Debug, Clone)]
pub struct AgentArgs {
    /// Name of the node the agent is running on
    #[arg(long, env = "NODE_NAME")]
    pub node_name: String,

    /// Network namespace the routes and rules are managed in
    #[arg(long, env = "NETNS_PATH", default_value = "/proc/1/ns/net")]
    pub netns_path: PathBuf,

    /// Seconds between full passes, independent of record events
    #[arg(
        long,
        env = "PERIODIC_RECONCILE_INTERVAL",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub periodic_reconcile_interval: u64,

    /// Seconds to wait before retrying a failed pass
    #[arg(
        long,
        env = "REQUEUE_INTERVAL",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub requeue_interval: u64,

    /// Health listener for the agent
    #[arg(long, env = "HEALTH_ADDRESS", default_value = "0.0.0.0:9695")]
    pub health_address: SocketAddr,
}

impl AgentArgs {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            node_name: self.node_name.clone(),
            periodic_reconcile_interval: Duration::from_secs(self.periodic_reconcile_interval),
            requeue_interval: Duration::from_secs(self.requeue_interval),
        }
    }
}
