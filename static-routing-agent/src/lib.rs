pub mod agent;
pub mod config;
pub mod http;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("controller error: {0}")]
    Controller(#[from] static_routing_controller::Error),

    #[error("failed to generate crds: {0}")]
    Crd(#[from] static_routing_crds::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
