use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read records: {0}")]
    ClusterRead(#[source] kube::Error),

    #[error("failed to patch record: {0}")]
    ClusterWrite(#[source] kube::Error),

    #[error("kernel error: {0}")]
    Kernel(#[from] static_routing_netlink::Error),

    #[error("kube utils error: {0}")]
    KubeUtils(#[from] static_routing_k8s_utils::Error),

    #[error("record has no name")]
    MissingName,
}

/// Failure classes a pass can run into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    InvalidEntry,
    KernelRead,
    KernelWrite,
    ClusterRead,
    ClusterWrite,
}

impl FailureKind {
    /// Invalid entries fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::InvalidEntry)
    }
}

impl From<&static_routing_netlink::Error> for FailureKind {
    fn from(err: &static_routing_netlink::Error) -> Self {
        use static_routing_netlink::Error as E;
        match err {
            E::InvalidEntry(_) => FailureKind::InvalidEntry,
            E::KernelRead(_) => FailureKind::KernelRead,
            E::AlreadyExists | E::NotFound | E::KernelWrite(_) | E::Namespace(_) | E::Io(_) => {
                FailureKind::KernelWrite
            }
        }
    }
}

impl From<&Error> for FailureKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::ClusterRead(_) | Error::KubeUtils(_) | Error::MissingName => {
                FailureKind::ClusterRead
            }
            Error::ClusterWrite(_) => FailureKind::ClusterWrite,
            Error::Kernel(e) => e.into(),
        }
    }
}
