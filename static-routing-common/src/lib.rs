pub mod entry;
pub mod route;
pub mod rule;

pub use entry::{Entry, EntryMap, Expanded};
pub use route::RouteEntry;
pub use rule::{FwMark, PortRange, RuleEntry, Tos, UidRange};
use thiserror::Error;

/// Realm stamped on every route and rule owned by the agent.
pub const REALM: u16 = 216;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    InvalidEntry(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
