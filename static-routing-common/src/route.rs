use std::fmt::{self, Display};
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::{Entry, Error, Result};

/// An IPv4 route in a numbered table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteEntry {
    pub table: u32,
    pub destination: Ipv4Network,
    /// Always set for routes built from records. Kernel routes in the realm
    /// may lack a next hop and still have to be removable.
    pub gateway: Option<Ipv4Addr>,
}

impl RouteEntry {
    pub fn new(table: u32, destination: Ipv4Network, gateway: Ipv4Addr) -> Self {
        Self {
            table,
            destination,
            gateway: Some(gateway),
        }
    }

    /// Parses the string form used in records.
    pub fn parse(table: u32, destination: &str, gateway: &str) -> Result<Self> {
        let dst: Ipv4Network = destination.parse().map_err(|e| {
            Error::InvalidEntry(format!("unable to parse destination {destination}: {e}"))
        })?;
        let gw: Ipv4Addr = gateway.parse().map_err(|e| {
            Error::InvalidEntry(format!("unable to parse gateway {gateway}: {e}"))
        })?;
        let route = Self::new(table, dst, gw);
        route.validate()?;
        Ok(route)
    }

    /// Rejects non-canonical destinations and the unspecified table.
    pub fn validate(&self) -> Result<()> {
        if self.table == 0 {
            return Err(Error::InvalidEntry(format!(
                "route {self} is incorrect, routing table id must be positive"
            )));
        }
        let canonical = canonical_network(self.destination);
        if canonical != self.destination {
            return Err(Error::InvalidEntry(format!(
                "route {self} is incorrect, destination {} is not a valid network address. perhaps {canonical} was meant",
                self.destination
            )));
        }
        Ok(())
    }
}

impl Entry for RouteEntry {}

impl Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(gw) = self.gateway {
            write!(f, " via {gw}")?;
        }
        write!(f, " table {}", self.table)
    }
}

/// The network address of `net`, i.e. `net` with its host bits cleared.
pub fn canonical_network(net: Ipv4Network) -> Ipv4Network {
    // the prefix is already valid, so this cannot fail
    Ipv4Network::new(net.network(), net.prefix()).unwrap_or(net)
}
