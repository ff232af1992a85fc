use std::path::PathBuf;

use futures::TryStreamExt;
use rtnetlink::{Handle, IpVersion};
use static_routing_common::{EntryMap, RouteEntry, RuleEntry};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::convert::{self, Operation};
use crate::{Error, Result, RoutingGateway};

/// Gateway speaking rtnetlink inside the network namespace found at a path.
#[derive(Clone, Debug)]
pub struct NetlinkGateway {
    netns_path: PathBuf,
}

/// A netlink connection bound to the namespace. The connection task is
/// aborted when the session goes out of scope.
struct Session {
    handle: Handle,
    connection: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

impl NetlinkGateway {
    pub fn new(netns_path: impl Into<PathBuf>) -> Self {
        Self {
            netns_path: netns_path.into(),
        }
    }

    async fn session(&self) -> Result<Session> {
        let path = self.netns_path.clone();
        // entering a network namespace affects the entire thread, so the
        // socket is opened from the blocking pool and the namespace is
        // restored before the thread is handed back
        let (connection, handle, _) = tokio::task::spawn_blocking(move || -> Result<_> {
            let netns = netns_rs::get_from_path(&path)?;
            trace!("opening netlink socket in {}", netns);
            Ok(netns.run(|_| rtnetlink::new_connection())??)
        })
        .await
        .map_err(|e| Error::KernelRead(format!("netlink session task failed: {e}")))??;

        Ok(Session {
            handle,
            connection: tokio::spawn(connection),
        })
    }
}

impl RoutingGateway for NetlinkGateway {
    async fn list_routes_in_realm(&self) -> Result<EntryMap<RouteEntry>> {
        let session = self.session().await?;
        let mut stream = session.handle.route().get(IpVersion::V4).execute();
        let mut routes = EntryMap::new();
        while let Some(message) = stream.try_next().await.map_err(convert::read_error)? {
            if let Some(route) = convert::route_from_message(&message) {
                routes.insert(route);
            }
        }
        debug!("found {} routes in realm", routes.len());
        Ok(routes)
    }

    async fn add_route(&self, route: &RouteEntry) -> Result<()> {
        route.validate()?;
        let session = self.session().await?;
        let mut request = session.handle.route().add().v4();
        *request.message_mut() = convert::route_message(route, Operation::Add);
        request.execute().await.map_err(convert::write_error)
    }

    async fn delete_route(&self, route: &RouteEntry) -> Result<()> {
        route.validate()?;
        let session = self.session().await?;
        session
            .handle
            .route()
            .del(convert::route_message(route, Operation::Delete))
            .execute()
            .await
            .map_err(convert::write_error)
    }

    async fn list_rules_in_realm(&self) -> Result<EntryMap<RuleEntry>> {
        let session = self.session().await?;
        let mut stream = session.handle.rule().get(IpVersion::V4).execute();
        let mut rules = EntryMap::new();
        while let Some(message) = stream.try_next().await.map_err(convert::read_error)? {
            if let Some(rule) = convert::rule_from_message(&message) {
                rules.insert(rule);
            }
        }
        debug!("found {} rules in realm", rules.len());
        Ok(rules)
    }

    async fn add_rule(&self, rule: &RuleEntry) -> Result<()> {
        rule.validate()?;
        let session = self.session().await?;
        let mut request = session.handle.rule().add().v4();
        *request.message_mut() = convert::rule_message(rule);
        request.execute().await.map_err(convert::write_error)
    }

    async fn delete_rule(&self, rule: &RuleEntry) -> Result<()> {
        rule.validate()?;
        let session = self.session().await?;
        session
            .handle
            .rule()
            .del(convert::rule_message(rule))
            .execute()
            .await
            .map_err(convert::write_error)
    }
}
