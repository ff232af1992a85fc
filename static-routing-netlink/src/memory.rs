use std::collections::BTreeSet;
use std::sync::Mutex;

use static_routing_common::{EntryMap, RouteEntry, RuleEntry};

use crate::{Error, Result, RoutingGateway};

/// Highest priority the kernel hands out to rules added without one.
const FIRST_AUTO_PRIORITY: u32 = 32765;

/// A mutation issued against a gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    AddRoute(RouteEntry),
    DeleteRoute(RouteEntry),
    AddRule(RuleEntry),
    DeleteRule(RuleEntry),
}

/// Gateway holding realm routes and rules in memory, mirroring the kernel's
/// observable behavior.
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    routes: EntryMap<RouteEntry>,
    rules: EntryMap<RuleEntry>,
    calls: Vec<GatewayCall>,
    failing: BTreeSet<String>,
    fail_reads: bool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a realm route in place without going through the gateway.
    pub fn insert_route(&self, route: RouteEntry) {
        self.state.lock().unwrap().routes.insert(route);
    }

    pub fn insert_rule(&self, rule: RuleEntry) {
        self.state.lock().unwrap().rules.insert(rule);
    }

    pub fn routes(&self) -> EntryMap<RouteEntry> {
        self.state.lock().unwrap().routes.clone()
    }

    pub fn rules(&self) -> EntryMap<RuleEntry> {
        self.state.lock().unwrap().rules.clone()
    }

    /// Mutations issued so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Makes every write of the entry with this display form fail.
    pub fn fail_writes_for(&self, entry: impl ToString) {
        self.state.lock().unwrap().failing.insert(entry.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    fn write(&self, call: GatewayCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let key = match &call {
            GatewayCall::AddRoute(r) | GatewayCall::DeleteRoute(r) => r.to_string(),
            GatewayCall::AddRule(r) | GatewayCall::DeleteRule(r) => r.to_string(),
        };
        state.calls.push(call.clone());
        if state.failing.contains(&key) {
            return Err(Error::KernelWrite(format!("injected failure for {key}")));
        }
        match call {
            GatewayCall::AddRoute(route) => {
                route.validate()?;
                if !state.routes.insert(route) {
                    return Err(Error::AlreadyExists);
                }
            }
            GatewayCall::DeleteRoute(route) => {
                route.validate()?;
                if !state.routes.remove(&route) {
                    return Err(Error::NotFound);
                }
            }
            GatewayCall::AddRule(mut rule) => {
                rule.validate()?;
                if rule.priority == 0 {
                    let lowest = state
                        .rules
                        .iter()
                        .map(|r| r.priority)
                        .filter(|p| *p > 0)
                        .min()
                        .map(|p| p.saturating_sub(1))
                        .unwrap_or(FIRST_AUTO_PRIORITY);
                    rule.priority = lowest.min(FIRST_AUTO_PRIORITY);
                }
                if !state.rules.insert(rule) {
                    return Err(Error::AlreadyExists);
                }
            }
            GatewayCall::DeleteRule(rule) => {
                rule.validate()?;
                if !state.rules.remove(&rule) {
                    return Err(Error::NotFound);
                }
            }
        }
        Ok(())
    }

    fn read(&self) -> Result<()> {
        if self.state.lock().unwrap().fail_reads {
            return Err(Error::KernelRead("injected read failure".into()));
        }
        Ok(())
    }
}

impl RoutingGateway for InMemoryGateway {
    async fn list_routes_in_realm(&self) -> Result<EntryMap<RouteEntry>> {
        self.read()?;
        Ok(self.routes())
    }

    async fn add_route(&self, route: &RouteEntry) -> Result<()> {
        self.write(GatewayCall::AddRoute(*route))
    }

    async fn delete_route(&self, route: &RouteEntry) -> Result<()> {
        self.write(GatewayCall::DeleteRoute(*route))
    }

    async fn list_rules_in_realm(&self) -> Result<EntryMap<RuleEntry>> {
        self.read()?;
        Ok(self.rules())
    }

    async fn add_rule(&self, rule: &RuleEntry) -> Result<()> {
        self.write(GatewayCall::AddRule(rule.clone()))
    }

    async fn delete_rule(&self, rule: &RuleEntry) -> Result<()> {
        self.write(GatewayCall::DeleteRule(rule.clone()))
    }
}
