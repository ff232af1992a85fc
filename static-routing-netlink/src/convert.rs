//! Conversions between entries and rtnetlink messages. Nothing here touches
//! a socket.

use std::net::{IpAddr, Ipv4Addr};

use ipnetwork::Ipv4Network;
use netlink_packet_route::route::{
    RouteAddress, RouteAttribute, RouteMessage, RouteProtocol,
    RouteRealm, RouteScope, RouteType,
};
use netlink_packet_route::rule::{
    RuleAction, RuleAttribute, RuleFlag, RuleHeader, RuleMessage, RulePortRange, RuleUidRange,
};
use netlink_packet_route::{AddressFamily, IpProtocol};
use nix::libc;
use static_routing_common::{FwMark, PortRange, REALM, RouteEntry, RuleEntry, Tos, UidRange};

use crate::Error;

/// Header value announcing that the table id lives in the table attribute.
const RT_TABLE_COMPAT: u8 = 252;

fn realm() -> RouteRealm {
    RouteRealm {
        source: 0,
        destination: REALM,
    }
}

fn is_realm(candidate: &RouteRealm) -> bool {
    candidate.source == 0 && candidate.destination == REALM
}

fn header_table(table: u32) -> u8 {
    u8::try_from(table).unwrap_or(RT_TABLE_COMPAT)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operation {
    Add,
    Delete,
}

/// Builds the message for adding or deleting `route` with the realm stamped.
pub(crate) fn route_message(route: &RouteEntry, op: Operation) -> RouteMessage {
    let mut message = RouteMessage::default();
    message.header.address_family = AddressFamily::Inet;
    message.header.destination_prefix_length = route.destination.prefix();
    message.header.table = header_table(route.table);
    message.header.scope = RouteScope::Universe;
    message.header.kind = RouteType::Unicast;
    message.header.flags = Vec::new();
    // deletes match any protocol so entries written by other tools in the
    // realm can still be removed
    message.header.protocol = match op {
        Operation::Add => RouteProtocol::Static,
        Operation::Delete => RouteProtocol::Unspec,
    };

    if route.destination.prefix() > 0 {
        message
            .attributes
            .push(RouteAttribute::Destination(RouteAddress::Inet(
                route.destination.network(),
            )));
    }
    if let Some(gateway) = route.gateway {
        message
            .attributes
            .push(RouteAttribute::Gateway(RouteAddress::Inet(gateway)));
    }
    message.attributes.push(RouteAttribute::Table(route.table));
    message.attributes.push(RouteAttribute::Realm(realm()));
    message
}

/// Converts a kernel route. Returns `None` for routes outside the realm or
/// that are not IPv4.
pub(crate) fn route_from_message(message: &RouteMessage) -> Option<RouteEntry> {
    if message.header.address_family != AddressFamily::Inet {
        return None;
    }

    let mut in_realm = false;
    let mut table = u32::from(message.header.table);
    let mut destination = Ipv4Addr::UNSPECIFIED;
    let mut gateway = None;
    for attribute in &message.attributes {
        match attribute {
            RouteAttribute::Realm(r) => in_realm = is_realm(r),
            RouteAttribute::Table(t) => table = *t,
            RouteAttribute::Destination(RouteAddress::Inet(addr)) => destination = *addr,
            RouteAttribute::Gateway(RouteAddress::Inet(addr)) => gateway = Some(*addr),
            _ => {}
        }
    }
    if !in_realm {
        return None;
    }
    let destination =
        Ipv4Network::new(destination, message.header.destination_prefix_length).ok()?;
    Some(RouteEntry {
        table,
        destination,
        gateway,
    })
}

/// Builds the message for adding or deleting `rule`. Every selector is part
/// of the key the kernel matches on delete.
pub(crate) fn rule_message(rule: &RuleEntry) -> RuleMessage {
    let mut flags = Vec::new();
    if rule.invert {
        flags.push(RuleFlag::Invert);
    }

    let mut message = RuleMessage::default();
    message.header = RuleHeader {
        family: AddressFamily::Inet,
        dst_len: rule.destination.map(|d| d.prefix()).unwrap_or_default(),
        src_len: rule.source.map(|s| s.prefix()).unwrap_or_default(),
        tos: rule.tos.0,
        table: header_table(rule.table),
        action: RuleAction::ToTable,
        flags,
    };

    let attributes = &mut message.attributes;
    attributes.push(RuleAttribute::Table(rule.table));
    attributes.push(RuleAttribute::Realm(realm()));
    if rule.priority > 0 {
        attributes.push(RuleAttribute::Priority(rule.priority));
    }
    if let Some(source) = rule.source {
        attributes.push(RuleAttribute::Source(IpAddr::V4(source.network())));
    }
    if let Some(destination) = rule.destination {
        attributes.push(RuleAttribute::Destination(IpAddr::V4(destination.network())));
    }
    if let Some(mark) = rule.fw_mark {
        attributes.push(RuleAttribute::FwMark(mark.mark));
        attributes.push(RuleAttribute::FwMask(mark.mask.unwrap_or(u32::MAX)));
    }
    if !rule.iif.is_empty() {
        attributes.push(RuleAttribute::Iifname(rule.iif.clone()));
    }
    if !rule.oif.is_empty() {
        attributes.push(RuleAttribute::Oifname(rule.oif.clone()));
    }
    if rule.ip_proto != 0 {
        attributes.push(RuleAttribute::IpProtocol(IpProtocol::from(i32::from(
            rule.ip_proto,
        ))));
    }
    if let Some(sport) = rule.sport {
        attributes.push(RuleAttribute::SourcePortRange(RulePortRange {
            start: sport.start,
            end: sport.end,
        }));
    }
    if let Some(dport) = rule.dport {
        attributes.push(RuleAttribute::DestinationPortRange(RulePortRange {
            start: dport.start,
            end: dport.end,
        }));
    }
    if let Some(uid) = rule.uid_range {
        attributes.push(RuleAttribute::UidRange(RuleUidRange {
            start: uid.start,
            end: uid.end,
        }));
    }
    message
}

/// Converts a kernel rule. Absent selectors map to their unset value.
pub(crate) fn rule_from_message(message: &RuleMessage) -> Option<RuleEntry> {
    if message.header.family != AddressFamily::Inet {
        return None;
    }

    let mut in_realm = false;
    let mut rule = RuleEntry {
        invert: message.header.flags.contains(&RuleFlag::Invert),
        tos: Tos(message.header.tos),
        table: u32::from(message.header.table),
        ..Default::default()
    };
    let mut mark = None;
    let mut mask = None;
    for attribute in &message.attributes {
        match attribute {
            RuleAttribute::Realm(r) => in_realm = is_realm(r),
            RuleAttribute::Table(t) => rule.table = *t,
            RuleAttribute::Priority(p) => rule.priority = *p,
            RuleAttribute::Source(IpAddr::V4(addr)) => {
                rule.source = Ipv4Network::new(*addr, message.header.src_len).ok();
            }
            RuleAttribute::Destination(IpAddr::V4(addr)) => {
                rule.destination = Ipv4Network::new(*addr, message.header.dst_len).ok();
            }
            RuleAttribute::FwMark(m) => mark = Some(*m),
            RuleAttribute::FwMask(m) => mask = Some(*m),
            RuleAttribute::Iifname(name) => rule.iif = name.clone(),
            RuleAttribute::Oifname(name) => rule.oif = name.clone(),
            RuleAttribute::IpProtocol(proto) => {
                rule.ip_proto = u8::try_from(i32::from(*proto)).unwrap_or_default();
            }
            RuleAttribute::SourcePortRange(range) => {
                rule.sport = Some(PortRange {
                    start: range.start,
                    end: range.end,
                });
            }
            RuleAttribute::DestinationPortRange(range) => {
                rule.dport = Some(PortRange {
                    start: range.start,
                    end: range.end,
                });
            }
            RuleAttribute::UidRange(range) => {
                rule.uid_range = Some(UidRange {
                    start: range.start,
                    end: range.end,
                });
            }
            _ => {}
        }
    }
    if !in_realm {
        return None;
    }
    rule.fw_mark = match (mark, mask) {
        (Some(mark), mask) => Some(FwMark::new(mark, mask)),
        // a mask alone selects mark zero
        (None, Some(mask)) => Some(FwMark::new(0, Some(mask))),
        (None, None) => None,
    };
    Some(rule)
}

/// Maps an rtnetlink failure of a write onto the gateway error kinds.
pub(crate) fn write_error(err: rtnetlink::Error) -> Error {
    if let rtnetlink::Error::NetlinkError(message) = &err {
        match message.to_io().raw_os_error() {
            Some(libc::EEXIST) => return Error::AlreadyExists,
            Some(libc::ENOENT) | Some(libc::ESRCH) => return Error::NotFound,
            _ => {}
        }
    }
    Error::KernelWrite(err.to_string())
}

pub(crate) fn read_error(err: rtnetlink::Error) -> Error {
    Error::KernelRead(err.to_string())
}
