use std::fmt::{self, Display};
use std::str::FromStr;

use ipnetwork::Ipv4Network;

use crate::{Entry, Error, Result};

/// Inclusive port range selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// A zero start leaves the selector unset, a missing or zero end
    /// collapses the range to a single port.
    pub fn from_bounds(start: u16, end: Option<u16>) -> Result<Option<Self>> {
        let Some((start, end)) = normalize_bounds(start, end)? else {
            return Ok(None);
        };
        Ok(Some(Self { start, end }))
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Inclusive uid range selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UidRange {
    pub start: u32,
    pub end: u32,
}

impl UidRange {
    pub fn from_bounds(start: u32, end: Option<u32>) -> Result<Option<Self>> {
        let Some((start, end)) = normalize_bounds(start, end)? else {
            return Ok(None);
        };
        Ok(Some(Self { start, end }))
    }
}

impl Display for UidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn normalize_bounds<T>(start: T, end: Option<T>) -> Result<Option<(T, T)>>
where
    T: Copy + Default + PartialOrd + Display,
{
    if start == T::default() {
        return Ok(None);
    }
    let end = match end {
        Some(end) if end != T::default() => end,
        _ => start,
    };
    if end < start {
        return Err(Error::InvalidEntry(format!(
            "range {start}-{end} is incorrect, end is lower than start"
        )));
    }
    Ok(Some((start, end)))
}

/// Firewall mark with an optional mask. A full mask is the kernel default and
/// is stored as no mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FwMark {
    pub mark: u32,
    pub mask: Option<u32>,
}

impl FwMark {
    pub fn new(mark: u32, mask: Option<u32>) -> Self {
        Self {
            mark,
            mask: mask.filter(|m| *m != u32::MAX),
        }
    }
}

impl FromStr for FwMark {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (mark, mask) = match s.split_once('/') {
            Some((mark, mask)) => (mark, Some(mask)),
            None => (s, None),
        };
        let mark = parse_hex::<u32>(mark, s, "fwmark")?;
        let mask = mask.map(|m| parse_hex::<u32>(m, s, "fwmark")).transpose()?;
        Ok(Self::new(mark, mask))
    }
}

impl Display for FwMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.mark)?;
        if let Some(mask) = self.mask {
            write!(f, "/{mask:#x}")?;
        }
        Ok(())
    }
}

/// Type of service byte. Zero means no selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tos(pub u8);

impl FromStr for Tos {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex::<u8>(s, s, "tos").map(Tos)
    }
}

impl Display for Tos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

trait FromHex: Sized {
    fn from_hex(s: &str) -> std::result::Result<Self, std::num::ParseIntError>;
}

impl FromHex for u8 {
    fn from_hex(s: &str) -> std::result::Result<Self, std::num::ParseIntError> {
        u8::from_str_radix(s, 16)
    }
}

impl FromHex for u32 {
    fn from_hex(s: &str) -> std::result::Result<Self, std::num::ParseIntError> {
        u32::from_str_radix(s, 16)
    }
}

fn parse_hex<T: FromHex>(value: &str, whole: &str, what: &str) -> Result<T> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| {
            Error::InvalidEntry(format!("unable to parse {what} {whole}: expected 0x prefix"))
        })?;
    T::from_hex(digits)
        .map_err(|e| Error::InvalidEntry(format!("unable to parse {what} {whole}: {e}")))
}

/// An IPv4 policy routing rule. Every field takes part in identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleEntry {
    /// Zero leaves the choice to the kernel.
    pub priority: u32,
    pub invert: bool,
    pub source: Option<Ipv4Network>,
    pub destination: Option<Ipv4Network>,
    pub ip_proto: u8,
    pub sport: Option<PortRange>,
    pub dport: Option<PortRange>,
    pub tos: Tos,
    pub fw_mark: Option<FwMark>,
    pub iif: String,
    pub oif: String,
    pub uid_range: Option<UidRange>,
    pub table: u32,
}

impl RuleEntry {
    pub fn validate(&self) -> Result<()> {
        if self.table == 0 {
            return Err(Error::InvalidEntry(format!(
                "rule {self} is incorrect, routing table id must be positive"
            )));
        }
        Ok(())
    }
}

impl Entry for RuleEntry {
    fn matches_kernel(&self, actual: &Self) -> bool {
        if self.priority != 0 {
            return self == actual;
        }
        let adopted = RuleEntry {
            priority: actual.priority,
            ..self.clone()
        };
        adopted == *actual
    }
}

impl Display for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.priority != 0 {
            write!(f, "prio {} ", self.priority)?;
        }
        if self.invert {
            f.write_str("not ")?;
        }
        match self.source {
            Some(src) => write!(f, "from {src}")?,
            None => f.write_str("from all")?,
        }
        if let Some(dst) = self.destination {
            write!(f, " to {dst}")?;
        }
        if self.tos.0 != 0 {
            write!(f, " tos {}", self.tos)?;
        }
        if let Some(mark) = self.fw_mark {
            write!(f, " fwmark {mark}")?;
        }
        if !self.iif.is_empty() {
            write!(f, " iif {}", self.iif)?;
        }
        if !self.oif.is_empty() {
            write!(f, " oif {}", self.oif)?;
        }
        if self.ip_proto != 0 {
            write!(f, " ipproto {}", self.ip_proto)?;
        }
        if let Some(sport) = self.sport {
            write!(f, " sport {sport}")?;
        }
        if let Some(dport) = self.dport {
            write!(f, " dport {dport}")?;
        }
        if let Some(uid) = self.uid_range {
            write!(f, " uidrange {uid}")?;
        }
        write!(f, " lookup {}", self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fwmark() -> Result<()> {
        assert_eq!("0x10".parse::<FwMark>()?, FwMark::new(0x10, None));
        assert_eq!("0x10/0xff".parse::<FwMark>()?, FwMark::new(0x10, Some(0xff)));
        assert_eq!("0x10/0xffffffff".parse::<FwMark>()?, FwMark::new(0x10, None));
        assert_eq!(FwMark::new(0x10, Some(0xff)).to_string(), "0x10/0xff");
        assert!("16".parse::<FwMark>().is_err());
        assert!("0xzz".parse::<FwMark>().is_err());
        Ok(())
    }

    #[test]
    fn test_fwmark_mask_is_part_of_identity() {
        let a = RuleEntry {
            fw_mark: Some(FwMark::new(0x10, Some(0xff))),
            table: 300,
            ..Default::default()
        };
        let b = RuleEntry {
            fw_mark: Some(FwMark::new(0x10, Some(0xf0))),
            ..a.clone()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_tos() -> Result<()> {
        assert_eq!("0x10".parse::<Tos>()?, Tos(0x10));
        assert_eq!(Tos(0x10).to_string(), "0x10");
        assert!("0x100".parse::<Tos>().is_err());
        Ok(())
    }

    #[test]
    fn test_range_with_only_start() -> Result<()> {
        assert_eq!(
            PortRange::from_bounds(8080, None)?,
            Some(PortRange {
                start: 8080,
                end: 8080
            })
        );
        assert_eq!(
            PortRange::from_bounds(8080, Some(0))?,
            Some(PortRange {
                start: 8080,
                end: 8080
            })
        );
        assert_eq!(PortRange::from_bounds(0, Some(80))?, None);
        assert!(UidRange::from_bounds(100, Some(10)).is_err());
        Ok(())
    }

    #[test]
    fn test_unset_priority_adopts_kernel_priority() {
        let desired = RuleEntry {
            source: Some("192.168.0.0/24".parse().unwrap()),
            table: 300,
            ..Default::default()
        };
        let kernel = RuleEntry {
            priority: 32765,
            ..desired.clone()
        };
        assert!(desired.matches_kernel(&kernel));

        let pinned = RuleEntry {
            priority: 100,
            ..desired.clone()
        };
        assert!(!pinned.matches_kernel(&kernel));

        let other_table = RuleEntry {
            table: 301,
            ..kernel.clone()
        };
        assert!(!desired.matches_kernel(&other_table));
    }

    #[test]
    fn test_display() {
        let rule = RuleEntry {
            priority: 100,
            source: Some("192.168.0.0/24".parse().unwrap()),
            destination: Some("10.0.0.0/8".parse().unwrap()),
            sport: Some(PortRange { start: 80, end: 80 }),
            table: 300,
            ..Default::default()
        };
        assert_eq!(
            rule.to_string(),
            "prio 100 from 192.168.0.0/24 to 10.0.0.0/8 sport 80-80 lookup 300"
        );
    }
}
