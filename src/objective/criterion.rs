//! Typed match criteria
//!
//! A [`Criterion`] is one field constraint of a [`TrafficSelector`](super::TrafficSelector).
//! Criteria of the same [`CriterionType`] can be intersected; exact-value
//! criteria intersect only when equal, IP prefixes intersect when one prefix
//! contains the other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

use crate::identifiers::PortNumber;

/// Errors produced when parsing addresses and prefixes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// Malformed MAC address
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// Malformed IP address or prefix
    #[error("invalid IP prefix: {0}")]
    InvalidPrefix(String),

    /// Prefix length exceeds the address width
    #[error("prefix length {length} exceeds {max} bits")]
    PrefixTooLong {
        /// Requested length
        length: u8,
        /// Width of the address family
        max: u8,
    },
}

/// 48-bit Ethernet address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create from raw octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| AddressParseError::InvalidMac(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(AddressParseError::InvalidMac(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// IPv4 or IPv6 prefix, normalized to its network address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IpPrefix {
    address: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Create a prefix, masking host bits off the address
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, AddressParseError> {
        let max = Self::width(&address);
        if prefix_len > max {
            return Err(AddressParseError::PrefixTooLong {
                length: prefix_len,
                max,
            });
        }
        Ok(Self {
            address: Self::mask(address, prefix_len),
            prefix_len,
        })
    }

    /// A host prefix (/32 or /128) for a single address
    pub fn host(address: IpAddr) -> Self {
        Self {
            address,
            prefix_len: Self::width(&address),
        }
    }

    /// Network address
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Prefix length in bits
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// True for IPv4 prefixes
    pub fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// True when `other` lies entirely inside this prefix
    pub fn contains(&self, other: &IpPrefix) -> bool {
        self.is_ipv4() == other.is_ipv4()
            && self.prefix_len <= other.prefix_len
            && Self::mask(other.address, self.prefix_len) == self.address
    }

    /// True when `address` lies inside this prefix
    pub fn contains_address(&self, address: IpAddr) -> bool {
        self.address.is_ipv4() == address.is_ipv4()
            && Self::mask(address, self.prefix_len) == self.address
    }

    /// The more specific of two nested prefixes, or `None` when they are disjoint
    pub fn intersect(&self, other: &IpPrefix) -> Option<IpPrefix> {
        if self.contains(other) {
            Some(*other)
        } else if other.contains(self) {
            Some(*self)
        } else {
            None
        }
    }

    fn width(address: &IpAddr) -> u8 {
        match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    fn mask(address: IpAddr, prefix_len: u8) -> IpAddr {
        match address {
            IpAddr::V4(v4) => {
                let bits = u32::from(v4);
                let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(bits & mask))
            }
            IpAddr::V6(v6) => {
                let bits = u128::from(v6);
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(prefix_len))
                    .unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(bits & mask))
            }
        }
    }
}

impl FromStr for IpPrefix {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError::InvalidPrefix(s.to_string());
        match s.split_once('/') {
            Some((addr, len)) => {
                let address = IpAddr::from_str(addr).map_err(|_| invalid())?;
                let prefix_len = len.parse::<u8>().map_err(|_| invalid())?;
                IpPrefix::new(address, prefix_len)
            }
            None => Ok(IpPrefix::host(IpAddr::from_str(s).map_err(|_| invalid())?)),
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// Optical channel grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GridType {
    /// Dense WDM fixed grid
    Dwdm,
    /// Coarse WDM fixed grid
    Cwdm,
    /// Flexible grid
    Flex,
}

/// Optical channel (lambda) signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OchSignal {
    /// Grid the channel belongs to
    pub grid_type: GridType,
    /// Channel spacing in MHz
    pub channel_spacing_mhz: u32,
    /// Multiplier of the spacing from the anchor frequency
    pub spacing_multiplier: i32,
    /// Width in slots
    pub slot_granularity: u16,
}

/// Optical data unit signal id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OduSignalId {
    /// Tributary port number
    pub tributary_port_number: u32,
    /// Number of tributary slots
    pub tributary_slot_length: u8,
    /// Bitmap of the occupied tributary slots
    pub tributary_slot_bitmap: Vec<u8>,
}

/// Discriminant of [`Criterion`]; a selector holds at most one criterion per type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum CriterionType {
    InPort,
    EthSrc,
    EthDst,
    EthType,
    VlanVid,
    VlanPcp,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    Ipv6Src,
    Ipv6Dst,
    Ipv6FlowLabel,
    TcpSrc,
    TcpDst,
    UdpSrc,
    UdpDst,
    MplsLabel,
    Metadata,
    OchSigId,
    OduSigId,
}

impl CriterionType {
    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            CriterionType::InPort => "IN_PORT",
            CriterionType::EthSrc => "ETH_SRC",
            CriterionType::EthDst => "ETH_DST",
            CriterionType::EthType => "ETH_TYPE",
            CriterionType::VlanVid => "VLAN_VID",
            CriterionType::VlanPcp => "VLAN_PCP",
            CriterionType::IpProto => "IP_PROTO",
            CriterionType::Ipv4Src => "IPV4_SRC",
            CriterionType::Ipv4Dst => "IPV4_DST",
            CriterionType::Ipv6Src => "IPV6_SRC",
            CriterionType::Ipv6Dst => "IPV6_DST",
            CriterionType::Ipv6FlowLabel => "IPV6_FLABEL",
            CriterionType::TcpSrc => "TCP_SRC",
            CriterionType::TcpDst => "TCP_DST",
            CriterionType::UdpSrc => "UDP_SRC",
            CriterionType::UdpDst => "UDP_DST",
            CriterionType::MplsLabel => "MPLS_LABEL",
            CriterionType::Metadata => "METADATA",
            CriterionType::OchSigId => "OCH_SIGID",
            CriterionType::OduSigId => "ODU_SIGID",
        }
    }
}

impl fmt::Display for CriterionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single match criterion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criterion {
    /// Ingress port
    InPort(PortNumber),
    /// Ethernet source address
    EthSrc(MacAddress),
    /// Ethernet destination address
    EthDst(MacAddress),
    /// Ethertype
    EthType(u16),
    /// VLAN id
    VlanVid(u16),
    /// VLAN priority code point
    VlanPcp(u8),
    /// IP protocol number
    IpProto(u8),
    /// IPv4 source prefix
    Ipv4Src(IpPrefix),
    /// IPv4 destination prefix
    Ipv4Dst(IpPrefix),
    /// IPv6 source prefix
    Ipv6Src(IpPrefix),
    /// IPv6 destination prefix
    Ipv6Dst(IpPrefix),
    /// IPv6 flow label
    Ipv6FlowLabel(u32),
    /// TCP source port
    TcpSrc(u16),
    /// TCP destination port
    TcpDst(u16),
    /// UDP source port
    UdpSrc(u16),
    /// UDP destination port
    UdpDst(u16),
    /// MPLS label
    MplsLabel(u32),
    /// Pipeline metadata
    Metadata(u64),
    /// Optical channel signal
    OchSignal(OchSignal),
    /// ODU signal id
    OduSignalId(OduSignalId),
}

impl Criterion {
    /// The type this criterion constrains
    pub fn criterion_type(&self) -> CriterionType {
        match self {
            Criterion::InPort(_) => CriterionType::InPort,
            Criterion::EthSrc(_) => CriterionType::EthSrc,
            Criterion::EthDst(_) => CriterionType::EthDst,
            Criterion::EthType(_) => CriterionType::EthType,
            Criterion::VlanVid(_) => CriterionType::VlanVid,
            Criterion::VlanPcp(_) => CriterionType::VlanPcp,
            Criterion::IpProto(_) => CriterionType::IpProto,
            Criterion::Ipv4Src(_) => CriterionType::Ipv4Src,
            Criterion::Ipv4Dst(_) => CriterionType::Ipv4Dst,
            Criterion::Ipv6Src(_) => CriterionType::Ipv6Src,
            Criterion::Ipv6Dst(_) => CriterionType::Ipv6Dst,
            Criterion::Ipv6FlowLabel(_) => CriterionType::Ipv6FlowLabel,
            Criterion::TcpSrc(_) => CriterionType::TcpSrc,
            Criterion::TcpDst(_) => CriterionType::TcpDst,
            Criterion::UdpSrc(_) => CriterionType::UdpSrc,
            Criterion::UdpDst(_) => CriterionType::UdpDst,
            Criterion::MplsLabel(_) => CriterionType::MplsLabel,
            Criterion::Metadata(_) => CriterionType::Metadata,
            Criterion::OchSignal(_) => CriterionType::OchSigId,
            Criterion::OduSignalId(_) => CriterionType::OduSigId,
        }
    }

    /// Intersect two criteria of the same type
    ///
    /// Prefix criteria keep the more specific of two nested prefixes; every
    /// other criterion intersects only with an identical value. Returns `None`
    /// when no packet can satisfy both.
    pub fn intersect(&self, other: &Criterion) -> Option<Criterion> {
        match (self, other) {
            (Criterion::Ipv4Src(a), Criterion::Ipv4Src(b)) => a.intersect(b).map(Criterion::Ipv4Src),
            (Criterion::Ipv4Dst(a), Criterion::Ipv4Dst(b)) => a.intersect(b).map(Criterion::Ipv4Dst),
            (Criterion::Ipv6Src(a), Criterion::Ipv6Src(b)) => a.intersect(b).map(Criterion::Ipv6Src),
            (Criterion::Ipv6Dst(a), Criterion::Ipv6Dst(b)) => a.intersect(b).map(Criterion::Ipv6Dst),
            _ if self == other => Some(self.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.criterion_type();
        match self {
            Criterion::InPort(port) => write!(f, "{kind}:{port}"),
            Criterion::EthSrc(mac) | Criterion::EthDst(mac) => write!(f, "{kind}:{mac}"),
            Criterion::EthType(value) => write!(f, "{kind}:{value:#06x}"),
            Criterion::VlanVid(value) | Criterion::TcpSrc(value) | Criterion::TcpDst(value)
            | Criterion::UdpSrc(value) | Criterion::UdpDst(value) => write!(f, "{kind}:{value}"),
            Criterion::VlanPcp(value) | Criterion::IpProto(value) => write!(f, "{kind}:{value}"),
            Criterion::Ipv4Src(prefix)
            | Criterion::Ipv4Dst(prefix)
            | Criterion::Ipv6Src(prefix)
            | Criterion::Ipv6Dst(prefix) => write!(f, "{kind}:{prefix}"),
            Criterion::Ipv6FlowLabel(value) | Criterion::MplsLabel(value) => {
                write!(f, "{kind}:{value}")
            }
            Criterion::Metadata(value) => write!(f, "{kind}:{value:#x}"),
            Criterion::OchSignal(signal) => write!(
                f,
                "{kind}:{:?}/{}/{}",
                signal.grid_type, signal.spacing_multiplier, signal.slot_granularity
            ),
            Criterion::OduSignalId(signal) => {
                write!(f, "{kind}:{}", signal.tributary_port_number)
            }
        }
    }
}
