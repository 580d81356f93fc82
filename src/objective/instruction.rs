//! Treatment instructions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::criterion::{Criterion, CriterionType, MacAddress, OchSignal, OduSignalId};
use crate::identifiers::{GroupId, PortNumber};

/// A rewrite of one header field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldModification {
    /// Set Ethernet source
    EthSrc(MacAddress),
    /// Set Ethernet destination
    EthDst(MacAddress),
    /// Set VLAN id
    VlanId(u16),
    /// Set VLAN priority
    VlanPcp(u8),
    /// Set MPLS label
    MplsLabel(u32),
    /// Set IPv4 source
    Ipv4Src(Ipv4Addr),
    /// Set IPv4 destination
    Ipv4Dst(Ipv4Addr),
    /// Set IPv6 source
    Ipv6Src(Ipv6Addr),
    /// Set IPv6 destination
    Ipv6Dst(Ipv6Addr),
    /// Set IPv6 flow label
    Ipv6FlowLabel(u32),
    /// Set TCP source port
    TcpSrc(u16),
    /// Set TCP destination port
    TcpDst(u16),
    /// Set UDP source port
    UdpSrc(u16),
    /// Set UDP destination port
    UdpDst(u16),
    /// Retune the optical channel
    OchSignal(OchSignal),
    /// Set the ODU signal id
    OduSignalId(OduSignalId),
}

impl FieldModification {
    /// The criterion type whose field this modification writes
    pub fn target(&self) -> CriterionType {
        match self {
            FieldModification::EthSrc(_) => CriterionType::EthSrc,
            FieldModification::EthDst(_) => CriterionType::EthDst,
            FieldModification::VlanId(_) => CriterionType::VlanVid,
            FieldModification::VlanPcp(_) => CriterionType::VlanPcp,
            FieldModification::MplsLabel(_) => CriterionType::MplsLabel,
            FieldModification::Ipv4Src(_) => CriterionType::Ipv4Src,
            FieldModification::Ipv4Dst(_) => CriterionType::Ipv4Dst,
            FieldModification::Ipv6Src(_) => CriterionType::Ipv6Src,
            FieldModification::Ipv6Dst(_) => CriterionType::Ipv6Dst,
            FieldModification::Ipv6FlowLabel(_) => CriterionType::Ipv6FlowLabel,
            FieldModification::TcpSrc(_) => CriterionType::TcpSrc,
            FieldModification::TcpDst(_) => CriterionType::TcpDst,
            FieldModification::UdpSrc(_) => CriterionType::UdpSrc,
            FieldModification::UdpDst(_) => CriterionType::UdpDst,
            FieldModification::OchSignal(_) => CriterionType::OchSigId,
            FieldModification::OduSignalId(_) => CriterionType::OduSigId,
        }
    }

    /// Whether a packet carrying the written value satisfies `criterion`
    ///
    /// Written addresses satisfy a prefix criterion when they fall inside it;
    /// all other fields must match exactly.
    pub fn satisfies(&self, criterion: &Criterion) -> bool {
        match (self, criterion) {
            (FieldModification::EthSrc(v), Criterion::EthSrc(c))
            | (FieldModification::EthDst(v), Criterion::EthDst(c)) => v == c,
            (FieldModification::VlanId(v), Criterion::VlanVid(c)) => v == c,
            (FieldModification::VlanPcp(v), Criterion::VlanPcp(c)) => v == c,
            (FieldModification::MplsLabel(v), Criterion::MplsLabel(c))
            | (FieldModification::Ipv6FlowLabel(v), Criterion::Ipv6FlowLabel(c)) => v == c,
            (FieldModification::Ipv4Src(v), Criterion::Ipv4Src(p))
            | (FieldModification::Ipv4Dst(v), Criterion::Ipv4Dst(p)) => {
                p.contains_address(IpAddr::V4(*v))
            }
            (FieldModification::Ipv6Src(v), Criterion::Ipv6Src(p))
            | (FieldModification::Ipv6Dst(v), Criterion::Ipv6Dst(p)) => {
                p.contains_address(IpAddr::V6(*v))
            }
            (FieldModification::TcpSrc(v), Criterion::TcpSrc(c))
            | (FieldModification::TcpDst(v), Criterion::TcpDst(c))
            | (FieldModification::UdpSrc(v), Criterion::UdpSrc(c))
            | (FieldModification::UdpDst(v), Criterion::UdpDst(c)) => v == c,
            (FieldModification::OchSignal(v), Criterion::OchSignal(c)) => v == c,
            (FieldModification::OduSignalId(v), Criterion::OduSignalId(c)) => v == c,
            _ => false,
        }
    }
}

/// One step of a treatment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Send out of a port
    Output(PortNumber),
    /// Hand to a group
    Group(GroupId),
    /// Continue in another table
    Table(u32),
    /// Write pipeline metadata
    WriteMetadata {
        /// Metadata value
        metadata: u64,
        /// Bits of `metadata` that are written
        mask: u64,
    },
    /// Rewrite a header field
    Modify(FieldModification),
}

impl Instruction {
    /// The field modification carried by this instruction, if any
    pub fn modification(&self) -> Option<&FieldModification> {
        match self {
            Instruction::Modify(modification) => Some(modification),
            Instruction::Output(_)
            | Instruction::Group(_)
            | Instruction::Table(_)
            | Instruction::WriteMetadata { .. } => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Output(port) => write!(f, "OUTPUT:{port}"),
            Instruction::Group(group) => write!(f, "GROUP:{group}"),
            Instruction::Table(table) => write!(f, "TABLE:{table}"),
            Instruction::WriteMetadata { metadata, mask } => {
                write!(f, "METADATA:{metadata:#x}/{mask:#x}")
            }
            Instruction::Modify(modification) => write!(f, "SET_{modification:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modification_targets() {
        assert_eq!(
            FieldModification::Ipv4Dst(Ipv4Addr::new(2, 0, 0, 1)).target(),
            CriterionType::Ipv4Dst
        );
        assert_eq!(FieldModification::VlanId(10).target(), CriterionType::VlanVid);
    }

    #[test]
    fn test_address_write_satisfies_enclosing_prefix() {
        let write = FieldModification::Ipv4Dst(Ipv4Addr::new(2, 0, 0, 1));
        assert!(write.satisfies(&Criterion::Ipv4Dst("2.0.0.1/32".parse().unwrap())));
        assert!(write.satisfies(&Criterion::Ipv4Dst("2.0.0.0/8".parse().unwrap())));
        assert!(!write.satisfies(&Criterion::Ipv4Dst("2.0.0.2/32".parse().unwrap())));
        assert!(!write.satisfies(&Criterion::Ipv4Src("2.0.0.1/32".parse().unwrap())));
    }

    #[test]
    fn test_non_field_instructions_carry_no_modification() {
        assert!(Instruction::Output(PortNumber::new(1)).modification().is_none());
        assert!(Instruction::Table(2).modification().is_none());
        assert!(Instruction::Modify(FieldModification::TcpDst(80))
            .modification()
            .is_some());
    }
}
