//! Traffic treatments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use super::criterion::MacAddress;
use super::instruction::{FieldModification, Instruction};
use crate::identifiers::{GroupId, PortNumber};

/// Ordered list of instructions applied to matching packets
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficTreatment {
    instructions: Vec<Instruction>,
}

impl TrafficTreatment {
    /// A treatment with no instructions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a treatment
    pub fn builder() -> TrafficTreatmentBuilder {
        TrafficTreatmentBuilder::default()
    }

    /// Build from an instruction list
    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// The instructions, in order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// True when there are no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// This treatment's instructions followed by `other`'s
    pub fn concat(&self, other: &TrafficTreatment) -> TrafficTreatment {
        let mut instructions = Vec::with_capacity(self.instructions.len() + other.instructions.len());
        instructions.extend_from_slice(&self.instructions);
        instructions.extend_from_slice(&other.instructions);
        TrafficTreatment { instructions }
    }
}

impl fmt::Display for TrafficTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{instruction}")?;
        }
        f.write_str("]")
    }
}

/// Builder for [`TrafficTreatment`]
#[derive(Debug, Default)]
pub struct TrafficTreatmentBuilder {
    instructions: Vec<Instruction>,
}

impl TrafficTreatmentBuilder {
    /// Append an arbitrary instruction
    pub fn add(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Append a field rewrite
    pub fn modify(self, modification: FieldModification) -> Self {
        self.add(Instruction::Modify(modification))
    }

    /// Output to a port
    pub fn set_output(self, port: PortNumber) -> Self {
        self.add(Instruction::Output(port))
    }

    /// Hand to a group
    pub fn group(self, group: GroupId) -> Self {
        self.add(Instruction::Group(group))
    }

    /// Continue in table `table`
    pub fn transition(self, table: u32) -> Self {
        self.add(Instruction::Table(table))
    }

    /// Write metadata under a mask
    pub fn write_metadata(self, metadata: u64, mask: u64) -> Self {
        self.add(Instruction::WriteMetadata { metadata, mask })
    }

    /// Rewrite the Ethernet source
    pub fn set_eth_src(self, mac: MacAddress) -> Self {
        self.modify(FieldModification::EthSrc(mac))
    }

    /// Rewrite the Ethernet destination
    pub fn set_eth_dst(self, mac: MacAddress) -> Self {
        self.modify(FieldModification::EthDst(mac))
    }

    /// Rewrite the VLAN id
    pub fn set_vlan_id(self, vlan: u16) -> Self {
        self.modify(FieldModification::VlanId(vlan))
    }

    /// Rewrite the MPLS label
    pub fn set_mpls_label(self, label: u32) -> Self {
        self.modify(FieldModification::MplsLabel(label))
    }

    /// Rewrite the IP source (v4 or v6 by address family)
    pub fn set_ip_src(self, address: IpAddr) -> Self {
        match address {
            IpAddr::V4(v4) => self.modify(FieldModification::Ipv4Src(v4)),
            IpAddr::V6(v6) => self.modify(FieldModification::Ipv6Src(v6)),
        }
    }

    /// Rewrite the IP destination (v4 or v6 by address family)
    pub fn set_ip_dst(self, address: IpAddr) -> Self {
        match address {
            IpAddr::V4(v4) => self.modify(FieldModification::Ipv4Dst(v4)),
            IpAddr::V6(v6) => self.modify(FieldModification::Ipv6Dst(v6)),
        }
    }

    /// Finish building
    pub fn build(self) -> TrafficTreatment {
        TrafficTreatment {
            instructions: self.instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_keeps_order_and_duplicates() {
        let a = TrafficTreatment::builder()
            .set_output(PortNumber::new(1))
            .build();
        let b = TrafficTreatment::builder()
            .set_output(PortNumber::new(1))
            .transition(2)
            .build();
        let joined = a.concat(&b);
        assert_eq!(
            joined.instructions(),
            &[
                Instruction::Output(PortNumber::new(1)),
                Instruction::Output(PortNumber::new(1)),
                Instruction::Table(2),
            ]
        );
        assert_eq!(joined.to_string(), "[OUTPUT:1, OUTPUT:1, TABLE:2]");
    }
}
