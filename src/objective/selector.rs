//! Traffic selectors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::criterion::{Criterion, CriterionType, IpPrefix, MacAddress};
use crate::identifiers::PortNumber;

/// A set of match criteria, at most one per [`CriterionType`]
///
/// Criteria are kept ordered by type, so equal selectors hash equally
/// regardless of the order their criteria were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficSelector {
    criteria: BTreeMap<CriterionType, Criterion>,
}

impl TrafficSelector {
    /// A selector that matches everything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a selector
    pub fn builder() -> TrafficSelectorBuilder {
        TrafficSelectorBuilder::default()
    }

    /// Build from criteria; later criteria replace earlier ones of the same type
    pub fn from_criteria(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        let mut selector = Self::default();
        for criterion in criteria {
            selector.insert(criterion);
        }
        selector
    }

    /// The criterion of the given type, if present
    pub fn get(&self, kind: CriterionType) -> Option<&Criterion> {
        self.criteria.get(&kind)
    }

    /// Iterate over the criteria in type order
    pub fn criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.values()
    }

    /// Number of criteria
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// True when the selector matches everything
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub(crate) fn insert(&mut self, criterion: Criterion) {
        self.criteria.insert(criterion.criterion_type(), criterion);
    }

    pub(crate) fn remove(&mut self, kind: CriterionType) -> Option<Criterion> {
        self.criteria.remove(&kind)
    }
}

impl fmt::Display for TrafficSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, criterion) in self.criteria.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{criterion}")?;
        }
        f.write_str("]")
    }
}

/// Builder for [`TrafficSelector`]
#[derive(Debug, Default)]
pub struct TrafficSelectorBuilder {
    selector: TrafficSelector,
}

impl TrafficSelectorBuilder {
    /// Add an arbitrary criterion
    pub fn add(mut self, criterion: Criterion) -> Self {
        self.selector.insert(criterion);
        self
    }

    /// Match the ingress port
    pub fn match_in_port(self, port: PortNumber) -> Self {
        self.add(Criterion::InPort(port))
    }

    /// Match the Ethernet source
    pub fn match_eth_src(self, mac: MacAddress) -> Self {
        self.add(Criterion::EthSrc(mac))
    }

    /// Match the Ethernet destination
    pub fn match_eth_dst(self, mac: MacAddress) -> Self {
        self.add(Criterion::EthDst(mac))
    }

    /// Match the ethertype
    pub fn match_eth_type(self, eth_type: u16) -> Self {
        self.add(Criterion::EthType(eth_type))
    }

    /// Match the VLAN id
    pub fn match_vlan_id(self, vlan: u16) -> Self {
        self.add(Criterion::VlanVid(vlan))
    }

    /// Match the IP protocol
    pub fn match_ip_proto(self, proto: u8) -> Self {
        self.add(Criterion::IpProto(proto))
    }

    /// Match the IP source prefix (v4 or v6 by prefix family)
    pub fn match_ip_src(self, prefix: IpPrefix) -> Self {
        if prefix.is_ipv4() {
            self.add(Criterion::Ipv4Src(prefix))
        } else {
            self.add(Criterion::Ipv6Src(prefix))
        }
    }

    /// Match the IP destination prefix (v4 or v6 by prefix family)
    pub fn match_ip_dst(self, prefix: IpPrefix) -> Self {
        if prefix.is_ipv4() {
            self.add(Criterion::Ipv4Dst(prefix))
        } else {
            self.add(Criterion::Ipv6Dst(prefix))
        }
    }

    /// Match the TCP destination port
    pub fn match_tcp_dst(self, port: u16) -> Self {
        self.add(Criterion::TcpDst(port))
    }

    /// Match the UDP destination port
    pub fn match_udp_dst(self, port: u16) -> Self {
        self.add(Criterion::UdpDst(port))
    }

    /// Match the MPLS label
    pub fn match_mpls_label(self, label: u32) -> Self {
        self.add(Criterion::MplsLabel(label))
    }

    /// Finish building
    pub fn build(self) -> TrafficSelector {
        self.selector
    }
}
