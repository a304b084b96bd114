//! VPC with one public subnet tier
//!
//! The address space is split evenly over the availability zones. With no NAT
//! gateways, every subnet routes `0.0.0.0/0` to the internet gateway.

use super::Stack;
use crate::error::{SynthError, SynthResult};
use crate::template::intrinsics::{self, get_azs, select};
use crate::template::{Resource, logical_id};
use repave_common::tags::{TAG_SUBNET_NAME, TAG_SUBNET_TYPE, Tag};
use repave_common::{ComputeConfig, ResourceKind};
use serde_json::json;
use std::net::Ipv4Addr;
use tracing::debug;

/// Name of the only subnet group
pub const PUBLIC_SUBNET_GROUP: &str = "public";

const ANY_IPV4: &str = "0.0.0.0/0";

/// An IPv4 block in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn parse(text: &str) -> SynthResult<Self> {
        let invalid = |reason: &str| SynthError::InvalidConfig(format!("CIDR '{text}' {reason}"));

        let (addr, prefix) = text
            .split_once('/')
            .ok_or_else(|| invalid("is missing a prefix length"))?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid("has an invalid address"))?;
        let prefix: u8 = prefix
            .parse()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| invalid("has an invalid prefix length"))?;

        let bits = u32::from(addr);
        if bits & !Self::mask(prefix) != 0 {
            return Err(invalid("has host bits set"));
        }

        Ok(Self {
            network: addr,
            prefix,
        })
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Split into `count` equal blocks, rounding `count` up to a power of two
    ///
    /// Only the first `count` blocks are returned.
    pub fn split(&self, count: usize) -> SynthResult<Vec<Ipv4Cidr>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let extra_bits = count.next_power_of_two().trailing_zeros() as u8;
        let prefix = self.prefix + extra_bits;
        // AWS does not accept subnets smaller than /28
        if prefix > 28 {
            return Err(SynthError::InvalidConfig(format!(
                "{self} is too small for {count} subnets"
            )));
        }

        let size = 1u64 << (32 - u32::from(prefix));
        let base = u64::from(u32::from(self.network));
        Ok((0..count as u64)
            .map(|i| Ipv4Cidr {
                network: Ipv4Addr::from((base + i * size) as u32),
                prefix,
            })
            .collect())
    }
}

impl std::fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Logical ids of the network resources other constructs attach to
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc_id: String,
    pub public_subnet_ids: Vec<String>,
    /// Resources an instance in a public subnet must wait for
    pub route_ids: Vec<String>,
}

/// Add the VPC, its subnets and internet routing to `stack`
pub fn add_public_vpc(stack: &mut Stack, id: &str, config: &ComputeConfig) -> SynthResult<Network> {
    let cidr = Ipv4Cidr::parse(&config.vpc_cidr)?;
    let blocks = cidr.split(usize::from(config.max_azs))?;
    let stack_name = stack.name().to_string();

    let vpc_id = logical_id(&[id]);
    stack.add(
        &vpc_id,
        Resource::new(ResourceKind::Vpc)
            .property("CidrBlock", cidr.to_string())
            .property("EnableDnsHostnames", true)
            .property("EnableDnsSupport", true)
            .property("InstanceTenancy", "default")
            .property("Tags", json!([Tag::name(&stack_name, id)])),
    )?;

    let igw_id = logical_id(&[id, "IGW"]);
    stack.add(
        &igw_id,
        Resource::new(ResourceKind::InternetGateway)
            .property("Tags", json!([Tag::name(&stack_name, id)])),
    )?;

    let attachment_id = logical_id(&[id, "VPCGW"]);
    stack.add(
        &attachment_id,
        Resource::new(ResourceKind::VpcGatewayAttachment)
            .property("InternetGatewayId", intrinsics::reference(&igw_id))
            .property("VpcId", intrinsics::reference(&vpc_id)),
    )?;

    let mut public_subnet_ids = Vec::with_capacity(blocks.len());
    let mut route_ids = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        let subnet_name = format!("{PUBLIC_SUBNET_GROUP}Subnet{}", index + 1);
        let path = format!("{id}/{subnet_name}");

        let subnet_id = logical_id(&[id, &subnet_name, "Subnet"]);
        stack.add(
            &subnet_id,
            Resource::new(ResourceKind::Subnet)
                .property("AvailabilityZone", select(index, get_azs()))
                .property("CidrBlock", block.to_string())
                .property("MapPublicIpOnLaunch", true)
                .property("VpcId", intrinsics::reference(&vpc_id))
                .property(
                    "Tags",
                    json!([
                        Tag::new(TAG_SUBNET_NAME, PUBLIC_SUBNET_GROUP),
                        Tag::new(TAG_SUBNET_TYPE, "Public"),
                        Tag::name(&stack_name, &path),
                    ]),
                ),
        )?;

        let table_id = logical_id(&[id, &subnet_name, "RouteTable"]);
        stack.add(
            &table_id,
            Resource::new(ResourceKind::RouteTable)
                .property("VpcId", intrinsics::reference(&vpc_id))
                .property("Tags", json!([Tag::name(&stack_name, &path)])),
        )?;

        stack.add(
            &logical_id(&[id, &subnet_name, "RouteTableAssociation"]),
            Resource::new(ResourceKind::SubnetRouteTableAssociation)
                .property("RouteTableId", intrinsics::reference(&table_id))
                .property("SubnetId", intrinsics::reference(&subnet_id)),
        )?;

        let route_id = logical_id(&[id, &subnet_name, "DefaultRoute"]);
        stack.add(
            &route_id,
            Resource::new(ResourceKind::Route)
                .property("DestinationCidrBlock", ANY_IPV4)
                .property("GatewayId", intrinsics::reference(&igw_id))
                .property("RouteTableId", intrinsics::reference(&table_id))
                .depends_on(&attachment_id),
        )?;

        debug!(subnet = %subnet_id, cidr = %block, "Added public subnet");
        public_subnet_ids.push(subnet_id);
        route_ids.push(route_id);
    }

    Ok(Network {
        vpc_id,
        public_subnet_ids,
        route_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr() {
        let cidr = Ipv4Cidr::parse("10.0.0.0/16").unwrap();
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_parse_cidr_rejects_garbage() {
        assert!(Ipv4Cidr::parse("10.0.0.0").is_err());
        assert!(Ipv4Cidr::parse("10.0.0/16").is_err());
        assert!(Ipv4Cidr::parse("10.0.0.0/33").is_err());
        assert!(Ipv4Cidr::parse("10.0.0.1/16").is_err());
    }

    #[test]
    fn test_split_two_ways() {
        let cidr = Ipv4Cidr::parse("10.0.0.0/16").unwrap();
        let blocks: Vec<String> = cidr.split(2).unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(blocks, ["10.0.0.0/17", "10.0.128.0/17"]);
    }

    #[test]
    fn test_split_rounds_up_to_power_of_two() {
        let cidr = Ipv4Cidr::parse("10.0.0.0/16").unwrap();
        let blocks: Vec<String> = cidr.split(3).unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(blocks, ["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18"]);
    }

    #[test]
    fn test_split_rejects_tiny_blocks() {
        let cidr = Ipv4Cidr::parse("10.0.0.0/27").unwrap();
        assert!(cidr.split(2).is_err());
    }

    #[test]
    fn test_public_vpc_resources() {
        let mut stack = Stack::new("compute", "test");
        let network = add_public_vpc(&mut stack, "VPC", &ComputeConfig::default()).unwrap();

        assert_eq!(network.public_subnet_ids.len(), 2);
        let template = stack.template();
        assert_eq!(template.resources_of(ResourceKind::Vpc).count(), 1);
        assert_eq!(template.resources_of(ResourceKind::Subnet).count(), 2);
        assert_eq!(template.resources_of(ResourceKind::Route).count(), 2);
        assert_eq!(template.resources_of(ResourceKind::InternetGateway).count(), 1);

        let subnet = template.resource(&network.public_subnet_ids[1]).unwrap();
        assert_eq!(subnet.get("CidrBlock"), Some(&json!("10.0.128.0/17")));
        assert_eq!(
            subnet.get("AvailabilityZone"),
            Some(&json!({"Fn::Select": [1, {"Fn::GetAZs": ""}]}))
        );
    }
}
