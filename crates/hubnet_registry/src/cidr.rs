//! IPv4 CIDR value object.
//!
//! Invariants:
//! - prefix length is 0-32
//! - the address is the network address (no host bits below the prefix)
//!
//! ```rust
//! use hubnet_registry::Ipv4Cidr;
//!
//! let vnet: Ipv4Cidr = "10.20.0.0/16".parse().unwrap();
//! let subnet: Ipv4Cidr = "10.20.1.0/24".parse().unwrap();
//! assert!(vnet.contains(&subnet));
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Build a CIDR from an address and prefix length.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, RegistryError> {
        let text = format!("{}/{}", network, prefix);
        if prefix > 32 {
            return Err(RegistryError::InvalidCidr {
                cidr: text,
                reason: "prefix length must be 0-32".to_string(),
            });
        }
        if u32::from(network) & !Self::mask_for(prefix) != 0 {
            return Err(RegistryError::InvalidCidr {
                cidr: text,
                reason: "host bits set below the prefix".to_string(),
            });
        }
        Ok(Self { network, prefix })
    }

    /// The default route, 0.0.0.0/0.
    pub fn any() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            prefix: 0,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses covered.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn mask_for(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    fn first(&self) -> u32 {
        u32::from(self.network)
    }

    fn last(&self) -> u32 {
        self.first() | !Self::mask_for(self.prefix)
    }

    /// True if `other` lies entirely within this network.
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix && other.first() >= self.first() && other.last() <= self.last()
    }

    /// True if the two networks share at least one address.
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }
}

impl FromStr for Ipv4Cidr {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RegistryError::InvalidCidr {
            cidr: s.to_string(),
            reason: reason.to_string(),
        };

        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected <address>/<prefix>"))?;
        let network = Ipv4Addr::from_str(addr).map_err(|_| invalid("invalid IPv4 address"))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| invalid("invalid prefix length"))?;

        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
