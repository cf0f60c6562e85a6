//! DID syntax: `did:<method>:<network>:0x<address>`
//!
//! The address is the first 20 bytes of BLAKE3 over the initial controller
//! public key, so a first registration can be checked against its signer.

use super::errors::IdentityError;
use crate::core_crypto::hashing::hash;
use crate::core_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    method: String,
    network: String,
    address: [u8; ADDRESS_LEN],
}

impl Did {
    /// Derive the identifier for an initial controller key
    pub fn from_public_key(method: &str, network: &str, key: &PublicKey) -> Self {
        Self {
            method: method.to_string(),
            network: network.to_string(),
            address: Self::address_for(key),
        }
    }

    fn address_for(key: &PublicKey) -> [u8; ADDRESS_LEN] {
        let digest = hash(key.as_bytes());
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&digest[..ADDRESS_LEN]);
        address
    }

    pub fn parse(value: &str) -> Result<Self, IdentityError> {
        let invalid = |why: &str| IdentityError::InvalidDid(format!("{}: {}", value, why));

        let mut parts = value.splitn(4, ':');
        if parts.next() != Some("did") {
            return Err(invalid("missing did: scheme"));
        }
        let method = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing method"))?;
        let network = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing network"))?;
        let address = parts.next().ok_or_else(|| invalid("missing address"))?;

        let hex_part = address.strip_prefix("0x").ok_or_else(|| invalid("address must start with 0x"))?;
        let bytes = hex::decode(hex_part).map_err(|_| invalid("address is not hex"))?;
        let address: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| invalid("address must be 20 bytes"))?;

        Ok(Self {
            method: method.to_string(),
            network: network.to_string(),
            address,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn address(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// True when this identifier was derived from `key`
    pub fn is_derived_from(&self, key: &PublicKey) -> bool {
        self.address == Self::address_for(key)
    }

    /// DID URL for a fragment, e.g. `did:...#key-1`
    pub fn key_url(&self, fragment: &str) -> String {
        format!("{}#{}", self, fragment)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}:0x{}", self.method, self.network, hex::encode(self.address))
    }
}

impl FromStr for Did {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Did::parse(s)
    }
}

impl TryFrom<String> for Did {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Did::parse(&value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.to_string()
    }
}
