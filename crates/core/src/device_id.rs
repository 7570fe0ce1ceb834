//! `DeviceId`: the 256-bit identity assigned to every provisioned device
//! (spec §3).
//!
//! ```text
//! silicon_creator_id (16b) | product_id (16b) | device_identification_number (64b)
//!   | reserved (32b) | sku_specific (0 or 128b)
//! ```
//!
//! The canonical hex form concatenates the fields MSB-first. `sku_specific`
//! is variable length (0 or 16 bytes) so the decoded form is either 16 or
//! 32 bytes (32 or 64 hex chars) wide, not counting the `0x` prefix.

use crate::error::ProvisioningError;
use std::fmt;
use std::str::FromStr;

/// A parsed device identity (spec §3 `DeviceId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub silicon_creator_id: u16,
    pub product_id: u16,
    pub device_identification_number: u64,
    pub reserved: u32,
    pub sku_specific: Vec<u8>,
}

impl DeviceId {
    /// Build a `DeviceId`, rejecting any `sku_specific` length other than
    /// 0 or 16 bytes.
    pub fn new(
        silicon_creator_id: u16,
        product_id: u16,
        device_identification_number: u64,
        reserved: u32,
        sku_specific: Vec<u8>,
    ) -> Result<Self, ProvisioningError> {
        if !matches!(sku_specific.len(), 0 | 16) {
            return Err(ProvisioningError::invalid_argument(format!(
                "sku_specific must be 0 or 16 bytes, got {}",
                sku_specific.len()
            )));
        }
        Ok(Self {
            silicon_creator_id,
            product_id,
            device_identification_number,
            reserved,
            sku_specific,
        })
    }

    /// Validate `silicon_creator_id`/`product_id` against SKU-supplied
    /// allow-lists (spec §3: "enumerated"; the enumeration itself is
    /// SKU-configuration-supplied, see SPEC_FULL.md §3.1).
    pub fn validate_enumerated(
        &self,
        known_silicon_creator_ids: &[u16],
        known_product_ids: &[u16],
    ) -> Result<(), ProvisioningError> {
        if !known_silicon_creator_ids.contains(&self.silicon_creator_id) {
            return Err(ProvisioningError::invalid_argument(format!(
                "unknown silicon_creator_id: {:#06x}",
                self.silicon_creator_id
            )));
        }
        if !known_product_ids.contains(&self.product_id) {
            return Err(ProvisioningError::invalid_argument(format!(
                "unknown product_id: {:#06x}",
                self.product_id
            )));
        }
        Ok(())
    }

    /// Serialize to the fixed-width big-endian byte layout used to build
    /// the canonical hex form.
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16 + self.sku_specific.len());
        bytes.extend_from_slice(&self.silicon_creator_id.to_be_bytes());
        bytes.extend_from_slice(&self.product_id.to_be_bytes());
        bytes.extend_from_slice(&self.device_identification_number.to_be_bytes());
        bytes.extend_from_slice(&self.reserved.to_be_bytes());
        bytes.extend_from_slice(&self.sku_specific);
        bytes
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

impl FromStr for DeviceId {
    type Err = ProvisioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| ProvisioningError::invalid_argument(format!("malformed device id hex: {e}")))?;

        if bytes.len() != 16 && bytes.len() != 32 {
            return Err(ProvisioningError::invalid_argument(format!(
                "device id must decode to 16 or 32 bytes, got {}",
                bytes.len()
            )));
        }

        let silicon_creator_id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let product_id = u16::from_be_bytes([bytes[2], bytes[3]]);
        let device_identification_number = u64::from_be_bytes(bytes[4..12].try_into().unwrap());
        let reserved = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
        let sku_specific = bytes[16..].to_vec();

        Ok(Self {
            silicon_creator_id,
            product_id,
            device_identification_number,
            reserved,
            sku_specific,
        })
    }
}
