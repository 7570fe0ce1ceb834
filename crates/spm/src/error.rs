//! Mapping from this crate's internal failure modes to the shared error
//! taxonomy (spec §4.3 "Failure semantics").

use otprov_core::error::ProvisioningError;
use otprov_pkcs11_adapter::HsmError;
use otprov_sku_config::SkuConfigError;

/// HSM-layer errors surface as `internal` (spec §4.3): the caller has no
/// actionable recourse, and the underlying mechanism detail is not part of
/// the RPC contract.
pub fn from_hsm_error(err: HsmError) -> ProvisioningError {
    ProvisioningError::internal(err.to_string())
}

/// A missing SKU surfaces as `not_found`; any other SKU-config failure
/// (malformed TOML, failed one-time init) as `internal`.
pub fn from_sku_config_error(err: SkuConfigError) -> ProvisioningError {
    err.into()
}
