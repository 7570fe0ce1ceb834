//! Generated RPC bindings for the three provisioning services.
//!
//! Each module wraps the `tonic::include_proto!` output for one `.proto`
//! package compiled by `build.rs`.

/// Shared message/enum types (`DeviceData`, `KeyParams`, lifecycle enums).
pub mod common {
    tonic::include_proto!("otprov.common");
}

/// SPM RPC surface (spec §4.3).
pub mod spm {
    tonic::include_proto!("otprov.spm");
}

/// PB RPC surface (spec §4.5).
pub mod pb {
    tonic::include_proto!("otprov.pb");
}

/// PA RPC surface (spec §4.4).
pub mod pa {
    tonic::include_proto!("otprov.pa");
}
