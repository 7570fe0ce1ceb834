//! The Proxy Buffer service: a thin RPC facade over
//! [`otprov_pb_store::RecordStore`] (spec §4.5).
#![warn(missing_docs)]

pub mod service;

pub use service::PbService;
