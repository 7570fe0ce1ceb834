//! Environment and CLI configuration shared by the server binaries.
//!
//! Recognized environment variables (spec §6), unknown keys ignored:
//! `OPENTITAN_VAR_DIR`, `OTPROV_PORT_PA`, `OTPROV_PORT_SPM`,
//! `OTPROV_PORT_PB`, `SPM_HSM_TOKEN_SPM`, `SPM_HSM_TOKEN_OFFLINE`,
//! `HSMTOOL_PIN`, `HSMTOOL_MODULE`, `OTPROV_WrappingMechanism`.

use std::path::PathBuf;

/// Key-wrap mechanism selectable via `OTPROV_WrappingMechanism`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrappingMechanism {
    /// RSA-OAEP wrapping.
    RsaOaep,
    /// RSA PKCS#1 v1.5 wrapping.
    RsaPkcs1,
}

impl WrappingMechanism {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RsaOaep" => Some(Self::RsaOaep),
            "RsaPkcs1" => Some(Self::RsaPkcs1),
            _ => None,
        }
    }
}

impl Default for WrappingMechanism {
    fn default() -> Self {
        Self::RsaOaep
    }
}

/// Environment-derived settings, read once at process startup.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    /// Root directory for persisted state and SKU configuration.
    pub var_dir: PathBuf,
    /// HSM token label the SPM logs into for production keys.
    pub hsm_token_spm: Option<String>,
    /// HSM token label used for offline/RMA unwrap operations.
    pub hsm_token_offline: Option<String>,
    /// PIN used to authenticate to the HSM token.
    pub hsm_pin: Option<String>,
    /// Path to the HSM vendor PKCS#11 module (`.so`).
    pub hsm_module: Option<PathBuf>,
    /// Default key-wrap policy applied when a SKU doesn't override it.
    pub wrapping_mechanism: WrappingMechanism,
}

impl EnvSettings {
    /// Read all recognized environment variables, applying documented
    /// defaults for any that are absent. Unrecognized environment keys are
    /// ignored, per spec §6.
    pub fn from_env() -> Self {
        let var_dir = std::env::var("OPENTITAN_VAR_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/opentitan-provisioning"));

        let wrapping_mechanism = std::env::var("OTPROV_WrappingMechanism")
            .ok()
            .and_then(|raw| WrappingMechanism::parse(&raw))
            .unwrap_or_default();

        Self {
            var_dir,
            hsm_token_spm: std::env::var("SPM_HSM_TOKEN_SPM").ok(),
            hsm_token_offline: std::env::var("SPM_HSM_TOKEN_OFFLINE").ok(),
            hsm_pin: std::env::var("HSMTOOL_PIN").ok(),
            hsm_module: std::env::var("HSMTOOL_MODULE").ok().map(PathBuf::from),
            wrapping_mechanism,
        }
    }

    /// Listener port for a named service (`"pa"`, `"spm"`, or `"pb"`),
    /// reading `OTPROV_PORT_<SERVICE>` and falling back to `default_port`.
    pub fn port_for(service: &str, default_port: u16) -> u16 {
        let var = format!("OTPROV_PORT_{}", service.to_uppercase());
        std::env::var(var)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(default_port)
    }
}

/// Shared CLI flags carried by every server binary (spec §6). Each binary
/// embeds this via `#[command(flatten)]` and adds its own service-specific
/// flags (`--spm_address`, `--pb_address`, `--spm_config_dir`, ...).
#[derive(Debug, Clone, clap::Args)]
pub struct CommonArgs {
    /// Listener port; overrides the `OTPROV_PORT_*` environment default.
    #[arg(long)]
    pub port: Option<u16>,

    /// Enable mutually-authenticated TLS on the listener.
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to this service's TLS private key.
    #[arg(long)]
    pub service_key: Option<PathBuf>,

    /// Path to this service's TLS certificate.
    #[arg(long)]
    pub service_cert: Option<PathBuf>,

    /// Path to the CA bundle used to verify peer certificates.
    #[arg(long)]
    pub ca_root_certs: Option<PathBuf>,

    /// Path to the sqlite-backed durable store (PB only).
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Path to the PKCS#11 vendor module (SPM only).
    #[arg(long)]
    pub hsm_so: Option<PathBuf>,

    /// PIN used to open the HSM session (SPM only).
    #[arg(long)]
    pub hsm_pw: Option<String>,

    /// Directory of per-SKU configuration files (SPM only).
    #[arg(long)]
    pub spm_config_dir: Option<PathBuf>,
}

impl CommonArgs {
    /// Resolve the effective listener port: CLI flag, else the
    /// `OTPROV_PORT_<service>` environment variable, else `default_port`.
    pub fn resolved_port(&self, service: &str, default_port: u16) -> u16 {
        self.port
            .unwrap_or_else(|| EnvSettings::port_for(service, default_port))
    }
}
