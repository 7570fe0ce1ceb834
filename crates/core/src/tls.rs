//! Shared TLS wiring for the three server binaries (spec §6: "TLS optional
//! but the default for production. Server verifies client certificate
//! against a CA bundle; client verifies server likewise.").

use std::path::Path;

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::config::CommonArgs;

/// Build a mutually-authenticated [`ServerTlsConfig`] from `--service_key`,
/// `--service_cert`, and `--ca_root_certs`, or `None` when `--enable_tls`
/// wasn't passed.
pub fn server_tls_config(args: &CommonArgs) -> anyhow::Result<Option<ServerTlsConfig>> {
    if !args.enable_tls {
        return Ok(None);
    }
    let key_path = args.service_key.as_ref().ok_or_else(|| anyhow::anyhow!("--service_key is required when --enable_tls is set"))?;
    let cert_path = args.service_cert.as_ref().ok_or_else(|| anyhow::anyhow!("--service_cert is required when --enable_tls is set"))?;
    let ca_path = args.ca_root_certs.as_ref().ok_or_else(|| anyhow::anyhow!("--ca_root_certs is required when --enable_tls is set"))?;

    let identity = Identity::from_pem(read(cert_path)?, read(key_path)?);
    let ca = Certificate::from_pem(read(ca_path)?);

    Ok(Some(ServerTlsConfig::new().identity(identity).client_ca_root(ca).client_auth_optional(false)))
}

/// Build a [`ClientTlsConfig`] for an outbound connection to a peer
/// service, verifying it against the same CA bundle and presenting the
/// same client identity, when TLS is enabled.
pub fn client_tls_config(args: &CommonArgs, domain_name: &str) -> anyhow::Result<Option<ClientTlsConfig>> {
    if !args.enable_tls {
        return Ok(None);
    }
    let key_path = args.service_key.as_ref().ok_or_else(|| anyhow::anyhow!("--service_key is required when --enable_tls is set"))?;
    let cert_path = args.service_cert.as_ref().ok_or_else(|| anyhow::anyhow!("--service_cert is required when --enable_tls is set"))?;
    let ca_path = args.ca_root_certs.as_ref().ok_or_else(|| anyhow::anyhow!("--ca_root_certs is required when --enable_tls is set"))?;

    let identity = Identity::from_pem(read(cert_path)?, read(key_path)?);
    let ca = Certificate::from_pem(read(ca_path)?);

    Ok(Some(ClientTlsConfig::new().domain_name(domain_name).ca_certificate(ca).identity(identity)))
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))
}
