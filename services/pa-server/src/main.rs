//! `pa-server`: hosts the [`otprov_pa::PaService`] session gateway ATE
//! clients speak to, forwarding to the SPM and PB services over gRPC
//! (spec §4.4, §6).

use anyhow::Context;
use clap::Parser;
use otprov_core::config::CommonArgs;
use otprov_core::{logging, tls};
use otprov_pa::PaService;
use otprov_proto::pa::pa_server::PaServer;
use otprov_proto::pb::pb_client::PbClient;
use otprov_proto::spm::spm_client::SpmClient;
use otprov_session_store::SessionStore;
use tonic::transport::{Channel, Endpoint, Server};

const DEFAULT_PORT: u16 = 5002;

#[derive(Debug, Parser)]
#[command(name = "pa-server", about = "Provisioning Appliance gRPC server")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Address of the SPM server this PA forwards crypto RPCs to.
    #[arg(long)]
    spm_address: String,

    /// Address of the PB server this PA forwards registrations to.
    #[arg(long)]
    pb_address: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    let spm_channel = connect(&args.spm_address, &args.common).await.with_context(|| format!("connecting to SPM at {}", args.spm_address))?;
    let pb_channel = connect(&args.pb_address, &args.common).await.with_context(|| format!("connecting to PB at {}", args.pb_address))?;

    let service = PaService::new(SessionStore::new(), SpmClient::new(spm_channel), PbClient::new(pb_channel), args.common.enable_tls);

    let addr = format!("0.0.0.0:{}", args.common.resolved_port("pa", DEFAULT_PORT)).parse()?;
    tracing::info!(%addr, spm = %args.spm_address, pb = %args.pb_address, "pa-server listening");

    let mut server = Server::builder();
    if let Some(tls_config) = tls::server_tls_config(&args.common)? {
        server = server.tls_config(tls_config)?;
    }

    server
        .add_service(PaServer::new(service))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("pa-server shutting down");
        })
        .await?;

    Ok(())
}

async fn connect(address: &str, common: &CommonArgs) -> anyhow::Result<Channel> {
    let endpoint = Endpoint::from_shared(address.to_string())?;
    let endpoint = match tls::client_tls_config(common, domain_of(address))? {
        Some(tls_config) => endpoint.tls_config(tls_config)?,
        None => endpoint,
    };
    Ok(endpoint.connect().await?)
}

fn domain_of(address: &str) -> &str {
    address.rsplit_once("://").map(|(_, rest)| rest).unwrap_or(address).rsplit_once(':').map(|(host, _)| host).unwrap_or(address)
}
