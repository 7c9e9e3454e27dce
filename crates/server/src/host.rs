//! Network host for the server main context.

use crate::settings::ServerSettings;
use crate::ComputerServer;
use anyhow::{Context, Result};
use ccnet_net::{
    accept_link, main_context, Dispatcher, EnvelopeCodec, LinkConfig, Outbound, PeerId,
    ProtocolRegistries, ServerEndpoint, ServerboundMessage,
};
use std::net::SocketAddr;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Accepts client connections and links them to a dispatcher.
pub struct ServerHost {
    endpoint: ServerEndpoint,
    schema_hash: u64,
    link: LinkConfig,
}

impl ServerHost {
    /// Bind the server endpoint.
    pub fn bind(addr: SocketAddr, registries: &ProtocolRegistries, link: LinkConfig) -> Result<Self> {
        let endpoint = ServerEndpoint::bind(addr, &link).context("Failed to bind server endpoint")?;
        Ok(Self {
            endpoint,
            schema_hash: registries.schema_hash(),
            link,
        })
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Accept connections until the endpoint is closed.
    ///
    /// Each connection gets a fresh [`PeerId`] and its own link tasks; a
    /// failed hello only affects that connection.
    pub async fn serve(&self, dispatcher: Dispatcher<ServerboundMessage>) -> Result<()> {
        let mut next_peer = 1u64;
        while let Some(incoming) = self.endpoint.accept().await {
            let peer = PeerId(next_peer);
            next_peer += 1;

            let remote = incoming.remote_address();
            info!(%peer, %remote, "New connection");

            let dispatcher = dispatcher.clone();
            let link = self.link.clone();
            let schema_hash = self.schema_hash;
            tokio::spawn(async move {
                let connection = match incoming.await {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!("Failed to establish connection from {}: {}", remote, e);
                        return;
                    }
                };
                if let Err(e) = accept_link(connection, peer, schema_hash, dispatcher, &link).await {
                    warn!(%peer, "Link setup failed: {:#}", e);
                }
            });
        }
        debug!("Endpoint closed, no longer accepting");
        Ok(())
    }

    /// Stop accepting connections and close the existing ones.
    pub fn close(&self) {
        self.endpoint.close();
    }
}

/// Run a server until Ctrl-C.
///
/// Builds the message tables, binds the endpoint and drives the main context
/// at `settings.tick_rate`.
#[instrument(skip_all, fields(bind = %settings.bind))]
pub async fn run_server(settings: ServerSettings, link: LinkConfig) -> Result<()> {
    let registries = ProtocolRegistries::standard().context("Invalid message table")?;
    let host = ServerHost::bind(settings.bind, &registries, link)?;
    info!(addr = %host.local_addr(), "Server listening");

    let (dispatcher, mut executor) =
        main_context(EnvelopeCodec::new(registries.serverbound.clone()));
    let outbound = Outbound::new(EnvelopeCodec::new(registries.clientbound.clone()));
    let mut server = ComputerServer::from_settings(outbound, &settings);

    let mut ticker = tokio::time::interval(settings.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let serve = host.serve(dispatcher);
    tokio::pin!(serve);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ran = executor.run_pending(&mut server);
                if ran > 0 {
                    debug!(tasks = ran, peers = server.peers().len(), "Tick");
                }
            }
            result = &mut serve => {
                result?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    host.close();
    executor.close();
    executor.run_pending(&mut server);
    info!(tasks = executor.executed(), "Server stopped");
    Ok(())
}
