//! Connection to a server and the client tick loop.

use crate::ComputerClient;
use anyhow::{Context, Result};
use ccnet_net::{
    connect_link, main_context, ClientEndpoint, ClientboundMessage, Dispatcher, EnvelopeCodec,
    LinkConfig, Outbound, PeerHandle, PeerId, ProtocolRegistries,
};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument};

/// Peer id under which the server appears in the client's main context.
pub const SERVER_PEER: PeerId = PeerId(0);

/// The `[client]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Server to connect to.
    pub server: SocketAddr,
    /// Main-context ticks per second.
    pub tick_rate: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server: SocketAddr::from((Ipv4Addr::LOCALHOST, 25600)),
            tick_rate: 20,
        }
    }
}

impl ClientSettings {
    /// Time between main-context ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

/// A linked connection to a server.
pub struct ClientHost {
    endpoint: ClientEndpoint,
    connection: quinn::Connection,
    server: PeerHandle,
}

impl ClientHost {
    /// Connect and complete the hello.
    ///
    /// Messages from the server are handed to `dispatcher`; the server joins
    /// the client's main context as [`SERVER_PEER`].
    #[instrument(skip(registries, link, dispatcher))]
    pub async fn connect(
        server: SocketAddr,
        registries: &ProtocolRegistries,
        link: &LinkConfig,
        dispatcher: Dispatcher<ClientboundMessage>,
    ) -> Result<Self> {
        let endpoint = ClientEndpoint::new(link).context("Failed to create client endpoint")?;
        let connection = endpoint
            .connect(server)
            .await
            .context("Failed to connect to server")?;
        let handle = connect_link(
            connection.clone(),
            SERVER_PEER,
            registries.schema_hash(),
            dispatcher,
            link,
        )
        .await
        .context("Link setup failed")?;

        Ok(Self {
            endpoint,
            connection,
            server: handle,
        })
    }

    /// Sending handle to the server.
    pub fn server(&self) -> &PeerHandle {
        &self.server
    }

    /// Wait until the connection is closed by either side.
    pub async fn closed(&self) -> quinn::ConnectionError {
        self.connection.closed().await
    }

    /// Close the connection.
    pub fn close(&self) {
        self.connection.close(0u32.into(), b"Client disconnecting");
        self.endpoint.close();
    }
}

/// Connect to a server and run the client main context until Ctrl-C or
/// disconnect.
pub async fn run_client(settings: ClientSettings, link: LinkConfig) -> Result<()> {
    let registries = ProtocolRegistries::standard().context("Invalid message table")?;
    let (dispatcher, mut executor) =
        main_context(EnvelopeCodec::new(registries.clientbound.clone()));
    let mut client =
        ComputerClient::new(Outbound::new(EnvelopeCodec::new(registries.serverbound.clone())));

    let host = ClientHost::connect(settings.server, &registries, &link, dispatcher).await?;
    info!(server = %settings.server, "Client running");

    let mut ticker = tokio::time::interval(settings.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                executor.run_pending(&mut client);
            }
            reason = host.closed() => {
                info!("Connection closed: {}", reason);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                host.close();
                break;
            }
        }
    }

    // Drain whatever arrived before the link went down.
    executor.close();
    executor.run_pending(&mut client);
    host.endpoint.wait_idle().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_point_at_local_server() {
        let settings = ClientSettings::default();
        assert_eq!(settings.server.port(), 25600);
        assert_eq!(settings.tick_interval(), Duration::from_millis(50));
    }
}
