//! A server and a client talking over a real QUIC link on localhost.

use ccnet_client::{ClientHost, ComputerClient};
use ccnet_core::{ComputerFamily, ComputerState};
use ccnet_net::protocol::{ComputerAction, EventArg, MenuMode, PowerAction, QueueEvent};
use ccnet_net::{
    main_context, ClientboundMessage, EnvelopeCodec, LinkConfig, MainExecutor, Outbound, PeerId,
    ProtocolRegistries, ServerboundMessage,
};
use ccnet_server::{ComputerServer, ServerHost};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Both main contexts, driven by the test instead of tick loops.
struct World {
    server_executor: MainExecutor<ServerboundMessage>,
    server: ComputerServer,
    client_executor: MainExecutor<ClientboundMessage>,
    client: ComputerClient,
}

impl World {
    /// Run both contexts until `done` holds, panicking after [`TIMEOUT`].
    async fn settle(&mut self, what: &str, done: impl Fn(&ComputerServer, &ComputerClient) -> bool) {
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        loop {
            self.server_executor.run_pending(&mut self.server);
            self.client_executor.run_pending(&mut self.client);
            if done(&self.server, &self.client) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[tokio::test]
async fn terminal_session_over_quic() {
    ccnet_testkit::init_tracing();
    let registries = ProtocolRegistries::standard().unwrap();
    let link = LinkConfig::default();

    let host = Arc::new(
        ServerHost::bind(
            SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            &registries,
            link.clone(),
        )
        .unwrap(),
    );
    let (server_dispatcher, server_executor) =
        main_context(EnvelopeCodec::new(registries.serverbound.clone()));
    let serving = tokio::spawn({
        let host = host.clone();
        async move { host.serve(server_dispatcher).await }
    });

    let (client_dispatcher, client_executor) =
        main_context(EnvelopeCodec::new(registries.clientbound.clone()));
    let client_host = ClientHost::connect(host.local_addr(), &registries, &link, client_dispatcher)
        .await
        .unwrap();

    let mut world = World {
        server_executor,
        server: ComputerServer::new(
            Outbound::new(EnvelopeCodec::new(registries.clientbound.clone())),
            8,
        ),
        client_executor,
        client: ComputerClient::new(Outbound::new(EnvelopeCodec::new(
            registries.serverbound.clone(),
        ))),
    };
    let peer = PeerId(1);

    world
        .settle("both sides to see the link", |server, client| {
            server.peers().contains(peer) && client.is_connected()
        })
        .await;

    assert!(world
        .server
        .add_computer(5, ComputerFamily::Advanced, Some("desk".into())));
    assert!(world.server.computer_mut(5).unwrap().turn_on());
    assert!(world.server.open_menu(peer, 5, MenuMode::Terminal));

    // Opening the menu makes the client ask for the computer's state.
    world
        .settle("computer state on the client", |_, client| {
            client
                .computer(5)
                .is_some_and(|c| c.state == ComputerState::On)
        })
        .await;
    assert_eq!(world.client.menu().map(|m| m.instance_id), Some(5));

    assert!(world.client.send(QueueEvent {
        instance_id: 5,
        event: "paste".into(),
        args: vec![EventArg::String("hello".into())],
    }));
    world
        .settle("queued event on the server", |server, _| {
            server
                .computer(5)
                .is_some_and(|c| c.pending_events().any(|e| e.name == "paste"))
        })
        .await;

    assert!(world.client.send(ComputerAction {
        instance_id: 5,
        action: PowerAction::Shutdown,
    }));
    world
        .settle("shutdown to reach the client", |_, client| {
            client
                .computer(5)
                .is_some_and(|c| c.state == ComputerState::Off)
        })
        .await;

    client_host.close();
    world
        .settle("the server to drop the peer", |server, _| {
            !server.peers().contains(peer) && server.session(peer).is_none()
        })
        .await;

    host.close();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn mismatched_tables_are_refused() {
    ccnet_testkit::init_tracing();
    let registries = ProtocolRegistries::standard().unwrap();
    let link = LinkConfig::default();

    let host = Arc::new(
        ServerHost::bind(
            SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            &registries,
            link.clone(),
        )
        .unwrap(),
    );
    let (server_dispatcher, mut server_executor) =
        main_context(EnvelopeCodec::new(registries.serverbound.clone()));
    let serving = tokio::spawn({
        let host = host.clone();
        async move { host.serve(server_dispatcher).await }
    });

    let endpoint = ccnet_net::ClientEndpoint::new(&link).unwrap();
    let connection = endpoint.connect(host.local_addr()).await.unwrap();
    let (client_dispatcher, _client_executor) =
        main_context(EnvelopeCodec::new(registries.clientbound.clone()));
    let result = ccnet_net::connect_link(
        connection,
        PeerId(0),
        registries.schema_hash() ^ 1,
        client_dispatcher,
        &link,
    )
    .await;
    assert!(result.is_err());

    // The refused connection never reaches the server's main context.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut recorder = ccnet_testkit::RecordingHandler::<ServerboundMessage>::new();
    server_executor.run_pending(&mut recorder);
    assert!(recorder.connected().is_empty());

    host.close();
    serving.await.unwrap().unwrap();
}
