//! A client asks for the state of the computer it has open and receives the
//! exact `ComputerData` envelope, end to end through the dispatcher.

use ccnet_core::ComputerFamily;
use ccnet_net::protocol::MenuMode;
use ccnet_net::{
    main_context, EnvelopeCodec, MainThreadHandler, Outbound, PeerId, ProtocolRegistries,
};
use ccnet_server::ComputerServer;
use ccnet_testkit::{init_tracing, LoopbackPeer};

#[test]
fn request_computer_replies_with_state_bytes() {
    init_tracing();
    let registries = ProtocolRegistries::standard().expect("standard tables");
    let (dispatcher, mut executor) =
        main_context(EnvelopeCodec::new(registries.serverbound.clone()));
    let mut server =
        ComputerServer::new(Outbound::new(EnvelopeCodec::new(registries.clientbound.clone())), 8);

    let mut client = LoopbackPeer::client(1).expect("loopback peer");
    dispatcher.peer_joined(client.handle()).expect("main context");
    executor.run_pending(&mut server);

    server.add_computer(5, ComputerFamily::Normal, None);
    server.computer_mut(5).expect("computer").turn_on();
    assert!(server.open_menu(PeerId(1), 5, MenuMode::Terminal));
    client.take_envelopes();

    // RequestComputer has an empty payload: the envelope is the bare id.
    dispatcher.on_receive(PeerId(1), &[2]).expect("well-formed");
    assert!(client.take_envelopes().is_empty(), "handler must not run inline");

    assert_eq!(executor.run_pending(&mut server), 1);
    assert_eq!(client.take_bytes(), vec![vec![11, 5, 2, b'o', b'n']]);
}

#[test]
fn concurrent_requests_each_get_one_reply() {
    init_tracing();
    let registries = ProtocolRegistries::standard().expect("standard tables");
    let (dispatcher, mut executor) =
        main_context(EnvelopeCodec::new(registries.serverbound.clone()));
    let mut server =
        ComputerServer::new(Outbound::new(EnvelopeCodec::new(registries.clientbound.clone())), 8);
    server.add_computer(5, ComputerFamily::Advanced, None);

    let mut clients: Vec<_> = (1..=8)
        .map(|id| LoopbackPeer::client(id).expect("loopback peer"))
        .collect();
    for client in &clients {
        server.peer_joined(client.handle());
        assert!(server.open_menu(client.id(), 5, MenuMode::Terminal));
    }
    for client in &mut clients {
        client.take_envelopes();
    }

    std::thread::scope(|scope| {
        for client in &clients {
            let dispatcher = dispatcher.clone();
            let origin = client.id();
            scope.spawn(move || dispatcher.on_receive(origin, &[2]).expect("well-formed"));
        }
    });

    assert_eq!(executor.run_pending(&mut server), clients.len());
    for client in &mut clients {
        assert_eq!(client.take_bytes(), vec![vec![11, 5, 3, b'o', b'f', b'f']]);
    }
}

#[test]
fn malformed_request_is_rejected_before_the_main_context() {
    let registries = ProtocolRegistries::standard().expect("standard tables");
    let (dispatcher, mut executor) =
        main_context(EnvelopeCodec::new(registries.serverbound.clone()));
    let mut server =
        ComputerServer::new(Outbound::new(EnvelopeCodec::new(registries.clientbound.clone())), 8);

    let err = dispatcher.on_receive(PeerId(1), &[2, 0xff]).unwrap_err();
    assert!(err.is_connection_fatal());
    assert_eq!(executor.run_pending(&mut server), 0);
}
