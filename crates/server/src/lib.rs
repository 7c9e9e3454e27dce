#![warn(missing_docs)]
//! Server main context: computers, open terminal sessions and uploads, driven
//! by messages from connected clients.

pub mod computer;
pub mod host;
pub mod settings;
pub mod upload;

pub use computer::{QueuedEvent, ServerComputer};
pub use host::{run_server, ServerHost};
pub use settings::{ComputerSeed, ServerSettings};

use ccnet_core::{ChunkAddress, ComputerFamily, ComputerId, DimensionId, WorldPos};
use ccnet_net::protocol::{
    ChatTable, ComputerAction, ComputerData, ComputerDeleted, ComputerTerminal, ContinueUpload,
    EventArg, KeyAction, KeyEvent, MenuMode, Monitor, MouseAction, MouseEvent, OpenComputerMenu,
    PlayRecord, PowerAction, QueueEvent, SpeakerMove, SpeakerPlay, SpeakerStop, UploadFile,
    UploadResult, UploadStatus,
};
use ccnet_net::{
    ClientboundMessage, DeliveryReport, EncodeError, MainThreadHandler, Outbound, PeerDirectory,
    PeerHandle, PeerId, PeerLocation, PeerTable, ServerboundMessage,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use upload::{PendingUpload, UploadFailure};

/// Range within which record playback is heard.
pub const RECORD_RANGE: f64 = 64.0;

/// Speaker range per unit of volume.
pub const SPEAKER_RANGE_PER_VOLUME: f64 = 16.0;

/// A computer terminal a peer has open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Computer shown in the menu.
    pub computer: ComputerId,
    /// How the menu is presented.
    pub mode: MenuMode,
}

/// Server main-context state.
///
/// Owns the peer directory; everything here runs on the main context, so no
/// field needs locking.
pub struct ComputerServer {
    peers: PeerTable,
    outbound: Outbound<ClientboundMessage>,
    computers: BTreeMap<ComputerId, ServerComputer>,
    sessions: HashMap<PeerId, Session>,
    uploads: HashMap<(PeerId, u64), PendingUpload>,
    view_distance: u32,
}

impl ComputerServer {
    /// Create an empty server delivering through `outbound`.
    pub fn new(outbound: Outbound<ClientboundMessage>, view_distance: u32) -> Self {
        Self {
            peers: PeerTable::new(),
            outbound,
            computers: BTreeMap::new(),
            sessions: HashMap::new(),
            uploads: HashMap::new(),
            view_distance,
        }
    }

    /// Create a server with the computers listed in `settings`.
    pub fn from_settings(outbound: Outbound<ClientboundMessage>, settings: &ServerSettings) -> Self {
        let mut server = Self::new(outbound, settings.view_distance);
        for seed in &settings.computers {
            if !server.add_computer(seed.id, seed.family, seed.label.clone()) {
                warn!(computer = seed.id, "Duplicate computer in settings, skipping");
                continue;
            }
            if seed.on {
                if let Some(computer) = server.computers.get_mut(&seed.id) {
                    computer.turn_on();
                }
            }
        }
        server
    }

    /// Connected peers.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// A computer by id.
    pub fn computer(&self, id: ComputerId) -> Option<&ServerComputer> {
        self.computers.get(&id)
    }

    /// A computer by id, mutably.
    pub fn computer_mut(&mut self, id: ComputerId) -> Option<&mut ServerComputer> {
        self.computers.get_mut(&id)
    }

    /// Number of computers.
    pub fn computer_count(&self) -> usize {
        self.computers.len()
    }

    /// The session a peer has open.
    pub fn session(&self, peer: PeerId) -> Option<Session> {
        self.sessions.get(&peer).copied()
    }

    /// Number of uploads in flight.
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Register a new computer. Returns false if the id is taken.
    pub fn add_computer(
        &mut self,
        id: ComputerId,
        family: ComputerFamily,
        label: Option<String>,
    ) -> bool {
        if self.computers.contains_key(&id) {
            return false;
        }
        let mut computer = ServerComputer::new(id, family);
        computer.set_label(label);
        self.computers.insert(id, computer);
        debug!(computer = id, ?family, "Computer added");
        true
    }

    /// Open a computer's terminal for a peer.
    ///
    /// Records the session and tells the client to show the menu. Returns
    /// false if the peer or computer is unknown.
    pub fn open_menu(&mut self, peer: PeerId, id: ComputerId, mode: MenuMode) -> bool {
        let Some(computer) = self.computers.get(&id) else {
            debug!(%peer, computer = id, "Cannot open menu for unknown computer");
            return false;
        };
        if !self.peers.contains(peer) {
            debug!(%peer, computer = id, "Cannot open menu for unknown peer");
            return false;
        }

        let message = ClientboundMessage::OpenComputerMenu(OpenComputerMenu {
            instance_id: id,
            family: computer.family(),
            mode,
        });
        self.sessions.insert(
            peer,
            Session {
                computer: id,
                mode,
            },
        );
        info!(%peer, computer = id, ?mode, "Menu opened");
        self.send_to_peer(peer, &message)
    }

    /// Close a peer's menu, discarding its in-flight uploads.
    pub fn close_menu(&mut self, peer: PeerId) -> Option<Session> {
        self.uploads.retain(|(owner, _), _| *owner != peer);
        self.sessions.remove(&peer)
    }

    /// Remove a computer, closing every session on it.
    pub fn delete_computer(&mut self, id: ComputerId) -> Option<ServerComputer> {
        let computer = self.computers.remove(&id)?;
        self.sessions.retain(|_, session| session.computer != id);
        self.uploads.retain(|_, upload| upload.computer() != id);
        info!(computer = id, "Computer deleted");
        self.send_to_all(&ClientboundMessage::ComputerDeleted(ComputerDeleted {
            instance_id: id,
        }));
        Some(computer)
    }

    /// Replace a computer's terminal and push it to every peer viewing it.
    pub fn update_terminal(&mut self, id: ComputerId, lines: Vec<String>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let Some(computer) = self.computers.get_mut(&id) else {
            return report;
        };
        computer.set_lines(lines);

        let message = ClientboundMessage::ComputerTerminal(ComputerTerminal {
            instance_id: id,
            width: computer::TERMINAL_WIDTH,
            height: computer::TERMINAL_HEIGHT,
            lines: computer.lines().to_vec(),
        });
        let envelope = match self.outbound.codec().encode(&message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Failed to encode terminal: {}", e);
                return report;
            }
        };

        for (peer, session) in &self.sessions {
            if session.computer != id || session.mode != MenuMode::Terminal {
                continue;
            }
            let Some(handle) = self.peers.peer(*peer) else {
                continue;
            };
            if ccnet_net::send_to(handle, &envelope) {
                report.delivered.push(*peer);
            } else {
                report.disconnected.push(*peer);
            }
        }
        report
    }

    /// Show a table in one peer's chat.
    pub fn send_chat_table(&mut self, peer: PeerId, table: ChatTable) -> bool {
        self.send_to_peer(peer, &ClientboundMessage::ChatTable(table))
    }

    /// Start or stop a record at a disk drive.
    pub fn play_record(
        &mut self,
        dimension: DimensionId,
        position: WorldPos,
        record: Option<String>,
    ) -> DeliveryReport {
        let message = ClientboundMessage::PlayRecord(PlayRecord {
            dimension,
            position,
            record,
        });
        self.send_around(&message, dimension, position, RECORD_RANGE)
    }

    /// Play a sound from a speaker. The audible range grows with volume.
    pub fn speaker_play(&mut self, play: SpeakerPlay) -> DeliveryReport {
        let range = f64::from(play.volume.max(1.0)) * SPEAKER_RANGE_PER_VOLUME;
        let (dimension, position) = (play.dimension, play.position);
        self.send_around(
            &ClientboundMessage::SpeakerPlay(play),
            dimension,
            position,
            range,
        )
    }

    /// Stop a speaker's sound everywhere.
    pub fn speaker_stop(&mut self, source: u64) -> DeliveryReport {
        self.send_to_all(&ClientboundMessage::SpeakerStop(SpeakerStop { source }))
    }

    /// Move a speaker's sound. Goes to peers tracking the new chunk.
    pub fn speaker_move(
        &mut self,
        source: u64,
        dimension: DimensionId,
        position: WorldPos,
    ) -> DeliveryReport {
        let chunk = ChunkAddress::of(dimension, &position);
        self.send_tracking(
            &ClientboundMessage::SpeakerMove(SpeakerMove { source, position }),
            chunk,
        )
    }

    /// Push monitor contents to peers tracking the monitor's chunk.
    pub fn update_monitor(&mut self, monitor: Monitor) -> DeliveryReport {
        let chunk = monitor.chunk;
        self.send_tracking(&ClientboundMessage::Monitor(monitor), chunk)
    }

    /// Record where a peer is and recompute the chunks it tracks.
    pub fn set_peer_location(&mut self, peer: PeerId, location: PeerLocation) -> bool {
        if !self.peers.set_location(peer, location) {
            return false;
        }
        self.peers.update_interest(peer, self.view_distance);
        true
    }

    fn send_to_peer(&self, peer: PeerId, message: &ClientboundMessage) -> bool {
        self.delivered(self.outbound.send_to_peer(&self.peers, peer, message))
            .unwrap_or(false)
    }

    fn send_to_all(&self, message: &ClientboundMessage) -> DeliveryReport {
        self.delivered(self.outbound.send_to_all(&self.peers, message))
            .unwrap_or_default()
    }

    fn send_around(
        &self,
        message: &ClientboundMessage,
        dimension: DimensionId,
        origin: WorldPos,
        radius: f64,
    ) -> DeliveryReport {
        self.delivered(
            self.outbound
                .send_to_all_around(&self.peers, message, dimension, origin, radius),
        )
        .unwrap_or_default()
    }

    fn send_tracking(&self, message: &ClientboundMessage, chunk: ChunkAddress) -> DeliveryReport {
        self.delivered(self.outbound.send_to_all_tracking(&self.peers, message, chunk))
            .unwrap_or_default()
    }

    fn delivered<T>(&self, result: Result<T, EncodeError>) -> Option<T> {
        result
            .map_err(|e| warn!("Failed to encode outbound message: {}", e))
            .ok()
    }

    /// The computer `peer` has open, if it is `id`.
    fn session_computer(&mut self, peer: PeerId, id: ComputerId) -> Option<&mut ServerComputer> {
        match self.sessions.get(&peer) {
            Some(session) if session.computer == id => self.computers.get_mut(&id),
            _ => {
                debug!(%peer, computer = id, "Ignoring input for computer without open session");
                None
            }
        }
    }

    fn on_computer_action(&mut self, peer: PeerId, msg: ComputerAction) {
        let Some(computer) = self.session_computer(peer, msg.instance_id) else {
            return;
        };
        let changed = match msg.action {
            PowerAction::TurnOn => computer.turn_on(),
            PowerAction::Shutdown => computer.shutdown(),
            PowerAction::Reboot => computer.reboot(),
        };
        let state = computer.state();
        debug!(%peer, computer = msg.instance_id, action = ?msg.action, changed, "Computer action");

        self.send_to_all(&ClientboundMessage::ComputerData(ComputerData {
            instance_id: msg.instance_id,
            state: state.as_str().to_string(),
        }));
    }

    fn on_queue_event(&mut self, peer: PeerId, msg: QueueEvent) {
        if let Some(computer) = self.session_computer(peer, msg.instance_id) {
            computer.queue_event(QueuedEvent::new(msg.event, msg.args));
        }
    }

    fn on_key_event(&mut self, peer: PeerId, msg: KeyEvent) {
        let Some(computer) = self.session_computer(peer, msg.instance_id) else {
            return;
        };
        let key = EventArg::Number(f64::from(msg.key));
        let event = match msg.action {
            KeyAction::Down => QueuedEvent::new("key", vec![key, EventArg::Bool(false)]),
            KeyAction::Repeat => QueuedEvent::new("key", vec![key, EventArg::Bool(true)]),
            KeyAction::Up => QueuedEvent::new("key_up", vec![key]),
        };
        computer.queue_event(event);
    }

    fn on_mouse_event(&mut self, peer: PeerId, msg: MouseEvent) {
        if self
            .sessions
            .get(&peer)
            .is_some_and(|s| s.mode == MenuMode::TypingOnly)
        {
            debug!(%peer, "Ignoring mouse input in typing-only menu");
            return;
        }
        let Some(computer) = self.session_computer(peer, msg.instance_id) else {
            return;
        };
        if !computer.family().supports_mouse() {
            debug!(%peer, computer = msg.instance_id, "Ignoring mouse input on normal computer");
            return;
        }

        let name = match msg.action {
            MouseAction::Click => "mouse_click",
            MouseAction::Drag => "mouse_drag",
            MouseAction::Up => "mouse_up",
            MouseAction::Scroll => "mouse_scroll",
        };
        computer.queue_event(QueuedEvent::new(
            name,
            vec![
                EventArg::Number(f64::from(msg.button)),
                EventArg::Number(f64::from(msg.x)),
                EventArg::Number(f64::from(msg.y)),
            ],
        ));
    }

    fn on_request_computer(&mut self, peer: PeerId) {
        let Some(session) = self.sessions.get(&peer) else {
            debug!(%peer, "RequestComputer without an open menu");
            return;
        };
        let Some(computer) = self.computers.get(&session.computer) else {
            return;
        };
        let message = ClientboundMessage::ComputerData(ComputerData {
            instance_id: computer.id(),
            state: computer.state().as_str().to_string(),
        });
        self.send_to_peer(peer, &message);
    }

    fn on_upload_file(&mut self, peer: PeerId, msg: UploadFile) {
        if self.session_computer(peer, msg.instance_id).is_none() {
            return;
        }
        // A menu holds one upload at a time; a new one replaces the old.
        let before = self.uploads.len();
        self.uploads.retain(|(owner, _), _| *owner != peer);
        if self.uploads.len() < before {
            debug!(%peer, "Discarding unfinished upload");
        }
        match PendingUpload::start(msg.instance_id, msg.files) {
            Ok(upload) => {
                debug!(%peer, upload = msg.upload_id, "Upload started");
                self.uploads.insert((peer, msg.upload_id), upload);
            }
            Err(failure) => self.upload_result(peer, msg.instance_id, Err(failure)),
        }
    }

    fn on_continue_upload(&mut self, peer: PeerId, msg: ContinueUpload) {
        let key = (peer, msg.upload_id);
        let Some(upload) = self.uploads.get_mut(&key) else {
            debug!(%peer, upload = msg.upload_id, "Continue for unknown upload");
            return;
        };
        let computer = upload.computer();

        if let Err(failure) = upload.apply(&msg.slices) {
            self.uploads.remove(&key);
            self.upload_result(peer, computer, Err(failure));
            return;
        }
        if !msg.finished {
            return;
        }

        let Some(upload) = self.uploads.remove(&key) else {
            return;
        };
        let outcome = upload.finish().and_then(|files| self.store_upload(computer, files));
        self.upload_result(peer, computer, outcome);
    }

    fn store_upload(
        &mut self,
        id: ComputerId,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<usize, UploadFailure> {
        let computer = self
            .computers
            .get_mut(&id)
            .ok_or(UploadFailure::NoComputer)?;
        if !computer.state().is_on() {
            return Err(UploadFailure::ComputerOff);
        }

        let count = files.len();
        let names = files
            .iter()
            .map(|(name, _)| EventArg::String(name.clone()))
            .collect();
        for (name, contents) in files {
            computer.write_file(name, contents);
        }
        computer.queue_event(QueuedEvent::new("file_transfer", names));
        Ok(count)
    }

    fn upload_result(
        &mut self,
        peer: PeerId,
        computer: ComputerId,
        outcome: Result<usize, UploadFailure>,
    ) {
        let (status, message) = match outcome {
            Ok(count) => {
                info!(%peer, computer, files = count, "Upload stored");
                (UploadStatus::Success, format!("Uploaded {count} file(s)"))
            }
            Err(failure) => {
                debug!(%peer, computer, %failure, "Upload failed");
                (UploadStatus::Error, failure.to_string())
            }
        };
        self.send_to_peer(
            peer,
            &ClientboundMessage::UploadResult(UploadResult {
                instance_id: computer,
                status,
                message,
            }),
        );
    }
}

impl MainThreadHandler<ServerboundMessage> for ComputerServer {
    fn handle(&mut self, origin: PeerId, message: ServerboundMessage) {
        match message {
            ServerboundMessage::ComputerAction(msg) => self.on_computer_action(origin, msg),
            ServerboundMessage::QueueEvent(msg) => self.on_queue_event(origin, msg),
            ServerboundMessage::RequestComputer(_) => self.on_request_computer(origin),
            ServerboundMessage::KeyEvent(msg) => self.on_key_event(origin, msg),
            ServerboundMessage::MouseEvent(msg) => self.on_mouse_event(origin, msg),
            ServerboundMessage::UploadFile(msg) => self.on_upload_file(origin, msg),
            ServerboundMessage::ContinueUpload(msg) => self.on_continue_upload(origin, msg),
        }
    }

    fn peer_joined(&mut self, peer: PeerHandle) {
        info!(peer = %peer.id(), "Peer joined");
        self.peers.insert(peer);
    }

    fn peer_left(&mut self, peer: PeerId) {
        info!(%peer, "Peer left");
        self.close_menu(peer);
        self.peers.remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnet_core::{ChunkPos, ComputerState};
    use ccnet_net::protocol::{FileHeader, FileSlice, RequestComputer};
    use ccnet_net::{EnvelopeCodec, OutboundStream, ProtocolRegistries};

    fn server() -> ComputerServer {
        let registries = ProtocolRegistries::standard().unwrap();
        ComputerServer::new(Outbound::new(EnvelopeCodec::new(registries.clientbound)), 2)
    }

    fn decode(stream: &mut OutboundStream) -> Vec<ClientboundMessage> {
        let registries = ProtocolRegistries::standard().unwrap();
        let codec = EnvelopeCodec::new(registries.clientbound);
        stream
            .drain()
            .iter()
            .map(|envelope| codec.decode(envelope.as_bytes()).unwrap())
            .collect()
    }

    fn join(server: &mut ComputerServer, id: u64) -> OutboundStream {
        let (handle, stream) = PeerHandle::channel(PeerId(id));
        server.peer_joined(handle);
        stream
    }

    fn with_open_computer(family: ComputerFamily) -> (ComputerServer, OutboundStream) {
        let mut server = server();
        let mut stream = join(&mut server, 1);
        server.add_computer(5, family, None);
        server.computer_mut(5).unwrap().turn_on();
        assert!(server.open_menu(PeerId(1), 5, MenuMode::Terminal));
        stream.drain();
        (server, stream)
    }

    #[test]
    fn open_menu_records_session_and_notifies() {
        let mut server = server();
        let mut stream = join(&mut server, 1);
        server.add_computer(9, ComputerFamily::Advanced, Some("base".into()));

        assert!(server.open_menu(PeerId(1), 9, MenuMode::Terminal));
        assert!(!server.open_menu(PeerId(1), 10, MenuMode::Terminal));
        assert!(!server.open_menu(PeerId(2), 9, MenuMode::Terminal));

        assert_eq!(
            server.session(PeerId(1)),
            Some(Session {
                computer: 9,
                mode: MenuMode::Terminal
            })
        );
        assert_eq!(
            decode(&mut stream),
            vec![ClientboundMessage::OpenComputerMenu(OpenComputerMenu {
                instance_id: 9,
                family: ComputerFamily::Advanced,
                mode: MenuMode::Terminal,
            })]
        );
    }

    #[test]
    fn request_without_session_is_ignored() {
        let mut server = server();
        let mut stream = join(&mut server, 1);
        server.handle(
            PeerId(1),
            ServerboundMessage::RequestComputer(RequestComputer {}),
        );
        assert!(stream.drain().is_empty());
    }

    #[test]
    fn computer_action_broadcasts_state() {
        let (mut server, mut stream) = with_open_computer(ComputerFamily::Normal);
        let mut other = join(&mut server, 2);

        server.handle(
            PeerId(1),
            ServerboundMessage::ComputerAction(ComputerAction {
                instance_id: 5,
                action: PowerAction::Shutdown,
            }),
        );

        let expected = vec![ClientboundMessage::ComputerData(ComputerData {
            instance_id: 5,
            state: "off".into(),
        })];
        assert_eq!(decode(&mut stream), expected);
        assert_eq!(decode(&mut other), expected);
        assert_eq!(server.computer(5).unwrap().state(), ComputerState::Off);
    }

    #[test]
    fn action_on_other_computer_is_ignored() {
        let (mut server, mut stream) = with_open_computer(ComputerFamily::Normal);
        server.add_computer(6, ComputerFamily::Normal, None);
        server.handle(
            PeerId(1),
            ServerboundMessage::ComputerAction(ComputerAction {
                instance_id: 6,
                action: PowerAction::TurnOn,
            }),
        );
        assert!(stream.drain().is_empty());
        assert_eq!(server.computer(6).unwrap().state(), ComputerState::Off);
    }

    #[test]
    fn input_becomes_events() {
        let (mut server, _stream) = with_open_computer(ComputerFamily::Advanced);
        server.handle(
            PeerId(1),
            ServerboundMessage::KeyEvent(KeyEvent {
                instance_id: 5,
                action: KeyAction::Repeat,
                key: 28,
            }),
        );
        server.handle(
            PeerId(1),
            ServerboundMessage::MouseEvent(MouseEvent {
                instance_id: 5,
                action: MouseAction::Scroll,
                button: -1,
                x: 3,
                y: 4,
            }),
        );

        let events: Vec<_> = server.computer(5).unwrap().pending_events().cloned().collect();
        assert_eq!(
            events,
            vec![
                QueuedEvent::new("key", vec![EventArg::Number(28.0), EventArg::Bool(true)]),
                QueuedEvent::new(
                    "mouse_scroll",
                    vec![
                        EventArg::Number(-1.0),
                        EventArg::Number(3.0),
                        EventArg::Number(4.0)
                    ]
                ),
            ]
        );
    }

    #[test]
    fn normal_computers_ignore_mouse() {
        let (mut server, _stream) = with_open_computer(ComputerFamily::Normal);
        server.handle(
            PeerId(1),
            ServerboundMessage::MouseEvent(MouseEvent {
                instance_id: 5,
                action: MouseAction::Click,
                button: 1,
                x: 1,
                y: 1,
            }),
        );
        assert_eq!(server.computer(5).unwrap().pending_events().count(), 0);
    }

    #[test]
    fn upload_stores_files_and_reports() {
        let (mut server, mut stream) = with_open_computer(ComputerFamily::Normal);
        server.handle(
            PeerId(1),
            ServerboundMessage::UploadFile(UploadFile {
                instance_id: 5,
                upload_id: 77,
                files: vec![FileHeader {
                    name: "startup.lua".into(),
                    size: 5,
                }],
            }),
        );
        assert_eq!(server.pending_uploads(), 1);

        server.handle(
            PeerId(1),
            ServerboundMessage::ContinueUpload(ContinueUpload {
                upload_id: 77,
                slices: vec![FileSlice {
                    file: 0,
                    offset: 0,
                    bytes: b"print".to_vec(),
                }],
                finished: true,
            }),
        );

        assert_eq!(server.pending_uploads(), 0);
        let computer = server.computer(5).unwrap();
        assert_eq!(computer.file("startup.lua"), Some(&b"print"[..]));
        assert_eq!(
            computer.pending_events().last().map(|e| e.name.as_str()),
            Some("file_transfer")
        );
        assert_eq!(
            decode(&mut stream),
            vec![ClientboundMessage::UploadResult(UploadResult {
                instance_id: 5,
                status: UploadStatus::Success,
                message: "Uploaded 1 file(s)".into(),
            })]
        );
    }

    #[test]
    fn upload_to_powered_off_computer_fails() {
        let (mut server, mut stream) = with_open_computer(ComputerFamily::Normal);
        server.computer_mut(5).unwrap().shutdown();
        server.handle(
            PeerId(1),
            ServerboundMessage::UploadFile(UploadFile {
                instance_id: 5,
                upload_id: 1,
                files: vec![FileHeader {
                    name: "a".into(),
                    size: 1,
                }],
            }),
        );
        server.handle(
            PeerId(1),
            ServerboundMessage::ContinueUpload(ContinueUpload {
                upload_id: 1,
                slices: vec![FileSlice {
                    file: 0,
                    offset: 0,
                    bytes: vec![b'x'],
                }],
                finished: true,
            }),
        );

        match decode(&mut stream).as_slice() {
            [ClientboundMessage::UploadResult(result)] => {
                assert_eq!(result.status, UploadStatus::Error);
                assert_eq!(result.message, "Computer is off");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(server.computer(5).unwrap().file_count(), 0);
    }

    #[test]
    fn new_upload_replaces_unfinished_one() {
        let (mut server, mut stream) = with_open_computer(ComputerFamily::Normal);
        for (upload_id, name) in [(1, "old.lua"), (2, "new.lua")] {
            server.handle(
                PeerId(1),
                ServerboundMessage::UploadFile(UploadFile {
                    instance_id: 5,
                    upload_id,
                    files: vec![FileHeader {
                        name: name.into(),
                        size: 2,
                    }],
                }),
            );
        }
        assert_eq!(server.pending_uploads(), 1);

        for upload_id in [1, 2] {
            server.handle(
                PeerId(1),
                ServerboundMessage::ContinueUpload(ContinueUpload {
                    upload_id,
                    slices: vec![FileSlice {
                        file: 0,
                        offset: 0,
                        bytes: b"ok".to_vec(),
                    }],
                    finished: true,
                }),
            );
        }

        assert_eq!(server.pending_uploads(), 0);
        let computer = server.computer(5).unwrap();
        assert_eq!(computer.file("old.lua"), None);
        assert_eq!(computer.file("new.lua"), Some(&b"ok"[..]));
        assert_eq!(decode(&mut stream).len(), 1);
    }

    #[test]
    fn uploads_from_other_peers_are_kept() {
        let (mut server, _stream) = with_open_computer(ComputerFamily::Normal);
        let _second = join(&mut server, 2);
        assert!(server.open_menu(PeerId(2), 5, MenuMode::Terminal));
        for peer in [1, 2] {
            server.handle(
                PeerId(peer),
                ServerboundMessage::UploadFile(UploadFile {
                    instance_id: 5,
                    upload_id: 9,
                    files: vec![FileHeader {
                        name: "a".into(),
                        size: 1,
                    }],
                }),
            );
        }
        assert_eq!(server.pending_uploads(), 2);
    }

    #[test]
    fn peer_left_drops_sessions_and_uploads() {
        let (mut server, _stream) = with_open_computer(ComputerFamily::Normal);
        server.handle(
            PeerId(1),
            ServerboundMessage::UploadFile(UploadFile {
                instance_id: 5,
                upload_id: 3,
                files: vec![FileHeader {
                    name: "a".into(),
                    size: 1,
                }],
            }),
        );
        server.peer_left(PeerId(1));

        assert!(server.session(PeerId(1)).is_none());
        assert_eq!(server.pending_uploads(), 0);
        assert!(server.peers().is_empty());
    }

    #[test]
    fn terminal_updates_reach_viewers_only() {
        let (mut server, mut viewer) = with_open_computer(ComputerFamily::Normal);
        let mut bystander = join(&mut server, 2);

        let report = server.update_terminal(5, vec!["> ls".into()]);

        assert_eq!(report.delivered, vec![PeerId(1)]);
        assert!(bystander.drain().is_empty());
        match decode(&mut viewer).as_slice() {
            [ClientboundMessage::ComputerTerminal(term)] => {
                assert_eq!(term.instance_id, 5);
                assert_eq!(term.lines, vec!["> ls".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delete_computer_notifies_everyone() {
        let (mut server, mut stream) = with_open_computer(ComputerFamily::Normal);
        let mut other = join(&mut server, 2);

        assert!(server.delete_computer(5).is_some());

        let expected = vec![ClientboundMessage::ComputerDeleted(ComputerDeleted {
            instance_id: 5,
        })];
        assert_eq!(decode(&mut stream), expected);
        assert_eq!(decode(&mut other), expected);
        assert!(server.session(PeerId(1)).is_none());
    }

    #[test]
    fn speaker_range_scales_with_volume() {
        let mut server = server();
        let _near = join(&mut server, 1);
        let _far = join(&mut server, 2);
        let dim = DimensionId::OVERWORLD;
        server.set_peer_location(PeerId(1), PeerLocation::new(dim, WorldPos::new(16.0, 0.0, 0.0)));
        server.set_peer_location(PeerId(2), PeerLocation::new(dim, WorldPos::new(40.0, 0.0, 0.0)));

        let play = |volume| SpeakerPlay {
            source: 1,
            dimension: dim,
            position: WorldPos::default(),
            sound: "block.note_block.harp".into(),
            volume,
            pitch: 1.0,
        };
        assert_eq!(server.speaker_play(play(0.5)).delivered, vec![PeerId(1)]);
        assert_eq!(
            server.speaker_play(play(3.0)).delivered,
            vec![PeerId(1), PeerId(2)]
        );
    }

    #[test]
    fn monitor_updates_follow_tracking() {
        let mut server = server();
        let mut near = join(&mut server, 1);
        let mut far = join(&mut server, 2);
        let dim = DimensionId::OVERWORLD;
        server.set_peer_location(PeerId(1), PeerLocation::new(dim, WorldPos::new(8.0, 64.0, 8.0)));
        server.set_peer_location(
            PeerId(2),
            PeerLocation::new(dim, WorldPos::new(500.0, 64.0, 500.0)),
        );

        let monitor = Monitor {
            chunk: ChunkAddress::new(dim, ChunkPos::new(1, 1)),
            position: [20, 64, 20],
            width: 7,
            height: 1,
            lines: vec!["hello".into()],
        };
        let report = server.update_monitor(monitor);

        assert_eq!(report.delivered, vec![PeerId(1)]);
        assert_eq!(decode(&mut near).len(), 1);
        assert!(far.drain().is_empty());
    }
}
