#![warn(missing_docs)]
//! Client main context: what the server has told us about computers, menus,
//! monitors and sounds.

pub mod host;

pub use host::{run_client, ClientHost, ClientSettings};

use ccnet_core::{ComputerFamily, ComputerId, ComputerState, DimensionId, WorldPos};
use ccnet_net::protocol::{
    ChatTable, ComputerTerminal, MenuMode, Monitor, OpenComputerMenu, RequestComputer,
    UploadResult,
};
use ccnet_net::{
    ClientboundMessage, MainThreadHandler, Outbound, PeerHandle, PeerId, ServerboundMessage,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Terminal contents as last received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalView {
    /// Width in characters.
    pub width: u16,
    /// Height in characters.
    pub height: u16,
    /// Rows, top to bottom.
    pub lines: Vec<String>,
}

/// Client-side view of one computer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientComputer {
    /// Last reported power state.
    pub state: ComputerState,
    /// Last received terminal, if any.
    pub terminal: Option<TerminalView>,
}

/// The computer menu currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMenu {
    /// Computer the menu belongs to.
    pub instance_id: ComputerId,
    /// Hardware tier of that computer.
    pub family: ComputerFamily,
    /// Presentation mode.
    pub mode: MenuMode,
}

/// Sound activity reported by the server, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// A record started (`Some`) or stopped (`None`).
    Record {
        /// Dimension of the drive.
        dimension: DimensionId,
        /// Drive position.
        position: WorldPos,
        /// Record name.
        record: Option<String>,
    },
    /// A speaker started a sound.
    Play {
        /// Speaker instance.
        source: u64,
        /// Sound name.
        sound: String,
        /// Where the sound plays.
        position: WorldPos,
    },
    /// A speaker stopped.
    Stop {
        /// Speaker instance.
        source: u64,
    },
    /// A playing sound moved.
    Move {
        /// Speaker instance.
        source: u64,
        /// New position.
        position: WorldPos,
    },
}

/// Client main-context state.
pub struct ComputerClient {
    outbound: Outbound<ServerboundMessage>,
    server: Option<PeerHandle>,
    computers: BTreeMap<ComputerId, ClientComputer>,
    menu: Option<OpenMenu>,
    chat_tables: BTreeMap<u32, ChatTable>,
    last_upload: Option<UploadResult>,
    monitors: HashMap<(DimensionId, [i32; 3]), TerminalView>,
    playing: HashMap<u64, WorldPos>,
    audio: Vec<AudioEvent>,
}

impl ComputerClient {
    /// Create a client sending through `outbound`.
    pub fn new(outbound: Outbound<ServerboundMessage>) -> Self {
        Self {
            outbound,
            server: None,
            computers: BTreeMap::new(),
            menu: None,
            chat_tables: BTreeMap::new(),
            last_upload: None,
            monitors: HashMap::new(),
            playing: HashMap::new(),
            audio: Vec::new(),
        }
    }

    /// Whether a server link is up.
    pub fn is_connected(&self) -> bool {
        self.server.as_ref().is_some_and(PeerHandle::is_connected)
    }

    /// A computer as last reported.
    pub fn computer(&self, id: ComputerId) -> Option<&ClientComputer> {
        self.computers.get(&id)
    }

    /// The open computer menu.
    pub fn menu(&self) -> Option<OpenMenu> {
        self.menu
    }

    /// Close the menu locally.
    pub fn close_menu(&mut self) -> Option<OpenMenu> {
        self.menu.take()
    }

    /// A chat table by id.
    pub fn chat_table(&self, table_id: u32) -> Option<&ChatTable> {
        self.chat_tables.get(&table_id)
    }

    /// Outcome of the most recent upload.
    pub fn last_upload(&self) -> Option<&UploadResult> {
        self.last_upload.as_ref()
    }

    /// Contents of the monitor at a block position.
    pub fn monitor(&self, dimension: DimensionId, position: [i32; 3]) -> Option<&TerminalView> {
        self.monitors.get(&(dimension, position))
    }

    /// Position of each speaker that is currently playing.
    pub fn playing(&self) -> &HashMap<u64, WorldPos> {
        &self.playing
    }

    /// Sound activity since the last call.
    pub fn take_audio(&mut self) -> Vec<AudioEvent> {
        std::mem::take(&mut self.audio)
    }

    /// Send a message to the server.
    ///
    /// Returns false when there is no server link or it has closed.
    pub fn send(&self, message: impl Into<ServerboundMessage>) -> bool {
        let message = message.into();
        let Some(server) = &self.server else {
            debug!(?message, "Not connected, dropping");
            return false;
        };
        match self.outbound.send(server, &message) {
            Ok(sent) => sent,
            Err(e) => {
                warn!("Failed to encode outbound message: {}", e);
                false
            }
        }
    }

    fn on_terminal(&mut self, msg: ComputerTerminal) {
        let computer = self.computers.entry(msg.instance_id).or_default();
        computer.terminal = Some(TerminalView {
            width: msg.width,
            height: msg.height,
            lines: msg.lines,
        });
    }

    fn on_monitor(&mut self, msg: Monitor) {
        self.monitors.insert(
            (msg.chunk.dimension, msg.position),
            TerminalView {
                width: msg.width,
                height: msg.height,
                lines: msg.lines,
            },
        );
    }

    fn on_open_menu(&mut self, msg: OpenComputerMenu) {
        info!(computer = msg.instance_id, mode = ?msg.mode, "Opening computer menu");
        self.menu = Some(OpenMenu {
            instance_id: msg.instance_id,
            family: msg.family,
            mode: msg.mode,
        });
        self.computers.entry(msg.instance_id).or_default();
        self.send(RequestComputer {});
    }
}

impl MainThreadHandler<ClientboundMessage> for ComputerClient {
    fn handle(&mut self, _origin: PeerId, message: ClientboundMessage) {
        match message {
            ClientboundMessage::ChatTable(table) => {
                self.chat_tables.insert(table.table_id, table);
            }
            ClientboundMessage::ComputerData(msg) => match msg.state.parse::<ComputerState>() {
                Ok(state) => self.computers.entry(msg.instance_id).or_default().state = state,
                Err(e) => warn!(computer = msg.instance_id, "Ignoring computer data: {}", e),
            },
            ClientboundMessage::ComputerDeleted(msg) => {
                self.computers.remove(&msg.instance_id);
                if self.menu.is_some_and(|menu| menu.instance_id == msg.instance_id) {
                    self.menu = None;
                }
            }
            ClientboundMessage::ComputerTerminal(msg) => self.on_terminal(msg),
            ClientboundMessage::PlayRecord(msg) => self.audio.push(AudioEvent::Record {
                dimension: msg.dimension,
                position: msg.position,
                record: msg.record,
            }),
            ClientboundMessage::Monitor(msg) => self.on_monitor(msg),
            ClientboundMessage::SpeakerPlay(msg) => {
                self.playing.insert(msg.source, msg.position);
                self.audio.push(AudioEvent::Play {
                    source: msg.source,
                    sound: msg.sound,
                    position: msg.position,
                });
            }
            ClientboundMessage::SpeakerStop(msg) => {
                self.playing.remove(&msg.source);
                self.audio.push(AudioEvent::Stop { source: msg.source });
            }
            ClientboundMessage::SpeakerMove(msg) => {
                // Moves of sounds we never heard start are not interesting.
                if let Some(position) = self.playing.get_mut(&msg.source) {
                    *position = msg.position;
                    self.audio.push(AudioEvent::Move {
                        source: msg.source,
                        position: msg.position,
                    });
                }
            }
            ClientboundMessage::UploadResult(msg) => {
                info!(computer = msg.instance_id, status = ?msg.status, "{}", msg.message);
                self.last_upload = Some(msg);
            }
            ClientboundMessage::OpenComputerMenu(msg) => self.on_open_menu(msg),
        }
    }

    fn peer_joined(&mut self, peer: PeerHandle) {
        info!(server = %peer.id(), "Connected to server");
        self.server = Some(peer);
    }

    fn peer_left(&mut self, peer: PeerId) {
        info!(server = %peer, "Disconnected from server");
        self.server = None;
        self.menu = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnet_core::{ChunkAddress, ChunkPos};
    use ccnet_net::protocol::{ComputerData, SpeakerMove, SpeakerPlay, SpeakerStop};
    use ccnet_net::{EnvelopeCodec, ProtocolRegistries};
    use ccnet_testkit::LoopbackPeer;

    fn connected_client() -> (ComputerClient, LoopbackPeer<ServerboundMessage>) {
        let registries = ProtocolRegistries::standard().unwrap();
        let mut client =
            ComputerClient::new(Outbound::new(EnvelopeCodec::new(registries.serverbound)));
        let server = LoopbackPeer::server(0).unwrap();
        client.peer_joined(server.handle());
        (client, server)
    }

    #[test]
    fn open_menu_requests_computer() {
        let (mut client, mut to_server) = connected_client();
        client.handle(
            PeerId(0),
            ClientboundMessage::OpenComputerMenu(OpenComputerMenu {
                instance_id: 5,
                family: ComputerFamily::Normal,
                mode: MenuMode::Terminal,
            }),
        );

        assert_eq!(client.menu().map(|m| m.instance_id), Some(5));
        assert_eq!(to_server.take_bytes(), vec![vec![2u8]]);
    }

    #[test]
    fn computer_data_updates_state() {
        let (mut client, _to_server) = connected_client();
        client.handle(
            PeerId(0),
            ClientboundMessage::ComputerData(ComputerData {
                instance_id: 5,
                state: "blinking".into(),
            }),
        );
        client.handle(
            PeerId(0),
            ClientboundMessage::ComputerData(ComputerData {
                instance_id: 5,
                state: "exploded".into(),
            }),
        );
        assert_eq!(client.computer(5).unwrap().state, ComputerState::Blinking);
    }

    #[test]
    fn send_without_server_is_dropped() {
        let registries = ProtocolRegistries::standard().unwrap();
        let client = ComputerClient::new(Outbound::new(EnvelopeCodec::new(registries.serverbound)));
        assert!(!client.is_connected());
        assert!(!client.send(RequestComputer {}));
    }

    #[test]
    fn speaker_lifecycle_is_logged() {
        let (mut client, _to_server) = connected_client();
        let position = WorldPos::new(1.0, 2.0, 3.0);
        let moved = WorldPos::new(4.0, 2.0, 3.0);

        client.handle(
            PeerId(0),
            ClientboundMessage::SpeakerMove(SpeakerMove {
                source: 7,
                position,
            }),
        );
        client.handle(
            PeerId(0),
            ClientboundMessage::SpeakerPlay(SpeakerPlay {
                source: 7,
                dimension: DimensionId::OVERWORLD,
                position,
                sound: "entity.cat.ambient".into(),
                volume: 1.0,
                pitch: 1.0,
            }),
        );
        client.handle(
            PeerId(0),
            ClientboundMessage::SpeakerMove(SpeakerMove {
                source: 7,
                position: moved,
            }),
        );
        assert_eq!(client.playing().get(&7), Some(&moved));
        client.handle(
            PeerId(0),
            ClientboundMessage::SpeakerStop(SpeakerStop { source: 7 }),
        );

        assert!(client.playing().is_empty());
        assert_eq!(
            client.take_audio(),
            vec![
                AudioEvent::Play {
                    source: 7,
                    sound: "entity.cat.ambient".into(),
                    position,
                },
                AudioEvent::Move {
                    source: 7,
                    position: moved
                },
                AudioEvent::Stop { source: 7 },
            ]
        );
    }

    #[test]
    fn monitors_are_keyed_by_position() {
        let (mut client, _to_server) = connected_client();
        client.handle(
            PeerId(0),
            ClientboundMessage::Monitor(Monitor {
                chunk: ChunkAddress::new(DimensionId::NETHER, ChunkPos::new(0, 0)),
                position: [1, 64, 1],
                width: 5,
                height: 1,
                lines: vec!["hi".into()],
            }),
        );
        assert_eq!(
            client
                .monitor(DimensionId::NETHER, [1, 64, 1])
                .map(|m| m.lines.clone()),
            Some(vec!["hi".to_string()])
        );
        assert!(client.monitor(DimensionId::OVERWORLD, [1, 64, 1]).is_none());
    }

    #[test]
    fn deleting_open_computer_closes_menu() {
        let (mut client, _to_server) = connected_client();
        client.handle(
            PeerId(0),
            ClientboundMessage::OpenComputerMenu(OpenComputerMenu {
                instance_id: 5,
                family: ComputerFamily::Advanced,
                mode: MenuMode::TypingOnly,
            }),
        );
        client.handle(
            PeerId(0),
            ClientboundMessage::ComputerDeleted(ccnet_net::protocol::ComputerDeleted {
                instance_id: 5,
            }),
        );
        assert!(client.menu().is_none());
        assert!(client.computer(5).is_none());
    }
}
