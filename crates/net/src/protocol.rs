//! Message definitions for the `computercraft:main` channel.
//!
//! Payload fields use postcard serialization: integers are varints, strings
//! and sequences carry a varint length prefix.

use crate::error::SetupError;
use crate::message::{decode_as, Message, MessageKind, Role};
use crate::registry::{MessageRegistry, Registration};
use ccnet_core::{ChunkAddress, ComputerFamily, ComputerId, DimensionId, WorldPos};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum length of a queued event name.
pub const MAX_EVENT_NAME_LEN: usize = 64;

/// Maximum number of arguments attached to a queued event.
pub const MAX_EVENT_ARGS: usize = 16;

/// Maximum length of a string event argument.
pub const MAX_EVENT_STRING_LEN: usize = 4096;

/// Maximum number of files in one upload.
pub const MAX_UPLOAD_FILES: usize = 32;

/// Maximum total size of one upload (bytes).
pub const MAX_UPLOAD_SIZE: usize = 512 * 1024;

/// Maximum size of one upload slice (bytes).
pub const MAX_SLICE_SIZE: usize = 30 * 1024;

/// Maximum length of an uploaded file name.
pub const MAX_FILE_NAME_LEN: usize = 128;

/// Maximum terminal dimension in characters.
pub const MAX_TERMINAL_DIM: u16 = 255;

/// Maximum rows in a chat table.
pub const MAX_TABLE_ROWS: usize = 256;

// ---------------------------------------------------------------------------
// Server-received payloads
// ---------------------------------------------------------------------------

/// Power action requested from a computer's menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerAction {
    /// Boot the computer.
    TurnOn,
    /// Shut the computer down.
    Shutdown,
    /// Restart the computer.
    Reboot,
}

/// Change the power state of an open computer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerAction {
    /// Target computer.
    pub instance_id: ComputerId,
    /// Requested action.
    pub action: PowerAction,
}

/// Argument of a queued event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventArg {
    /// No value.
    Nil,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// String value.
    String(String),
}

/// Queue an arbitrary event on an open computer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Target computer.
    pub instance_id: ComputerId,
    /// Event name.
    pub event: String,
    /// Event arguments.
    pub args: Vec<EventArg>,
}

/// Ask for the state of the computer the sender currently has open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestComputer {}

/// Key transition reported by a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    /// Key pressed.
    Down,
    /// Key held and auto-repeated.
    Repeat,
    /// Key released.
    Up,
}

/// Keyboard input on an open computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Target computer.
    pub instance_id: ComputerId,
    /// Transition.
    pub action: KeyAction,
    /// Key code.
    pub key: u32,
}

/// Mouse transition reported by a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseAction {
    /// Button pressed.
    Click,
    /// Moved while a button is held.
    Drag,
    /// Button released.
    Up,
    /// Wheel scrolled; the button field carries the direction.
    Scroll,
}

/// Mouse input on an open computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    /// Target computer.
    pub instance_id: ComputerId,
    /// Transition.
    pub action: MouseAction,
    /// Button index, or scroll direction for [`MouseAction::Scroll`].
    pub button: i32,
    /// Terminal column (1-based).
    pub x: u32,
    /// Terminal row (1-based).
    pub y: u32,
}

/// Name and size of one file in an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// File name.
    pub name: String,
    /// Total size in bytes.
    pub size: u32,
}

/// Start uploading files to an open computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Target computer.
    pub instance_id: ComputerId,
    /// Client-chosen upload id.
    pub upload_id: u64,
    /// Files that will follow.
    pub files: Vec<FileHeader>,
}

/// A chunk of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSlice {
    /// Index into [`UploadFile::files`].
    pub file: u32,
    /// Byte offset in that file.
    pub offset: u32,
    /// Slice contents.
    pub bytes: Vec<u8>,
}

/// Continue (and optionally finish) an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueUpload {
    /// Upload being continued.
    pub upload_id: u64,
    /// Slices carried by this message.
    pub slices: Vec<FileSlice>,
    /// Whether this is the last message of the upload.
    pub finished: bool,
}

/// Descriptor of each server-received message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerboundKind {
    /// [`ComputerAction`].
    ComputerAction,
    /// [`QueueEvent`].
    QueueEvent,
    /// [`RequestComputer`].
    RequestComputer,
    /// [`KeyEvent`].
    KeyEvent,
    /// [`MouseEvent`].
    MouseEvent,
    /// [`UploadFile`].
    UploadFile,
    /// [`ContinueUpload`].
    ContinueUpload,
}

impl MessageKind for ServerboundKind {
    fn name(self) -> &'static str {
        match self {
            ServerboundKind::ComputerAction => "ComputerAction",
            ServerboundKind::QueueEvent => "QueueEvent",
            ServerboundKind::RequestComputer => "RequestComputer",
            ServerboundKind::KeyEvent => "KeyEvent",
            ServerboundKind::MouseEvent => "MouseEvent",
            ServerboundKind::UploadFile => "UploadFile",
            ServerboundKind::ContinueUpload => "ContinueUpload",
        }
    }
}

/// Messages received by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundMessage {
    /// Power action.
    ComputerAction(ComputerAction),
    /// Arbitrary event.
    QueueEvent(QueueEvent),
    /// State request for the open computer.
    RequestComputer(RequestComputer),
    /// Keyboard input.
    KeyEvent(KeyEvent),
    /// Mouse input.
    MouseEvent(MouseEvent),
    /// Upload start.
    UploadFile(UploadFile),
    /// Upload continuation.
    ContinueUpload(ContinueUpload),
}

impl Message for ServerboundMessage {
    type Kind = ServerboundKind;

    const ROLE: Role = Role::Serverbound;

    const KINDS: &'static [ServerboundKind] = &[
        ServerboundKind::ComputerAction,
        ServerboundKind::QueueEvent,
        ServerboundKind::RequestComputer,
        ServerboundKind::KeyEvent,
        ServerboundKind::MouseEvent,
        ServerboundKind::UploadFile,
        ServerboundKind::ContinueUpload,
    ];

    fn kind(&self) -> ServerboundKind {
        match self {
            ServerboundMessage::ComputerAction(_) => ServerboundKind::ComputerAction,
            ServerboundMessage::QueueEvent(_) => ServerboundKind::QueueEvent,
            ServerboundMessage::RequestComputer(_) => ServerboundKind::RequestComputer,
            ServerboundMessage::KeyEvent(_) => ServerboundKind::KeyEvent,
            ServerboundMessage::MouseEvent(_) => ServerboundKind::MouseEvent,
            ServerboundMessage::UploadFile(_) => ServerboundKind::UploadFile,
            ServerboundMessage::ContinueUpload(_) => ServerboundKind::ContinueUpload,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<(), postcard::Error> {
        let bytes = match self {
            ServerboundMessage::ComputerAction(m) => postcard::to_allocvec(m)?,
            ServerboundMessage::QueueEvent(m) => postcard::to_allocvec(m)?,
            ServerboundMessage::RequestComputer(m) => postcard::to_allocvec(m)?,
            ServerboundMessage::KeyEvent(m) => postcard::to_allocvec(m)?,
            ServerboundMessage::MouseEvent(m) => postcard::to_allocvec(m)?,
            ServerboundMessage::UploadFile(m) => postcard::to_allocvec(m)?,
            ServerboundMessage::ContinueUpload(m) => postcard::to_allocvec(m)?,
        };
        out.extend_from_slice(&bytes);
        Ok(())
    }

    /// Size limits checked on every received message before it is scheduled.
    fn verify(&self) -> Result<(), &'static str> {
        match self {
            ServerboundMessage::QueueEvent(m) => {
                if m.event.is_empty() || m.event.len() > MAX_EVENT_NAME_LEN {
                    return Err("Invalid event name length");
                }
                if m.args.len() > MAX_EVENT_ARGS {
                    return Err("Too many event arguments");
                }
                let oversized = m.args.iter().any(
                    |arg| matches!(arg, EventArg::String(s) if s.len() > MAX_EVENT_STRING_LEN),
                );
                if oversized {
                    return Err("Event argument too long");
                }
            }
            ServerboundMessage::UploadFile(m) => {
                if m.files.is_empty() || m.files.len() > MAX_UPLOAD_FILES {
                    return Err("Invalid number of upload files");
                }
                let mut total = 0usize;
                for file in &m.files {
                    if file.name.is_empty() || file.name.len() > MAX_FILE_NAME_LEN {
                        return Err("Invalid upload file name");
                    }
                    total = total.saturating_add(file.size as usize);
                }
                if total > MAX_UPLOAD_SIZE {
                    return Err("Upload too large");
                }
            }
            ServerboundMessage::ContinueUpload(m) => {
                if m.slices.iter().any(|s| s.bytes.len() > MAX_SLICE_SIZE) {
                    return Err("Upload slice too large");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Client-received payloads
// ---------------------------------------------------------------------------

/// Tabulated chat output (e.g. command results).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTable {
    /// Identifier so a later table can replace this one in the chat log.
    pub table_id: u32,
    /// Optional header row.
    pub headers: Option<Vec<String>>,
    /// Table rows.
    pub rows: Vec<Vec<String>>,
}

/// Power state of a computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerData {
    /// Computer the state belongs to.
    pub instance_id: ComputerId,
    /// State name (`off`, `on`, `blinking`).
    pub state: String,
}

/// A computer was destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerDeleted {
    /// Computer that no longer exists.
    pub instance_id: ComputerId,
}

/// Full terminal contents of a computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerTerminal {
    /// Computer owning the terminal.
    pub instance_id: ComputerId,
    /// Width in characters.
    pub width: u16,
    /// Height in characters.
    pub height: u16,
    /// Text rows, top to bottom.
    pub lines: Vec<String>,
}

/// Start (or stop, with no record) a disk record at a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    /// Dimension of the drive.
    pub dimension: DimensionId,
    /// Drive position.
    pub position: WorldPos,
    /// Record to play; `None` stops playback.
    pub record: Option<String>,
}

/// Contents of a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    /// Chunk holding the monitor.
    pub chunk: ChunkAddress,
    /// Block position of the monitor origin.
    pub position: [i32; 3],
    /// Width in characters.
    pub width: u16,
    /// Height in characters.
    pub height: u16,
    /// Text rows, top to bottom.
    pub lines: Vec<String>,
}

/// A speaker started a sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerPlay {
    /// Speaker instance.
    pub source: u64,
    /// Dimension of the speaker.
    pub dimension: DimensionId,
    /// Sound position.
    pub position: WorldPos,
    /// Sound name.
    pub sound: String,
    /// Volume multiplier.
    pub volume: f32,
    /// Pitch multiplier.
    pub pitch: f32,
}

/// A speaker stopped its sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerStop {
    /// Speaker instance.
    pub source: u64,
}

/// A speaker playing a sound moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerMove {
    /// Speaker instance.
    pub source: u64,
    /// New sound position.
    pub position: WorldPos,
}

/// Outcome of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    /// Every file was stored.
    Success,
    /// The upload was discarded.
    Error,
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Computer that received the upload.
    pub instance_id: ComputerId,
    /// Outcome.
    pub status: UploadStatus,
    /// Human-readable detail.
    pub message: String,
}

/// How a computer menu is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuMode {
    /// Terminal view with keyboard input.
    Terminal,
    /// Input only, no terminal view (pocket computers held in the off hand).
    TypingOnly,
}

/// Open an interactive computer session on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenComputerMenu {
    /// Computer the session belongs to.
    pub instance_id: ComputerId,
    /// Hardware tier, selects the screen.
    pub family: ComputerFamily,
    /// Presentation mode.
    pub mode: MenuMode,
}

/// Descriptor of each client-received message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientboundKind {
    /// [`ChatTable`].
    ChatTable,
    /// [`ComputerData`].
    ComputerData,
    /// [`ComputerDeleted`].
    ComputerDeleted,
    /// [`ComputerTerminal`].
    ComputerTerminal,
    /// [`PlayRecord`].
    PlayRecord,
    /// [`Monitor`].
    Monitor,
    /// [`SpeakerPlay`].
    SpeakerPlay,
    /// [`SpeakerStop`].
    SpeakerStop,
    /// [`SpeakerMove`].
    SpeakerMove,
    /// [`UploadResult`].
    UploadResult,
    /// [`OpenComputerMenu`].
    OpenComputerMenu,
}

impl MessageKind for ClientboundKind {
    fn name(self) -> &'static str {
        match self {
            ClientboundKind::ChatTable => "ChatTable",
            ClientboundKind::ComputerData => "ComputerData",
            ClientboundKind::ComputerDeleted => "ComputerDeleted",
            ClientboundKind::ComputerTerminal => "ComputerTerminal",
            ClientboundKind::PlayRecord => "PlayRecord",
            ClientboundKind::Monitor => "Monitor",
            ClientboundKind::SpeakerPlay => "SpeakerPlay",
            ClientboundKind::SpeakerStop => "SpeakerStop",
            ClientboundKind::SpeakerMove => "SpeakerMove",
            ClientboundKind::UploadResult => "UploadResult",
            ClientboundKind::OpenComputerMenu => "OpenComputerMenu",
        }
    }
}

/// Messages received by clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundMessage {
    /// Chat table.
    ChatTable(ChatTable),
    /// Computer state.
    ComputerData(ComputerData),
    /// Computer removal.
    ComputerDeleted(ComputerDeleted),
    /// Terminal contents.
    ComputerTerminal(ComputerTerminal),
    /// Record playback.
    PlayRecord(PlayRecord),
    /// Monitor contents.
    Monitor(Monitor),
    /// Speaker sound start.
    SpeakerPlay(SpeakerPlay),
    /// Speaker sound stop.
    SpeakerStop(SpeakerStop),
    /// Speaker movement.
    SpeakerMove(SpeakerMove),
    /// Upload outcome.
    UploadResult(UploadResult),
    /// Menu opening.
    OpenComputerMenu(OpenComputerMenu),
}

impl Message for ClientboundMessage {
    type Kind = ClientboundKind;

    const ROLE: Role = Role::Clientbound;

    const KINDS: &'static [ClientboundKind] = &[
        ClientboundKind::ChatTable,
        ClientboundKind::ComputerData,
        ClientboundKind::ComputerDeleted,
        ClientboundKind::ComputerTerminal,
        ClientboundKind::PlayRecord,
        ClientboundKind::Monitor,
        ClientboundKind::SpeakerPlay,
        ClientboundKind::SpeakerStop,
        ClientboundKind::SpeakerMove,
        ClientboundKind::UploadResult,
        ClientboundKind::OpenComputerMenu,
    ];

    fn kind(&self) -> ClientboundKind {
        match self {
            ClientboundMessage::ChatTable(_) => ClientboundKind::ChatTable,
            ClientboundMessage::ComputerData(_) => ClientboundKind::ComputerData,
            ClientboundMessage::ComputerDeleted(_) => ClientboundKind::ComputerDeleted,
            ClientboundMessage::ComputerTerminal(_) => ClientboundKind::ComputerTerminal,
            ClientboundMessage::PlayRecord(_) => ClientboundKind::PlayRecord,
            ClientboundMessage::Monitor(_) => ClientboundKind::Monitor,
            ClientboundMessage::SpeakerPlay(_) => ClientboundKind::SpeakerPlay,
            ClientboundMessage::SpeakerStop(_) => ClientboundKind::SpeakerStop,
            ClientboundMessage::SpeakerMove(_) => ClientboundKind::SpeakerMove,
            ClientboundMessage::UploadResult(_) => ClientboundKind::UploadResult,
            ClientboundMessage::OpenComputerMenu(_) => ClientboundKind::OpenComputerMenu,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) -> Result<(), postcard::Error> {
        let bytes = match self {
            ClientboundMessage::ChatTable(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::ComputerData(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::ComputerDeleted(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::ComputerTerminal(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::PlayRecord(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::Monitor(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::SpeakerPlay(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::SpeakerStop(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::SpeakerMove(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::UploadResult(m) => postcard::to_allocvec(m)?,
            ClientboundMessage::OpenComputerMenu(m) => postcard::to_allocvec(m)?,
        };
        out.extend_from_slice(&bytes);
        Ok(())
    }

    fn verify(&self) -> Result<(), &'static str> {
        match self {
            ClientboundMessage::ComputerTerminal(m) => {
                if m.width > MAX_TERMINAL_DIM || m.height > MAX_TERMINAL_DIM {
                    return Err("Terminal too large");
                }
                if m.lines.len() > usize::from(m.height) {
                    return Err("More terminal lines than rows");
                }
            }
            ClientboundMessage::Monitor(m) => {
                if m.lines.len() > usize::from(m.height) {
                    return Err("More monitor lines than rows");
                }
            }
            ClientboundMessage::ChatTable(m) => {
                if m.rows.len() > MAX_TABLE_ROWS {
                    return Err("Too many chat table rows");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

macro_rules! lift_payloads {
    ($set:ident { $($variant:ident),* $(,)? }) => {
        $(
            impl From<$variant> for $set {
                fn from(payload: $variant) -> Self {
                    $set::$variant(payload)
                }
            }
        )*
    };
}

lift_payloads!(ServerboundMessage {
    ComputerAction,
    QueueEvent,
    RequestComputer,
    KeyEvent,
    MouseEvent,
    UploadFile,
    ContinueUpload,
});

lift_payloads!(ClientboundMessage {
    ChatTable,
    ComputerData,
    ComputerDeleted,
    ComputerTerminal,
    PlayRecord,
    Monitor,
    SpeakerPlay,
    SpeakerStop,
    SpeakerMove,
    UploadResult,
    OpenComputerMenu,
});

// ---------------------------------------------------------------------------
// Standard registration tables
// ---------------------------------------------------------------------------

/// Server-received registration table.
pub fn serverbound_table() -> [Registration<ServerboundMessage>; 7] {
    type M = ServerboundMessage;
    [
        (0, ServerboundKind::ComputerAction, decode_as::<ComputerAction, M>),
        (1, ServerboundKind::QueueEvent, decode_as::<QueueEvent, M>),
        (2, ServerboundKind::RequestComputer, decode_as::<RequestComputer, M>),
        (3, ServerboundKind::KeyEvent, decode_as::<KeyEvent, M>),
        (4, ServerboundKind::MouseEvent, decode_as::<MouseEvent, M>),
        (5, ServerboundKind::UploadFile, decode_as::<UploadFile, M>),
        (6, ServerboundKind::ContinueUpload, decode_as::<ContinueUpload, M>),
    ]
}

/// Client-received registration table.
pub fn clientbound_table() -> [Registration<ClientboundMessage>; 11] {
    type M = ClientboundMessage;
    [
        (10, ClientboundKind::ChatTable, decode_as::<ChatTable, M>),
        (11, ClientboundKind::ComputerData, decode_as::<ComputerData, M>),
        (12, ClientboundKind::ComputerDeleted, decode_as::<ComputerDeleted, M>),
        (13, ClientboundKind::ComputerTerminal, decode_as::<ComputerTerminal, M>),
        (14, ClientboundKind::PlayRecord, decode_as::<PlayRecord, M>),
        (15, ClientboundKind::Monitor, decode_as::<Monitor, M>),
        (16, ClientboundKind::SpeakerPlay, decode_as::<SpeakerPlay, M>),
        (17, ClientboundKind::SpeakerStop, decode_as::<SpeakerStop, M>),
        (18, ClientboundKind::SpeakerMove, decode_as::<SpeakerMove, M>),
        (19, ClientboundKind::UploadResult, decode_as::<UploadResult, M>),
        (20, ClientboundKind::OpenComputerMenu, decode_as::<OpenComputerMenu, M>),
    ]
}

/// Build the standard server-received registry.
pub fn serverbound_registry() -> Result<MessageRegistry<ServerboundMessage>, SetupError> {
    MessageRegistry::from_table(&serverbound_table())
}

/// Build the standard client-received registry.
pub fn clientbound_registry() -> Result<MessageRegistry<ClientboundMessage>, SetupError> {
    MessageRegistry::from_table(&clientbound_table())
}

/// Both role registries of a process, built once at startup.
#[derive(Debug, Clone)]
pub struct ProtocolRegistries {
    /// Messages the server receives.
    pub serverbound: Arc<MessageRegistry<ServerboundMessage>>,
    /// Messages clients receive.
    pub clientbound: Arc<MessageRegistry<ClientboundMessage>>,
}

impl ProtocolRegistries {
    /// Build the standard message table for both roles.
    pub fn standard() -> Result<Self, SetupError> {
        Ok(Self {
            serverbound: Arc::new(serverbound_registry()?),
            clientbound: Arc::new(clientbound_registry()?),
        })
    }

    /// Hash of both message tables.
    ///
    /// Peers exchange this during the link hello to reject builds with a
    /// different id assignment.
    pub fn schema_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(crate::link::LINK_MAGIC);
        self.serverbound.hash_into(&mut hasher);
        self.clientbound.hash_into(&mut hasher);

        let hash = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(prefix)
    }
}
