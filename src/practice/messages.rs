use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::HeaderInfo;
use crate::practice::discovery::AvailableSets;
use crate::practice::feedback::{FeedbackEvent, FeedbackSettings};
use crate::practice::render::RenderedView;
use crate::practice::selection::Parity;

/// Messages sent from a practice page (WebSocket) to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "messageType", content = "payload")]
pub enum ClientToServerMessage {
    /// Sent right after the WebSocket opens to attach to a session.
    ConnectToSession { session_id: Uuid },
    /// A click on the option shown at `option` of card `card`, made on the
    /// view carrying render `generation`.
    SelectOption {
        card: usize,
        option: usize,
        generation: u64,
    },
    /// Control panel: go to another set. Answered with `Navigate`.
    SwitchSet { set: u32 },
    /// Control panel: show only odd or even numbered questions.
    Filter { parity: Parity },
    /// Control panel: show a random subset. The count is the raw form value.
    Random {
        #[serde(default)]
        count: Option<String>,
    },
    /// Control panel: show the whole set again.
    ShowAll,
    ToggleSound,
    ToggleConfetti,
    /// Detach from the session and close the connection.
    LeaveSession,
}

/// Control-panel state published with every snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControlPanel {
    pub current_set: u32,
    pub available_sets: Vec<u32>,
}

impl ControlPanel {
    pub fn new(current_set: u32, available_sets: &AvailableSets) -> Self {
        Self {
            current_set,
            available_sets: available_sets.as_slice().to_vec(),
        }
    }
}

/// Everything a freshly connected page needs to draw itself.
#[derive(Serialize, Debug, Clone)]
pub struct SessionSnapshot {
    pub header: HeaderInfo,
    pub control_panel: ControlPanel,
    pub settings: FeedbackSettings,
    pub view: RenderedView,
}

/// Messages sent from the server to a practice page.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "messageType", content = "payload")]
pub enum ServerToClientMessage {
    SessionSnapshot(SessionSnapshot),
    /// The displayed list was rebuilt.
    Rendered { view: RenderedView },
    Feedback { event: FeedbackEvent },
    /// The page should load this query string.
    Navigate { query: String },
    SettingsChanged { settings: FeedbackSettings },
    SystemError { message: String },
}

impl ServerToClientMessage {
    pub fn to_ws_text(&self) -> Result<axum::extract::ws::Message, serde_json::Error> {
        serde_json::to_string(self)
            .map(|json_string| axum::extract::ws::Message::Text(json_string.into()))
    }
}

pub fn client_message_from_ws_text(text: &str) -> Result<ClientToServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}
