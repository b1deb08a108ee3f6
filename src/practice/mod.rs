//! The practice engine: which sets exist, loading them, shuffling options,
//! choosing what to display, rendering cards and reacting to answers.

pub mod card;
pub mod discovery;
pub mod feedback;
pub mod loader;
pub mod messages;
pub mod navigation;
pub mod render;
pub mod selection;
pub mod shuffle;
pub mod utils;

pub use card::{Card, CardState, Transition};
pub use discovery::{AvailableSets, discover_sets};
pub use feedback::{
    FeedbackDriver, FeedbackEvent, FeedbackSettings, FeedbackSink, OptionMark, RenderGeneration,
};
pub use loader::{PrefetchSchedule, QuestionLoader};
pub use messages::{ClientToServerMessage, ServerToClientMessage, SessionSnapshot};
pub use navigation::PageParams;
pub use render::{LoadFailure, RenderOrchestrator, RenderedView, ViewBody};
pub use selection::{Parity, SelectionMode, select};
pub use shuffle::{ShuffledPresentation, shuffle_options};
