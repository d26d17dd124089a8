pub mod attachment;
pub mod audio;
pub mod category;
pub mod client;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod route;
pub mod thought;

// Re-export main types for convenience
pub use attachment::{AttachedFile, Attachment};
pub use audio::{AudioClip, AudioSource, MicrophoneSource, RecordingSession};
pub use category::{Category, CategoryContext};
pub use client::{CompletionClient, NO_RESPONSE};
pub use config::{ApiSettings, Config};
pub use conversation::{ChatMessage, ChatRole, Conversation, DisplayState, RevealTiming};
pub use dispatcher::{Dispatcher, RecordOutcome, SubmitOutcome, ERROR_MESSAGE};
pub use error::{SageError, SageResult};
pub use route::{user_label, CompletionRequest, Route};
pub use thought::{split_partial, split_thought, ThoughtSplit};
