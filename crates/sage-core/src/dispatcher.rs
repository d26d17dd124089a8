//! Prompt submission and the request/response cycle
//!
//! The dispatcher owns the conversation, the pending attachment, the search
//! toggle, and at most one outstanding request. Text, file, search, paper, and
//! voice prompts all share the same in-flight guard: nothing new starts while
//! a request is outstanding or a recording is open.

use std::path::Path;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::attachment::Attachment;
use crate::audio::{AudioSource, MicrophoneSource, RecordingSession};
use crate::category::CategoryContext;
use crate::client::CompletionClient;
use crate::config::Config;
use crate::conversation::{Conversation, RevealTiming};
use crate::error::{SageError, SageResult};
use crate::route::{user_label, CompletionRequest};

pub const ERROR_MESSAGE: &str = "Error occurred while fetching data";
pub const RECORDING_LABEL: &str = "Recording...";
pub const AUDIO_SENT_LABEL: &str = "Audio message sent";
pub const MIC_ERROR_LABEL: &str = "Could not access microphone";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to send; no state changed
    Rejected,
    /// Another request or a recording is in progress
    Busy,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Started,
    Busy,
    /// The microphone could not be opened
    Failed,
}

/// Where the reply lands once the request settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyTarget {
    Placeholder(usize),
    Append,
}

struct InFlight {
    target: ReplyTarget,
    handle: JoinHandle<SageResult<String>>,
}

struct ActiveRecording {
    session: Box<dyn RecordingSession>,
    turn: usize,
}

pub struct Dispatcher {
    client: SageResult<CompletionClient>,
    category: CategoryContext,
    timing: RevealTiming,
    audio: Box<dyn AudioSource>,

    conversation: Conversation,
    attachment: Attachment,
    web_search: bool,

    in_flight: Option<InFlight>,
    recording: Option<ActiveRecording>,
}

impl Dispatcher {
    /// A client error is kept and reported at submit time, before any network call
    pub fn new(
        client: SageResult<CompletionClient>,
        category: CategoryContext,
        timing: RevealTiming,
        audio: Box<dyn AudioSource>,
    ) -> Self {
        Self {
            client,
            category,
            timing,
            audio,
            conversation: Conversation::new(),
            attachment: Attachment::None,
            web_search: false,
            in_flight: None,
            recording: None,
        }
    }

    /// Dispatcher backed by the configured service and the system microphone
    pub fn from_config(config: &Config, category: CategoryContext) -> Self {
        let client = config
            .api_settings()
            .and_then(|settings| CompletionClient::new(&settings));

        if let Err(e) = &client {
            warn!("completion client unavailable: {}", e);
        }

        Self::new(
            client,
            category,
            config.reveal_timing(),
            Box::new(MicrophoneSource),
        )
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn category(&self) -> &CategoryContext {
        &self.category
    }

    pub fn client(&self) -> Option<&CompletionClient> {
        self.client.as_ref().ok()
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.is_recording()
    }

    /// True while a voice reply is outstanding; it has no placeholder turn
    pub fn awaiting_voice_reply(&self) -> bool {
        matches!(
            self.in_flight,
            Some(InFlight {
                target: ReplyTarget::Append,
                ..
            })
        )
    }

    pub fn toggle_web_search(&mut self) {
        self.web_search = !self.web_search;
    }

    /// Load a file into the attachment slot, replacing whatever was there
    pub async fn select_file(&mut self, path: impl AsRef<Path>) -> SageResult<()> {
        let attachment = Attachment::load(path).await?;
        self.set_attachment(attachment);
        Ok(())
    }

    pub fn set_attachment(&mut self, attachment: Attachment) {
        if let Some(badge) = attachment.badge() {
            info!(attachment = %badge, "attachment selected");
        }
        self.attachment = attachment;
    }

    pub fn clear_attachment(&mut self) {
        self.attachment = Attachment::None;
    }

    pub fn toggle_latest_thought(&mut self) -> bool {
        match self.conversation.last_thought_index() {
            Some(index) => {
                self.conversation.toggle_thought(index);
                true
            }
            None => false,
        }
    }

    pub fn clear_conversation(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.conversation.clear();
        true
    }

    /// Advance simulated streaming. Returns true if anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.conversation.tick(now, self.timing)
    }

    pub fn submit(&mut self, prompt: &str) -> SubmitOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() && self.attachment.is_none() {
            return SubmitOutcome::Rejected;
        }
        if self.is_busy() {
            return SubmitOutcome::Busy;
        }

        self.conversation
            .push_user(user_label(prompt, &self.attachment, self.web_search));
        let turn = self.conversation.push_placeholder();

        let attachment = self.attachment.take();
        let request =
            CompletionRequest::select(self.category.get(), prompt, attachment, self.web_search);

        self.dispatch(request, ReplyTarget::Placeholder(turn));
        SubmitOutcome::Submitted
    }

    /// Ask the research-paper endpoint; the attachment slot is left alone
    pub fn submit_paper(&mut self, prompt: &str, paper: &str) -> SubmitOutcome {
        let prompt = prompt.trim();
        let paper = paper.trim();
        if prompt.is_empty() || paper.is_empty() {
            return SubmitOutcome::Rejected;
        }
        if self.is_busy() {
            return SubmitOutcome::Busy;
        }

        self.conversation
            .push_user(format!("[Papers: {}] {}", paper, prompt));
        let turn = self.conversation.push_placeholder();

        let request = CompletionRequest::papers(self.category.get(), prompt, paper);
        self.dispatch(request, ReplyTarget::Placeholder(turn));
        SubmitOutcome::Submitted
    }

    /// Submit and wait for the reply inline
    pub async fn submit_and_wait(&mut self, prompt: &str) -> SubmitOutcome {
        let outcome = self.submit(prompt);
        if outcome == SubmitOutcome::Submitted {
            self.wait().await;
        }
        outcome
    }

    pub fn start_recording(&mut self) -> RecordOutcome {
        if self.is_busy() {
            return RecordOutcome::Busy;
        }

        let turn = self.conversation.push_user(RECORDING_LABEL);
        match self.audio.start() {
            Ok(session) => {
                info!("recording started");
                self.recording = Some(ActiveRecording { session, turn });
                RecordOutcome::Started
            }
            Err(e) => {
                error!("failed to open microphone: {}", e);
                self.conversation.replace_user(turn, MIC_ERROR_LABEL);
                RecordOutcome::Failed
            }
        }
    }

    /// Finish the recording and send it. Returns false if nothing was recording.
    pub fn stop_recording(&mut self) -> bool {
        let Some(active) = self.recording.take() else {
            return false;
        };

        let payload = active.session.finish().and_then(|clip| clip.to_wav());
        self.conversation.replace_user(active.turn, AUDIO_SENT_LABEL);

        match payload {
            Ok(wav) => {
                let request = CompletionRequest::audio(self.category.get(), wav);
                self.dispatch(request, ReplyTarget::Append);
            }
            Err(e) => self.settle(ReplyTarget::Append, Err(e)),
        }
        true
    }

    /// Resolve the outstanding request if it has finished. Returns true if it did.
    pub async fn poll(&mut self) -> bool {
        let finished = self
            .in_flight
            .as_ref()
            .map(|f| f.handle.is_finished())
            .unwrap_or(false);

        if finished {
            self.wait().await;
        }
        finished
    }

    /// Wait for the outstanding request, if any, and apply its result
    pub async fn wait(&mut self) {
        if let Some(InFlight { target, handle }) = self.in_flight.take() {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(SageError::from(join_err)),
            };
            self.settle(target, result);
        }
    }

    fn dispatch(&mut self, request: CompletionRequest, target: ReplyTarget) {
        match &self.client {
            Ok(client) => {
                let client = client.clone();
                let handle = tokio::spawn(async move { client.send(&request).await });
                self.in_flight = Some(InFlight { target, handle });
            }
            Err(e) => {
                let err = match e {
                    SageError::Config(msg) => SageError::Config(msg.clone()),
                    other => SageError::Config(other.to_string()),
                };
                self.settle(target, Err(err));
            }
        }
    }

    fn settle(&mut self, target: ReplyTarget, result: SageResult<String>) {
        let now = Instant::now();

        match (target, result) {
            (ReplyTarget::Placeholder(index), Ok(text)) => {
                self.conversation.resolve(index, text, now);
            }
            (ReplyTarget::Placeholder(index), Err(e)) => {
                error!("API Error: {}", e);
                self.conversation.resolve_complete(index, ERROR_MESSAGE);
            }
            (ReplyTarget::Append, Ok(text)) => {
                let index = self.conversation.append_assistant(text);
                self.conversation.start_reveal(index, now);
            }
            (ReplyTarget::Append, Err(e)) => {
                error!("Audio API Error: {}", e);
                self.conversation.append_assistant(ERROR_MESSAGE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachedFile;
    use crate::audio::AudioClip;
    use crate::category::Category;
    use crate::conversation::DisplayState;

    struct SilentSource;

    struct SilentSession;

    impl AudioSource for SilentSource {
        fn start(&self) -> SageResult<Box<dyn RecordingSession>> {
            Ok(Box::new(SilentSession))
        }
    }

    impl RecordingSession for SilentSession {
        fn finish(self: Box<Self>) -> SageResult<AudioClip> {
            Ok(AudioClip {
                samples: vec![0.0; 160],
                sample_rate: 16000,
            })
        }
    }

    struct NoMicrophone;

    impl AudioSource for NoMicrophone {
        fn start(&self) -> SageResult<Box<dyn RecordingSession>> {
            Err(SageError::Audio("No input device available".into()))
        }
    }

    fn unconfigured(audio: Box<dyn AudioSource>) -> Dispatcher {
        Dispatcher::new(
            Err(SageError::Config("API key or URL is not defined".into())),
            CategoryContext::new(Category::Law),
            RevealTiming::default(),
            audio,
        )
    }

    fn pdf() -> Attachment {
        Attachment::Pdf(AttachedFile {
            file_name: "a.pdf".into(),
            mime: "application/pdf".into(),
            bytes: vec![1],
        })
    }

    #[tokio::test]
    async fn test_empty_submission_is_rejected() {
        let mut d = unconfigured(Box::new(SilentSource));
        assert_eq!(d.submit("   "), SubmitOutcome::Rejected);
        assert!(d.conversation().is_empty());
        assert!(!d.is_loading());
    }

    #[tokio::test]
    async fn test_missing_config_resolves_placeholder_with_error() {
        let mut d = unconfigured(Box::new(SilentSource));
        d.set_attachment(pdf());

        assert_eq!(d.submit("summarize"), SubmitOutcome::Submitted);
        assert!(!d.is_loading());

        let turns = d.conversation().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "[PDF: a.pdf] summarize");
        assert_eq!(turns[1].content, ERROR_MESSAGE);
        assert_eq!(turns[1].display, DisplayState::Complete);
        assert!(d.attachment().is_none());
    }

    #[tokio::test]
    async fn test_attachment_only_submission_is_accepted() {
        let mut d = unconfigured(Box::new(SilentSource));
        d.set_attachment(pdf());
        assert_eq!(d.submit(""), SubmitOutcome::Submitted);
        assert_eq!(d.conversation().turns()[0].content, "[PDF: a.pdf]");
    }

    #[tokio::test]
    async fn test_recording_labels_and_error_reply() {
        let mut d = unconfigured(Box::new(SilentSource));

        assert_eq!(d.start_recording(), RecordOutcome::Started);
        assert_eq!(d.conversation().turns()[0].content, RECORDING_LABEL);
        assert!(d.is_busy());
        assert_eq!(d.submit("hello"), SubmitOutcome::Busy);
        assert_eq!(d.start_recording(), RecordOutcome::Busy);

        assert!(d.stop_recording());
        let turns = d.conversation().turns();
        assert_eq!(turns[0].content, AUDIO_SENT_LABEL);
        assert_eq!(turns[1].content, ERROR_MESSAGE);
        assert!(!d.is_busy());
    }

    #[tokio::test]
    async fn test_microphone_failure() {
        let mut d = unconfigured(Box::new(NoMicrophone));
        assert_eq!(d.start_recording(), RecordOutcome::Failed);
        assert!(!d.is_recording());
        assert_eq!(d.conversation().turns()[0].content, MIC_ERROR_LABEL);
        assert!(!d.stop_recording());
    }

    #[test]
    fn test_selecting_image_replaces_pdf() {
        let mut d = unconfigured(Box::new(SilentSource));
        d.set_attachment(pdf());
        d.set_attachment(Attachment::Image(AttachedFile {
            file_name: "b.png".into(),
            mime: "image/png".into(),
            bytes: vec![2],
        }));
        assert!(matches!(d.attachment(), Attachment::Image(_)));
    }
}
