use std::time::{Duration, Instant};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use sage_core::{Category, CategoryContext, Config, Dispatcher, SageResult};
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// Transient one-line notice shown in the footer
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub expires: Instant,
}

const STATUS_TTL: Duration = Duration::from_secs(4);

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Prompt input
    pub prompt_input: String,
    pub prompt_cursor: usize, // cursor position in prompt_input (chars)

    // Chat view
    pub chat_scroll: u16,
    pub chat_max_scroll: u16, // updated during render
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    tick_count: u32,

    // Category picker state
    pub show_category_picker: bool,
    pub category_picker_state: ListState,

    // Attach file input state
    pub show_attach_input: bool,
    pub attach_input: String,

    pub status: Option<StatusMessage>,

    // Background clear of the uploaded-document collection
    pub clear_docs_task: Option<JoinHandle<SageResult<()>>>,

    pub category: CategoryContext,
    pub dispatcher: Dispatcher,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let category = CategoryContext::new(config.category());
        let dispatcher = Dispatcher::from_config(config, category.clone());
        Self::with_dispatcher(category, dispatcher)
    }

    pub fn with_dispatcher(category: CategoryContext, dispatcher: Dispatcher) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            prompt_input: String::new(),
            prompt_cursor: 0,

            chat_scroll: 0,
            chat_max_scroll: 0,
            follow_tail: true,
            chat_area: None,

            animation_frame: 0,
            tick_count: 0,

            show_category_picker: false,
            category_picker_state: ListState::default(),

            show_attach_input: false,
            attach_input: String::new(),

            status: None,

            clear_docs_task: None,

            category,
            dispatcher,
        }
    }

    pub fn current_category(&self) -> Category {
        self.category.get()
    }

    /// Called on every Tick event
    pub fn tick(&mut self, now: Instant) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.dispatcher.is_loading() && self.tick_count % 10 == 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        self.dispatcher.tick(now);

        if let Some(status) = &self.status {
            if now >= status.expires {
                self.status = None;
            }
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            expires: Instant::now() + STATUS_TTL,
        });
    }

    // Chat scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        self.follow_tail = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.chat_max_scroll;
        self.follow_tail = true;
    }

    // Category picker
    pub fn open_category_picker(&mut self) {
        let current = self.current_category();
        let index = Category::all().iter().position(|c| *c == current);
        self.category_picker_state.select(index.or(Some(0)));
        self.show_category_picker = true;
    }

    pub fn category_picker_nav_down(&mut self) {
        let len = Category::all().len();
        let i = self.category_picker_state.selected().unwrap_or(0);
        self.category_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn category_picker_nav_up(&mut self) {
        let i = self.category_picker_state.selected().unwrap_or(0);
        self.category_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Apply the highlighted category. Returns it so the caller can persist it.
    pub fn select_category(&mut self) -> Option<Category> {
        let selected = self
            .category_picker_state
            .selected()
            .and_then(|i| Category::all().get(i).copied());

        if let Some(category) = selected {
            self.category.set(category);
        }
        self.show_category_picker = false;
        selected
    }

    // Attach popup
    pub fn open_attach_input(&mut self) {
        self.attach_input.clear();
        self.show_attach_input = true;
    }

    pub fn close_attach_input(&mut self) {
        self.attach_input.clear();
        self.show_attach_input = false;
    }

    /// Apply the result of a finished document clear. Returns true if one settled.
    pub async fn poll_clear_documents(&mut self) -> bool {
        let finished = self
            .clear_docs_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);

        if !finished {
            return false;
        }

        let Some(task) = self.clear_docs_task.take() else {
            return false;
        };

        match task.await {
            Ok(Ok(())) => {
                info!("uploaded documents cleared");
                self.set_status("Uploaded documents cleared", StatusLevel::Info);
            }
            Ok(Err(e)) => {
                error!("failed to clear documents: {}", e);
                self.set_status("Could not clear uploaded documents", StatusLevel::Error);
            }
            Err(e) => {
                error!("clear documents task failed: {}", e);
                self.set_status("Could not clear uploaded documents", StatusLevel::Error);
            }
        }
        true
    }

    pub fn clear_prompt(&mut self) {
        self.prompt_input.clear();
        self.prompt_cursor = 0;
    }
}
