use crate::attachment::{AttachedFile, Attachment};
use crate::category::Category;

/// Endpoint variants of the completion service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Search,
    Pdf,
    Image,
    Text,
    Audio,
    Papers,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Search => "/search",
            Route::Pdf => "/pdfs",
            Route::Image => "/image",
            Route::Text => "/text",
            Route::Audio => "/audio",
            Route::Papers => "/papers",
        }
    }

    /// Paths that ask the service for JSON explicitly
    pub fn wants_accept_header(&self) -> bool {
        matches!(self, Route::Search | Route::Pdf | Route::Image | Route::Audio)
    }

    pub fn sends_prompt(&self) -> bool {
        !matches!(self, Route::Audio)
    }
}

/// One outbound call, fully parameterized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub route: Route,
    pub category: Category,
    pub prompt: String,
    pub file: Option<AttachedFile>,
    pub paper: Option<String>,
}

impl CompletionRequest {
    /// Pick exactly one path: web search, then PDF, then image, then plain text
    pub fn select(
        category: Category,
        prompt: &str,
        attachment: Attachment,
        web_search: bool,
    ) -> Self {
        let prompt = prompt.to_string();

        if web_search {
            return Self {
                route: Route::Search,
                category,
                prompt,
                file: None,
                paper: None,
            };
        }

        let (route, file) = match attachment {
            Attachment::Pdf(f) => (Route::Pdf, Some(f)),
            Attachment::Image(f) => (Route::Image, Some(f)),
            Attachment::None => (Route::Text, None),
        };

        Self {
            route,
            category,
            prompt,
            file,
            paper: None,
        }
    }

    pub fn audio(category: Category, wav: Vec<u8>) -> Self {
        Self {
            route: Route::Audio,
            category,
            prompt: String::new(),
            file: Some(AttachedFile {
                file_name: "recording.wav".to_string(),
                mime: "audio/wav".to_string(),
                bytes: wav,
            }),
            paper: None,
        }
    }

    pub fn papers(category: Category, prompt: &str, paper: &str) -> Self {
        Self {
            route: Route::Papers,
            category,
            prompt: prompt.to_string(),
            file: None,
            paper: Some(paper.to_string()),
        }
    }
}

/// Label shown on the user's turn, annotated with the chosen mode
pub fn user_label(prompt: &str, attachment: &Attachment, web_search: bool) -> String {
    let prompt = prompt.trim();
    let tag = if web_search {
        Some("[Web Search]".to_string())
    } else {
        attachment.badge().map(|b| format!("[{}]", b))
    };

    match (tag, prompt.is_empty()) {
        (Some(tag), true) => tag,
        (Some(tag), false) => format!("{} {}", tag, prompt),
        (None, _) => prompt.to_string(),
    }
}
