use std::path::Path;
use tracing::debug;

use crate::error::{SageError, SageResult};

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
];

/// A file read from disk, ready to go out as a multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// The single pending attachment slot. Image and PDF are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Attachment {
    #[default]
    None,
    Image(AttachedFile),
    Pdf(AttachedFile),
}

impl Attachment {
    /// Read a file and classify it by extension
    pub async fn load(path: impl AsRef<Path>) -> SageResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let kind = classify(&file_name)?;
        let bytes = tokio::fs::read(path).await?;
        debug!(file = %file_name, size = bytes.len(), "loaded attachment");

        Ok(match kind {
            AttachmentKind::Image(mime) => Attachment::Image(AttachedFile {
                file_name,
                mime: mime.to_string(),
                bytes,
            }),
            AttachmentKind::Pdf => Attachment::Pdf(AttachedFile {
                file_name,
                mime: "application/pdf".to_string(),
                bytes,
            }),
        })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Attachment::None)
    }

    pub fn file(&self) -> Option<&AttachedFile> {
        match self {
            Attachment::None => None,
            Attachment::Image(f) | Attachment::Pdf(f) => Some(f),
        }
    }

    /// Short badge for headers and labels, e.g. `PDF: contract.pdf`
    pub fn badge(&self) -> Option<String> {
        match self {
            Attachment::None => None,
            Attachment::Image(f) => Some(format!("Image: {}", f.file_name)),
            Attachment::Pdf(f) => Some(format!("PDF: {}", f.file_name)),
        }
    }

    /// Empty the slot, returning what was in it
    pub fn take(&mut self) -> Attachment {
        std::mem::take(self)
    }
}

enum AttachmentKind {
    Image(&'static str),
    Pdf,
}

fn classify(file_name: &str) -> SageResult<AttachmentKind> {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if ext == "pdf" {
        return Ok(AttachmentKind::Pdf);
    }

    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| AttachmentKind::Image(*mime))
        .ok_or_else(|| SageError::UnsupportedAttachment(file_name.to_string()))
}
