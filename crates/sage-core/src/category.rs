use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Topic domain forwarded with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Medical,
    Law,
    Tech,
    Architecture,
    Literature,
    Finance,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Medical => "medical",
            Category::Law => "law",
            Category::Tech => "tech",
            Category::Architecture => "architecture",
            Category::Literature => "literature",
            Category::Finance => "finance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "medical" => Some(Category::Medical),
            "law" => Some(Category::Law),
            "tech" => Some(Category::Tech),
            "architecture" => Some(Category::Architecture),
            "literature" => Some(Category::Literature),
            "finance" => Some(Category::Finance),
            _ => None,
        }
    }

    pub fn all() -> Vec<Category> {
        vec![
            Category::Medical,
            Category::Law,
            Category::Tech,
            Category::Architecture,
            Category::Literature,
            Category::Finance,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Medical => "Medical",
            Category::Law => "Law",
            Category::Tech => "Technical",
            Category::Architecture => "Architecture",
            Category::Literature => "Literature",
            Category::Finance => "Finance",
        }
    }
}

/// Shared handle to the session's selected category.
///
/// The selector writes it, the dispatcher reads it when a prompt is submitted.
/// Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct CategoryContext {
    inner: Arc<RwLock<Category>>,
}

impl CategoryContext {
    pub fn new(category: Category) -> Self {
        Self {
            inner: Arc::new(RwLock::new(category)),
        }
    }

    pub fn get(&self) -> Category {
        // A poisoned lock still holds a valid Copy value
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, category: Category) {
        match self.inner.write() {
            Ok(mut guard) => *guard = category,
            Err(poisoned) => *poisoned.into_inner() = category,
        }
    }
}
