use regex::Regex;
use std::sync::OnceLock;

/// Assistant content split into its reasoning segment and the displayed answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThoughtSplit {
    pub thought: Option<String>,
    pub main: String,
}

fn think_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("static regex"))
}

/// Extract the first `<think>...</think>` segment and strip it from the answer.
pub fn split_thought(content: &str) -> ThoughtSplit {
    let re = think_regex();

    match re.captures(content) {
        Some(caps) => {
            let thought = caps.get(1).map(|m| m.as_str().trim().to_string());
            let main = re.replacen(content, 1, "").trim().to_string();
            ThoughtSplit {
                thought: thought.filter(|t| !t.is_empty()),
                main,
            }
        }
        None => ThoughtSplit {
            thought: None,
            main: content.trim().to_string(),
        },
    }
}

/// Split text that may still be mid-reveal. An opened but unclosed thought
/// hides everything after its opening marker.
pub fn split_partial(partial: &str) -> ThoughtSplit {
    match (partial.find("<think>"), partial.contains("</think>")) {
        (Some(open), false) => ThoughtSplit {
            thought: None,
            main: partial[..open].trim().to_string(),
        },
        _ => split_thought(partial),
    }
}
