//! Rendering of prior interactions into prompt text.

use crate::store::{MemoryContent, MemoryRecord};

/// Text used when nothing relevant was remembered.
pub const NO_HISTORY: &str = "No previous interactions found.";

/// Render search hits as a block for the response prompt.
///
/// Each record becomes one or more `Role: content` lines followed by `---`.
pub fn format_history(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return NO_HISTORY.to_string();
    }

    let mut out = String::from("Previous relevant interactions:\n");
    for record in records {
        match &record.memory {
            MemoryContent::Text(text) => {
                out.push_str("Memory: ");
                out.push_str(text);
                out.push('\n');
            }
            MemoryContent::Turns(turns) => {
                for turn in turns {
                    out.push_str(&capitalize(&turn.role));
                    out.push_str(": ");
                    out.push_str(&turn.content);
                    out.push('\n');
                }
            }
        }
        out.push_str("---\n");
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
