pub mod extraction;

use crate::traits::MemoryRecord;

/// Render retrieved memories as the block injected into the session prompt.
/// Returns an empty string when there is nothing to inject.
pub fn format_memories(memories: &[MemoryRecord]) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let mut lines = vec!["<memories>".to_string()];
    for memory in memories {
        lines.push(format!("- [{}] {}", memory.kind, memory.content));
    }
    lines.push("</memories>".to_string());
    lines.join("\n")
}
