//! Rewritten-file answers: a JSON object of path to complete new content,
//! converted into one unified diff against the snapshot.

use std::collections::BTreeMap;

use similar::TextDiff;

use tinygen_core::FileSet;

/// Parse `answer` as a rewritten file set, or `None` when it is not a JSON
/// object of strings (optionally wrapped in a Markdown code fence).
pub fn parse_rewritten_files(answer: &str) -> Option<BTreeMap<String, String>> {
    let candidate = strip_markdown_fences(answer).unwrap_or_else(|| answer.trim());
    serde_json::from_str(candidate).ok()
}

/// Unified diff from `original` to `rewritten`, one section per changed file
/// in path order. Files absent from `original` diff against empty content.
pub fn diff_rewritten_files(original: &FileSet, rewritten: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (path, new_content) in rewritten {
        let path = path.replace('\\', "/");
        let path = path.strip_prefix("./").unwrap_or(&path);
        let old_content = original.get(path).unwrap_or("");
        if old_content == new_content {
            continue;
        }
        let old_header = format!("a/{path}");
        let new_header = format!("b/{path}");
        let unified = TextDiff::from_lines(old_content, new_content.as_str())
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();
        out.push_str(&unified);
    }
    out
}

/// Convert a rewritten-file answer into a unified diff, passing answers that
/// do not parse through unchanged.
pub fn to_unified_diff(original: &FileSet, answer: &str) -> String {
    match parse_rewritten_files(answer) {
        Some(rewritten) => diff_rewritten_files(original, &rewritten),
        None => {
            tracing::warn!(
                len = answer.len(),
                "answer is not a JSON object of file contents; returning it unchanged"
            );
            answer.to_string()
        }
    }
}

fn strip_markdown_fences(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let without_open = trimmed.strip_prefix("```")?;
    let after_header = match without_open.find('\n') {
        Some(idx) => &without_open[idx + 1..],
        None => without_open,
    };
    let end = after_header.rfind("```")?;
    Some(after_header[..end].trim())
}
