//! Prompt context: the serializable payload handed to every template.

use serde::{Deserialize, Serialize};

use tinygen_core::{ArtifactFormat, FileSet};

use crate::error::RenderError;

/// Rendering payload for proposal and reflection prompts.
///
/// Reflection templates only use `format` and `sentinel`; `files` and
/// `instruction` are empty there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    /// Snapshot files in path order.
    pub files: Vec<FileCtx>,
    /// The user's change request.
    pub instruction: String,
    /// `unified_diff` or `rewritten_files`.
    pub format: String,
    /// Reply that accepts the first answer.
    pub sentinel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCtx {
    pub path: String,
    pub content: String,
}

impl PromptContext {
    pub fn proposal(files: &FileSet, instruction: &str, format: ArtifactFormat) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| FileCtx {
                    path: path.to_string(),
                    content: content.to_string(),
                })
                .collect(),
            instruction: instruction.to_string(),
            ..Self::reflection(format)
        }
    }

    pub fn reflection(format: ArtifactFormat) -> Self {
        Self {
            files: Vec::new(),
            instruction: String::new(),
            format: format.to_string(),
            sentinel: format.sentinel().to_string(),
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_keeps_file_order_and_sentinel() {
        let files: FileSet = [("b.py", "B"), ("a.py", "A")].into_iter().collect();
        let ctx = PromptContext::proposal(&files, "do it", ArtifactFormat::RewrittenFiles);
        let paths: Vec<_> = ctx.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
        assert_eq!(ctx.sentinel, "n");
        assert_eq!(ctx.format, "rewritten_files");
    }

    #[test]
    fn to_tera_context_succeeds() {
        let ctx = PromptContext::reflection(ArtifactFormat::UnifiedDiff);
        ctx.to_tera_context().expect("context conversion");
    }
}
