//! Tera prompt engine: [`PromptKind`] and [`PromptRenderer`].
//!
//! # Template names
//!
//! | Prompt     | `unified_diff`                     | `rewritten_files`                     |
//! |------------|------------------------------------|---------------------------------------|
//! | Proposal   | `proposal/unified_diff.tera`       | `proposal/rewritten_files.tera`       |
//! | Reflection | `reflection/unified_diff.tera`     | `reflection/rewritten_files.tera`     |
//!
//! A file with the same relative name under the user template directory
//! replaces the embedded one.

use std::collections::BTreeMap;
use std::path::Path;

use tera::Tera;
use walkdir::WalkDir;

use tinygen_core::{ArtifactFormat, FileSet};

use crate::context::PromptContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_files.tera", include_str!("templates/_partials/files.tera")),
    (
        "proposal/unified_diff.tera",
        include_str!("templates/proposal_unified_diff.tera"),
    ),
    (
        "proposal/rewritten_files.tera",
        include_str!("templates/proposal_rewritten_files.tera"),
    ),
    (
        "reflection/unified_diff.tera",
        include_str!("templates/reflection_unified_diff.tera"),
    ),
    (
        "reflection/rewritten_files.tera",
        include_str!("templates/reflection_rewritten_files.tera"),
    ),
];

// ---------------------------------------------------------------------------
// Template loading
// ---------------------------------------------------------------------------

/// Template name for a path relative to the template root: forward slashes,
/// lowercase, so `Proposal\Unified_Diff.tera` overrides `proposal/unified_diff.tera`.
fn template_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every `.tera` file under `dir`, keyed by template name. A missing
/// directory means no overrides.
fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut templates = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            RenderError::Io { path, source }
        })?;
        let path = entry.path();
        let is_template =
            entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("tera");
        if !is_template {
            continue;
        }
        let contents = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let relative = path.strip_prefix(dir).unwrap_or(path);
        templates.push((template_name(relative), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: BTreeMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (name.to_string(), content.to_string()))
        .collect();

    if let Some(dir) = user_template_dir {
        for (name, contents) in load_user_templates(dir)? {
            if templates.insert(name.clone(), contents).is_some() {
                tracing::info!(template = %name, dir = %dir.display(), "using prompt template override");
            } else {
                tracing::debug!(template = %name, dir = %dir.display(), "loaded extra prompt template");
            }
        }
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// PromptKind
// ---------------------------------------------------------------------------

/// The two turns of the synthesis protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Proposal,
    Reflection,
}

impl PromptKind {
    pub fn all() -> &'static [PromptKind] {
        &[PromptKind::Proposal, PromptKind::Reflection]
    }

    pub fn template_name(&self, format: ArtifactFormat) -> &'static str {
        match (self, format) {
            (PromptKind::Proposal, ArtifactFormat::UnifiedDiff) => "proposal/unified_diff.tera",
            (PromptKind::Proposal, ArtifactFormat::RewrittenFiles) => {
                "proposal/rewritten_files.tera"
            }
            (PromptKind::Reflection, ArtifactFormat::UnifiedDiff) => {
                "reflection/unified_diff.tera"
            }
            (PromptKind::Reflection, ArtifactFormat::RewrittenFiles) => {
                "reflection/rewritten_files.tera"
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PromptRenderer
// ---------------------------------------------------------------------------

/// Renders proposal and reflection prompts.
///
/// Create once and reuse; rendering never touches the filesystem.
pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(PromptRenderer { tera: build_tera(None)? })
    }

    /// Embedded templates, overridden by any `.tera` files under `dir`.
    /// A missing directory is not an error.
    pub fn with_user_templates(dir: &Path) -> Result<Self, RenderError> {
        Ok(PromptRenderer { tera: build_tera(Some(dir))? })
    }

    /// First turn: every file under a `### <path>` heading, then the
    /// instruction, then the request for an answer in `format`.
    pub fn render_proposal(
        &self,
        files: &FileSet,
        instruction: &str,
        format: ArtifactFormat,
    ) -> Result<String, RenderError> {
        let ctx = PromptContext::proposal(files, instruction, format);
        self.render(PromptKind::Proposal, format, &ctx)
    }

    /// Second turn: confirm with the format's sentinel or replace the answer.
    pub fn render_reflection(&self, format: ArtifactFormat) -> Result<String, RenderError> {
        let ctx = PromptContext::reflection(format);
        self.render(PromptKind::Reflection, format, &ctx)
    }

    pub fn render(
        &self,
        kind: PromptKind,
        format: ArtifactFormat,
        ctx: &PromptContext,
    ) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(self.tera.render(kind.template_name(format), &tera_ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
