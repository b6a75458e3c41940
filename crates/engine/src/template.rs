// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template engine interface consumed by roles, with filesystem- and
//! zip-backed implementations.
//!
//! Templates interpolate `${name}` placeholders against a JSON context. A
//! variable holding null renders as the empty string; unknown placeholders
//! stay in place and are reported by the listing functions.

use regex::Regex;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

/// Context a template renders against: role fields plus per-call extras.
pub type TemplateVars = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0:?} not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot read template {path:?} from archive: {reason}")]
    Archive { path: String, reason: String },
}

/// Text templating for roles.
pub trait TemplateEngine: Send {
    /// Render a template given as a string.
    fn render_string(&self, template: &str, ctx: &TemplateVars) -> Result<String, TemplateError>;

    /// Render a named template file from the engine's root.
    fn render_file(&self, path: &str, ctx: &TemplateVars) -> Result<String, TemplateError>;

    /// Placeholder names referenced by a template string.
    fn list_string_template_vars(&self, template: &str)
        -> Result<BTreeSet<String>, TemplateError>;

    /// Placeholder names referenced by a template file.
    fn list_file_template_vars(&self, path: &str) -> Result<BTreeSet<String>, TemplateError>;
}

// ${variable_name}
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("constant regex pattern is valid")
});

fn format_value(value: &serde_json::Value) -> String {
    match value {
        // Null renders as the empty string.
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Interpolate `${name}` placeholders from `ctx`; unknown names stay as-is.
fn interpolate(template: &str, ctx: &TemplateVars) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures| match ctx.get(&caps[1]) {
            Some(value) => format_value(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn list_vars(template: &str) -> BTreeSet<String> {
    VAR_PATTERN
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Engine rendering template files found under one or more root directories.
pub struct FilesystemEngine {
    roots: Vec<PathBuf>,
}

impl FilesystemEngine {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    fn read(&self, path: &str) -> Result<String, TemplateError> {
        for root in &self.roots {
            let candidate = root.join(path);
            match std::fs::read_to_string(&candidate) {
                Ok(contents) => return Ok(contents),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(TemplateError::NotFound(path.to_string()))
    }
}

impl TemplateEngine for FilesystemEngine {
    fn render_string(&self, template: &str, ctx: &TemplateVars) -> Result<String, TemplateError> {
        Ok(interpolate(template, ctx))
    }

    fn render_file(&self, path: &str, ctx: &TemplateVars) -> Result<String, TemplateError> {
        Ok(interpolate(&self.read(path)?, ctx))
    }

    fn list_string_template_vars(
        &self,
        template: &str,
    ) -> Result<BTreeSet<String>, TemplateError> {
        Ok(list_vars(template))
    }

    fn list_file_template_vars(&self, path: &str) -> Result<BTreeSet<String>, TemplateError> {
        Ok(list_vars(&self.read(path)?))
    }
}

/// Engine rendering template files stored in a zip archive, as used by
/// bundled roles.
pub struct ZipEngine {
    archive: PathBuf,
    root: String,
}

impl ZipEngine {
    pub fn new(archive: impl Into<PathBuf>, root: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            root: root.into(),
        }
    }

    fn read(&self, path: &str) -> Result<String, TemplateError> {
        let entry = if self.root.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.root.trim_end_matches('/'), path)
        };
        let file = std::fs::File::open(&self.archive)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|err| TemplateError::Archive {
            path: entry.clone(),
            reason: err.to_string(),
        })?;
        let mut member = match zip.by_name(&entry) {
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(TemplateError::NotFound(entry))
            }
            Err(err) => {
                return Err(TemplateError::Archive {
                    path: entry,
                    reason: err.to_string(),
                })
            }
            Ok(member) => member,
        };
        let mut contents = String::new();
        member.read_to_string(&mut contents)?;
        Ok(contents)
    }
}

impl TemplateEngine for ZipEngine {
    fn render_string(&self, template: &str, ctx: &TemplateVars) -> Result<String, TemplateError> {
        Ok(interpolate(template, ctx))
    }

    fn render_file(&self, path: &str, ctx: &TemplateVars) -> Result<String, TemplateError> {
        Ok(interpolate(&self.read(path)?, ctx))
    }

    fn list_string_template_vars(
        &self,
        template: &str,
    ) -> Result<BTreeSet<String>, TemplateError> {
        Ok(list_vars(template))
    }

    fn list_file_template_vars(&self, path: &str) -> Result<BTreeSet<String>, TemplateError> {
        Ok(list_vars(&self.read(path)?))
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
