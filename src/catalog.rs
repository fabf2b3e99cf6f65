//! Option catalog: the immutable table of selectable providers, model
//! versions, tones, and build stage labels.
//!
//! The catalog is built once and passed (behind an `Arc`) into every
//! component that needs it.

use serde::{Deserialize, Serialize};

use crate::agent::model::{FileHandle, Tone};

/// One provider and its selectable model versions, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub provider: String,
    pub versions: Vec<String>,
}

/// Declared constraints for the upload widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_size_bytes: u64,
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_size_bytes: 10 * 1024 * 1024,
            accepted_extensions: ["pdf", "doc", "docx", "txt", "csv", "md"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadLimits {
    /// Check a batch of handles against the limits. Returns a human-readable
    /// reason for the first violation.
    pub fn check(&self, files: &[FileHandle]) -> Result<(), String> {
        if files.len() > self.max_files {
            return Err(format!(
                "At most {} files can be uploaded ({} given)",
                self.max_files,
                files.len()
            ));
        }
        for file in files {
            if file.size_bytes > self.max_size_bytes {
                return Err(format!(
                    "{} exceeds the {} byte limit",
                    file.name, self.max_size_bytes
                ));
            }
            let accepted = file
                .extension()
                .is_some_and(|ext| self.accepted_extensions.iter().any(|a| *a == ext));
            if !accepted {
                return Err(format!(
                    "{} has an unsupported type (accepted: {})",
                    file.name,
                    self.accepted_extensions.join(", ")
                ));
            }
        }
        Ok(())
    }
}

/// Static provider/version/tone vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCatalog {
    providers: Vec<ProviderEntry>,
    tones: Vec<Tone>,
    stages: Vec<String>,
    upload_limits: UploadLimits,
}

impl OptionCatalog {
    /// Build a catalog from explicit provider entries. Tones, stages and
    /// upload limits start from the built-in defaults.
    pub fn new(providers: Vec<ProviderEntry>) -> Self {
        let defaults = Self::default();
        Self {
            providers,
            ..defaults
        }
    }

    /// Provider identifiers in catalog order, for a selectable list.
    pub fn provider_options(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider.as_str()).collect()
    }

    /// Versions offered for a provider. Empty for unknown providers.
    pub fn versions(&self, provider: &str) -> &[String] {
        self.providers
            .iter()
            .find(|p| p.provider == provider)
            .map(|p| p.versions.as_slice())
            .unwrap_or(&[])
    }

    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn upload_limits(&self) -> &UploadLimits {
        &self.upload_limits
    }
}

impl Default for OptionCatalog {
    fn default() -> Self {
        let entry = |provider: &str, versions: &[&str]| ProviderEntry {
            provider: provider.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
        };
        Self {
            providers: vec![
                entry("openai", &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"]),
                entry(
                    "anthropic",
                    &["claude-3-5-sonnet", "claude-3-opus", "claude-3-haiku"],
                ),
                entry("google", &["gemini-1.5-pro", "gemini-1.5-flash"]),
                entry("groq", &["llama-3.1-70b", "mixtral-8x7b"]),
            ],
            tones: vec![
                Tone::Professional,
                Tone::Friendly,
                Tone::Casual,
                Tone::Empathetic,
                Tone::Enthusiastic,
                Tone::Formal,
            ],
            stages: [
                "Initializing agent...",
                "Configuring voice pipeline...",
                "Loading knowledge base...",
                "Optimizing responses...",
                "Finalizing deployment...",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            upload_limits: UploadLimits::default(),
        }
    }
}
