//! Agent configuration data models (voice and email variants) and their
//! partial-update patches.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// Which kind of voice agent is being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Two-way conversational agent. Unlocks every configuration section.
    VoiceChat,
    /// Answers incoming calls.
    InboundCalls,
    /// Places outgoing calls.
    OutboundCalls,
}

impl AgentType {
    /// Whether the wizard should show every option section for this type.
    pub fn shows_all_options(&self) -> bool {
        matches!(self, Self::VoiceChat)
    }
}

impl Default for AgentType {
    fn default() -> Self {
        Self::VoiceChat
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VoiceChat => "voice_chat",
            Self::InboundCalls => "inbound_calls",
            Self::OutboundCalls => "outbound_calls",
        };
        write!(f, "{s}")
    }
}

/// Speech-to-text provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttProvider {
    Deepgram,
    Whisper,
    AssemblyAi,
    Google,
}

impl Default for SttProvider {
    fn default() -> Self {
        Self::Deepgram
    }
}

/// Text-to-speech provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    ElevenLabs,
    PlayHt,
    Azure,
    Google,
}

impl Default for TtsProvider {
    fn default() -> Self {
        Self::ElevenLabs
    }
}

/// Voice library provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProvider {
    ElevenLabs,
    PlayHt,
    Cartesia,
}

impl Default for VoiceProvider {
    fn default() -> Self {
        Self::ElevenLabs
    }
}

/// Conversational tone. A voice agent holds a set of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Friendly,
    Casual,
    Empathetic,
    Enthusiastic,
    Formal,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Casual => "casual",
            Self::Empathetic => "empathetic",
            Self::Enthusiastic => "enthusiastic",
            Self::Formal => "formal",
        };
        write!(f, "{s}")
    }
}

/// Tone of an email agent. Scalar, unlike the voice variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTone {
    Professional,
    Friendly,
    Formal,
    Casual,
}

impl Default for EmailTone {
    fn default() -> Self {
        Self::Professional
    }
}

impl std::fmt::Display for EmailTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Professional => write!(f, "professional"),
            Self::Friendly => write!(f, "friendly"),
            Self::Formal => write!(f, "formal"),
            Self::Casual => write!(f, "casual"),
        }
    }
}

/// Opaque handle to a file supplied by the upload widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            content_type: None,
        }
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

// ── Voice variant ───────────────────────────────────────────────────

/// In-progress voice agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceAgentConfig {
    pub agent_type: AgentType,
    pub model_provider: String,
    /// Always a member of the catalog entry for `model_provider`.
    pub model_version: String,
    pub stt_provider: SttProvider,
    pub tts_provider: TtsProvider,
    pub voice_provider: VoiceProvider,
    pub agent_tone: BTreeSet<Tone>,
    pub agent_function: String,
    pub prompt_details: String,
    pub knowledge_files: Option<Vec<FileHandle>>,
}

impl Default for VoiceAgentConfig {
    fn default() -> Self {
        Self {
            agent_type: AgentType::default(),
            model_provider: "openai".to_string(),
            model_version: "gpt-4o".to_string(),
            stt_provider: SttProvider::default(),
            tts_provider: TtsProvider::default(),
            voice_provider: VoiceProvider::default(),
            agent_tone: BTreeSet::new(),
            agent_function: String::new(),
            prompt_details: String::new(),
            knowledge_files: None,
        }
    }
}

impl VoiceAgentConfig {
    /// Apply a partial patch. Only fields present in the patch change.
    pub fn apply(&mut self, patch: VoiceAgentPatch) {
        if let Some(v) = patch.agent_type {
            self.agent_type = v;
        }
        if let Some(v) = patch.model_provider {
            self.model_provider = v;
        }
        if let Some(v) = patch.model_version {
            self.model_version = v;
        }
        if let Some(v) = patch.stt_provider {
            self.stt_provider = v;
        }
        if let Some(v) = patch.tts_provider {
            self.tts_provider = v;
        }
        if let Some(v) = patch.voice_provider {
            self.voice_provider = v;
        }
        if let Some(v) = patch.agent_tone {
            self.agent_tone = v;
        }
        if let Some(v) = patch.agent_function {
            self.agent_function = v;
        }
        if let Some(v) = patch.prompt_details {
            self.prompt_details = v;
        }
        if let Some(v) = patch.knowledge_files {
            self.knowledge_files = v;
        }
    }
}

/// Partial update for [`VoiceAgentConfig`].
///
/// `knowledge_files` is doubly optional: absent leaves the files untouched,
/// `null` clears them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceAgentPatch {
    pub agent_type: Option<AgentType>,
    pub model_provider: Option<String>,
    pub model_version: Option<String>,
    pub stt_provider: Option<SttProvider>,
    pub tts_provider: Option<TtsProvider>,
    pub voice_provider: Option<VoiceProvider>,
    pub agent_tone: Option<BTreeSet<Tone>>,
    pub agent_function: Option<String>,
    pub prompt_details: Option<String>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub knowledge_files: Option<Option<Vec<FileHandle>>>,
}

impl VoiceAgentPatch {
    pub fn model_provider(provider: impl Into<String>) -> Self {
        Self {
            model_provider: Some(provider.into()),
            ..Default::default()
        }
    }

    pub fn model_version(version: impl Into<String>) -> Self {
        Self {
            model_version: Some(version.into()),
            ..Default::default()
        }
    }

    pub fn agent_type(agent_type: AgentType) -> Self {
        Self {
            agent_type: Some(agent_type),
            ..Default::default()
        }
    }
}

// ── Email variant ───────────────────────────────────────────────────

/// In-progress email agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAgentConfig {
    pub company_name: String,
    pub agent_email: String,
    pub tone: EmailTone,
    pub auto_reply: bool,
    pub knowledge_files: Option<Vec<FileHandle>>,
}

impl EmailAgentConfig {
    /// Apply a partial patch. Only fields present in the patch change.
    pub fn apply(&mut self, patch: EmailAgentPatch) {
        if let Some(v) = patch.company_name {
            self.company_name = v;
        }
        if let Some(v) = patch.agent_email {
            self.agent_email = v;
        }
        if let Some(v) = patch.tone {
            self.tone = v;
        }
        if let Some(v) = patch.auto_reply {
            self.auto_reply = v;
        }
        if let Some(v) = patch.knowledge_files {
            self.knowledge_files = v;
        }
    }
}

/// Partial update for [`EmailAgentConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailAgentPatch {
    pub company_name: Option<String>,
    pub agent_email: Option<String>,
    pub tone: Option<EmailTone>,
    pub auto_reply: Option<bool>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub knowledge_files: Option<Option<Vec<FileHandle>>>,
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
