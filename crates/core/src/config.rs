//! Configuration management for QnA Assist.
//!
//! Configuration is assembled from several sources, later ones winning:
//! - Built-in defaults
//! - Config file (`.qna/config.yaml` in the workspace, or `QNA_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Relative paths in the config file are resolved against the workspace root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default login used when no moderator credentials are configured.
pub const DEFAULT_MODERATOR_LOGIN: &str = "moderator";

/// Default password used when no moderator credentials are configured.
pub const DEFAULT_MODERATOR_PASSWORD: &str = "password123";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .qna/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub indexes: IndexPaths,
    pub retrieval: RetrievalSettings,
    pub classifier: ClassifierSettings,
    pub server: ServerSettings,
    pub bot: BotSettings,
    pub transcription: TranscriptionSettings,
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Provider identifier ("ollama")
    pub provider: String,

    /// Base URL of the provider API
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// Upper bound on generated tokens
    pub max_new_tokens: u32,

    /// Chat formatting convention of the model ("llama3", "chatml")
    pub chat_template: String,

    /// Optional HF-style `generation_config.json` with decoding parameters
    pub generation_config: Option<PathBuf>,

    /// Decoding defaults used when no generation config file is given
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub repetition_penalty: Option<f32>,
    pub seed: Option<u64>,

    /// HTTP timeout for the provider client; generation itself is unbounded
    /// when unset
    pub timeout_secs: Option<u64>,

    /// Capacity of the generation job queue
    pub queue_capacity: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "saiga-llama3:8b".to_string(),
            max_new_tokens: 4096,
            chat_template: "llama3".to_string(),
            generation_config: None,
            temperature: Some(0.2),
            top_p: Some(0.9),
            top_k: Some(30),
            repetition_penalty: Some(1.12),
            seed: Some(69),
            timeout_secs: None,
            queue_capacity: 32,
        }
    }
}

/// Embedding encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider identifier ("ollama", "mock")
    pub provider: String,

    /// Base URL of the provider API
    pub endpoint: String,

    /// Encoder model identifier
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            dimensions: 1024,
        }
    }
}

/// Locations of the three persisted vector indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexPaths {
    pub main: PathBuf,
    pub user: PathBuf,
    pub conditions: PathBuf,
}

impl Default for IndexPaths {
    fn default() -> Self {
        Self {
            main: PathBuf::from(".qna/indexes/main.json"),
            user: PathBuf::from(".qna/indexes/user.json"),
            conditions: PathBuf::from(".qna/indexes/conditions.json"),
        }
    }
}

/// Retrieval caps and metadata field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Main knowledge base documents placed in the prompt
    pub main_k: usize,

    /// User agreement documents placed in the prompt
    pub user_k: usize,

    /// Placement conditions documents placed in the prompt
    pub conditions_k: usize,

    /// Main knowledge base documents used to enrich classification input
    pub classification_k: usize,

    /// Canonical answer field of main knowledge base documents
    pub answer_field: String,

    /// Summarized passage field of user agreement / conditions documents
    pub summary_field: String,

    /// Reference question field of main knowledge base documents
    pub question_field: String,

    /// Topic field of main knowledge base documents
    pub topic_field: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            main_k: 3,
            user_k: 1,
            conditions_k: 1,
            classification_k: 5,
            answer_field: "Ответ из БЗ".to_string(),
            summary_field: "sum_text".to_string(),
            question_field: "Вопрос из БЗ".to_string(),
            topic_field: "Тема".to_string(),
        }
    }
}

/// Classification heads and their label source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    /// Training CSV the label sets are derived from
    pub labels_csv: PathBuf,

    /// Column holding first-dimension labels
    pub column_1: String,

    /// Column holding second-dimension labels
    pub column_2: String,

    /// Linear head weights for the first dimension
    pub head_1: PathBuf,

    /// Linear head weights for the second dimension
    pub head_2: PathBuf,

    /// Classify the question enriched with retrieved topic and reference
    /// questions instead of the bare question
    pub use_retrieval_context: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            labels_csv: PathBuf::from("data/train_normal.csv"),
            column_1: "class_1".to_string(),
            column_2: "class_2".to_string(),
            head_1: PathBuf::from(".qna/models/class_1.json"),
            head_2: PathBuf::from(".qna/models/class_2.json"),
            use_retrieval_context: false,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Chat-bot front end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSettings {
    /// Environment variable holding the bot token
    pub token_env: String,

    /// Base URL of the Bot API
    pub api_url: String,

    /// Long-polling timeout in seconds
    pub poll_timeout_secs: u64,

    /// Directory voice messages are downloaded to
    pub voice_dir: PathBuf,

    /// Environment variable holding the moderator login
    pub moderator_login_env: String,

    /// Environment variable holding the moderator password
    pub moderator_password_env: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            token_env: "QNA_BOT_TOKEN".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            voice_dir: PathBuf::from("voices"),
            moderator_login_env: "QNA_MODERATOR_LOGIN".to_string(),
            moderator_password_env: "QNA_MODERATOR_PASSWORD".to_string(),
        }
    }
}

/// Speech-to-text service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    /// Base URL of an OpenAI-compatible transcription API; voice messages
    /// are rejected when unset
    pub endpoint: Option<String>,

    /// Transcription model identifier
    pub model: String,

    /// Spoken language hint
    pub language: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "medium".to_string(),
            language: "ru".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    indexes: Option<IndexPaths>,
    retrieval: Option<RetrievalSettings>,
    classifier: Option<ClassifierSettings>,
    server: Option<ServerSettings>,
    bot: Option<BotSettings>,
    transcription: Option<TranscriptionSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            indexes: IndexPaths::default(),
            retrieval: RetrievalSettings::default(),
            classifier: ClassifierSettings::default(),
            server: ServerSettings::default(),
            bot: BotSettings::default(),
            transcription: TranscriptionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and the environment.
    ///
    /// Environment variables:
    /// - `QNA_WORKSPACE`: Override workspace path
    /// - `QNA_CONFIG`: Path to config file
    /// - `QNA_LLM_ENDPOINT`, `QNA_LLM_MODEL`: Generation backend
    /// - `QNA_EMBEDDING_ENDPOINT`: Embedding backend
    /// - `QNA_BIND`: HTTP bind address
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("QNA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("QNA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        config.load_file()?;
        config.apply_env();

        Ok(config)
    }

    /// Merge the config file (explicit or `.qna/config.yaml`) if present.
    fn load_file(&mut self) -> AppResult<()> {
        if !self.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                self.workspace
            )));
        }

        let config_path = match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.qna_dir().join("config.yaml"),
        };

        if config_path.exists() {
            *self = self.merge_yaml(&config_path)?;
        } else if self.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("QNA_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }

        if let Ok(model) = std::env::var("QNA_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(endpoint) = std::env::var("QNA_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }

        if let Ok(bind) = std::env::var("QNA_BIND") {
            self.server.bind = bind;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(indexes) = config_file.indexes {
            result.indexes = indexes;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(classifier) = config_file.classifier {
            result.classifier = classifier;
        }
        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(bot) = config_file.bot {
            result.bot = bot;
        }
        if let Some(transcription) = config_file.transcription {
            result.transcription = transcription;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file. A new config file path triggers a reload.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> AppResult<Self> {
        let reload = workspace.is_some() || config_file.is_some();

        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if reload {
            self.load_file()?;
            self.apply_env();
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        Ok(self)
    }

    /// Get the path to the .qna directory.
    pub fn qna_dir(&self) -> PathBuf {
        self.workspace.join(".qna")
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Resolve the bot token from its environment variable.
    pub fn bot_token(&self) -> AppResult<String> {
        std::env::var(&self.bot.token_env).map_err(|_| {
            AppError::Config(format!(
                "Bot token not found in environment variable: {}",
                self.bot.token_env
            ))
        })
    }

    /// Resolve moderator credentials from the environment.
    ///
    /// Falls back to the built-in shared pair, which is logged loudly: the
    /// pair is not scoped to any moderator identity.
    pub fn moderator_credentials(&self) -> (String, String) {
        let login = std::env::var(&self.bot.moderator_login_env).ok();
        let password = std::env::var(&self.bot.moderator_password_env).ok();

        if login.is_none() || password.is_none() {
            tracing::warn!(
                "Moderator credentials not set ({} / {}); using built-in defaults",
                self.bot.moderator_login_env,
                self.bot.moderator_password_env
            );
        }

        (
            login.unwrap_or_else(|| DEFAULT_MODERATOR_LOGIN.to_string()),
            password.unwrap_or_else(|| DEFAULT_MODERATOR_PASSWORD.to_string()),
        )
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let known_llm = ["ollama"];
        if !known_llm.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                self.llm.provider,
                known_llm.join(", ")
            )));
        }

        let known_templates = ["llama3", "chatml"];
        if !known_templates.contains(&self.llm.chat_template.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown chat template: {}. Supported: {}",
                self.llm.chat_template,
                known_templates.join(", ")
            )));
        }

        if self.llm.max_new_tokens == 0 {
            return Err(AppError::Config("llm.maxNewTokens must be > 0".to_string()));
        }

        if self.llm.queue_capacity == 0 {
            return Err(AppError::Config("llm.queueCapacity must be > 0".to_string()));
        }

        let known_embedding = ["ollama", "mock"];
        if !known_embedding.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedding.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be > 0".to_string(),
            ));
        }

        let r = &self.retrieval;
        if r.main_k == 0 || r.user_k == 0 || r.conditions_k == 0 || r.classification_k == 0 {
            return Err(AppError::Config(
                "retrieval caps (mainK, userK, conditionsK, classificationK) must be >= 1"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
