use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed or failed validation.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document QA pipeline.
///
/// Values are read once at startup and handed to constructors; nothing reads the environment
/// after [`Config::from_env`] returns.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for PDF documents.
    pub source_dir: PathBuf,
    /// Directory holding the persisted vector index snapshot.
    pub index_dir: PathBuf,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of one document.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Length of the source previews returned with answers.
    pub preview_chars: usize,
    /// Retrieved passages scoring at or below this similarity are discarded.
    pub min_score: f32,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Texts sent per embedding request while indexing.
    pub embedding_batch_size: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// API key for the OpenAI embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Generative backend used for answer synthesis.
    pub generation_provider: GenerationProvider,
    /// Generative model identifier.
    pub generation_model: String,
    /// Sampling temperature for answer synthesis.
    pub generation_temperature: f32,
    /// API key for Gemini.
    pub gemini_api_key: Option<String>,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Optional language the answers should be written in.
    pub answer_language: Option<String>,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout_secs: u64,
    /// Retry budget for transient embedding failures.
    pub max_retries: u32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic offline hashing embedder.
    Hash,
}

/// Supported generative backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Google Gemini REST API.
    Gemini,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        tracing::debug!(
            source_dir = %config.source_dir.display(),
            index_dir = %config.index_dir.display(),
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            top_k = config.top_k,
            embedding_provider = ?config.embedding_provider,
            generation_provider = ?config.generation_provider,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup, applying defaults and validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let generation_provider: GenerationProvider =
            parse_or(&get, "GENERATION_PROVIDER", GenerationProvider::Ollama)?;
        let default_generation_model = match generation_provider {
            GenerationProvider::Ollama => "llama3.1",
            GenerationProvider::Gemini => "gemini-2.5-flash",
        };

        let config = Self {
            source_dir: get("SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/pdfs")),
            index_dir: get("INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("vector_index")),
            chunk_size: parse_or(&get, "CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or(&get, "CHUNK_OVERLAP", 200)?,
            top_k: parse_or(&get, "TOP_K", 3)?,
            preview_chars: parse_or(&get, "PREVIEW_CHARS", 200)?,
            min_score: parse_or(&get, "MIN_SCORE", 0.0)?,
            embedding_provider: parse_or(&get, "EMBEDDING_PROVIDER", EmbeddingProvider::Ollama)?,
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "nomic-embed-text".into()),
            embedding_dimension: parse_or(&get, "EMBEDDING_DIMENSION", 768)?,
            embedding_batch_size: parse_or(&get, "EMBEDDING_BATCH_SIZE", 32)?,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| "http://127.0.0.1:11434".into()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".into()),
            generation_provider,
            generation_model: get("GENERATION_MODEL")
                .unwrap_or_else(|| default_generation_model.into()),
            generation_temperature: parse_or(&get, "GENERATION_TEMPERATURE", 0.3)?,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            answer_language: get("ANSWER_LANGUAGE"),
            request_timeout_secs: parse_or(&get, "REQUEST_TIMEOUT_SECS", 60)?,
            max_retries: parse_or(&get, "MAX_RETRIES", 2)?,
            server_port: get("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue(
                "CHUNK_OVERLAP must be smaller than CHUNK_SIZE".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidValue("TOP_K must be > 0".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue(
                "EMBEDDING_DIMENSION must be > 0".into(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "EMBEDDING_BATCH_SIZE must be > 0".into(),
            ));
        }
        if self.embedding_provider == EmbeddingProvider::OpenAI && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }
        if self.generation_provider == GenerationProvider::Gemini && self.gemini_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("GEMINI_API_KEY".into()));
        }
        Ok(())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            _ => Err(()),
        }
    }
}

impl EmbeddingProvider {
    /// Stable lowercase label used in logs and status payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Hash => "hash",
        }
    }
}

impl GenerationProvider {
    /// Stable lowercase label used in logs and status payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.preview_chars, 200);
        assert_eq!(config.source_dir, PathBuf::from("data/pdfs"));
        assert_eq!(config.embedding_provider, EmbeddingProvider::Ollama);
        assert_eq!(config.generation_model, "llama3.1");
        assert!((config.generation_temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = Config::from_lookup(lookup(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = Config::from_lookup(lookup(&[("CHUNK_SIZE", "0"), ("CHUNK_OVERLAP", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn unparsable_numbers_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("TOP_K", "three")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidValue("TOP_K".into()));
    }

    #[test]
    fn gemini_requires_api_key_and_switches_default_model() {
        let err = Config::from_lookup(lookup(&[("GENERATION_PROVIDER", "gemini")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVariable("GEMINI_API_KEY".into()));

        let config = Config::from_lookup(lookup(&[
            ("GENERATION_PROVIDER", "Gemini"),
            ("GEMINI_API_KEY", "secret"),
        ]))
        .expect("gemini config");
        assert_eq!(config.generation_model, "gemini-2.5-flash");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("INDEX_DIR", "  "), ("SERVER_PORT", "")]))
            .expect("blank values ignored");
        assert_eq!(config.index_dir, PathBuf::from("vector_index"));
        assert_eq!(config.server_port, None);
    }
}
