//! Configuração do motor carregada a partir de `traduza.toml`.
//!
//! A struct [`EngineConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `DEEPL_API_KEY` e `LIBRE_API_KEY` têm
//! precedência sobre o arquivo.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use crate::error::EngineError;

/// Configuração de nível superior carregada de `traduza.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Provedor ativo: "deepl", "libretranslate" ou "echo".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Chave da API DeepL.
    #[serde(default)]
    pub deepl_api_key: String,

    /// URL base da API DeepL (sobrescrita em testes).
    #[serde(default = "default_deepl_base_url")]
    pub deepl_base_url: String,

    /// Custo DeepL por 1000 caracteres, na moeda de cobrança. Zero desativa estimativas.
    #[serde(default)]
    pub deepl_cost_per_1000: f64,

    /// Chave da API LibreTranslate (opcional em instâncias próprias).
    #[serde(default)]
    pub libre_api_key: String,

    /// URL base da instância LibreTranslate.
    #[serde(default = "default_libre_base_url")]
    pub libre_base_url: String,

    /// Custo LibreTranslate por 1000 caracteres.
    #[serde(default)]
    pub libre_cost_per_1000: f64,

    /// Língua de origem do conteúdo.
    #[serde(default = "default_source_lang")]
    pub source_lang: String,

    /// Língua de destino das traduções.
    #[serde(default = "default_target_lang")]
    pub target_lang: String,

    /// Contexto de conteúdo passado aos provedores (ex.: "marketing").
    #[serde(default)]
    pub domain: Option<String>,

    /// Número de jobs reivindicados por lote quando a CLI não especifica.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Limite de caracteres por requisição; textos maiores são fatiados.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Máximo de tentativas por fatia antes de marcar o job como erro.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Teto do atraso de backoff em milissegundos.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Máximo de requisições por provedor dentro da janela de 60s.
    #[serde(default = "default_rate_limit_per_window")]
    pub rate_limit_per_window: u32,

    /// Tempo de vida do lock de lote em segundos; locks mais velhos são recuperados.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Orçamento de tempo de um lote em segundos; jobs restantes são devolvidos à fila.
    #[serde(default = "default_batch_time_budget_secs")]
    pub batch_time_budget_secs: u64,

    /// Tempo de vida padrão das entradas de cache em segundos (24h).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Capacidade da camada LRU do cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Caminho do arquivo de persistência da fila. `None` mantém em memória.
    #[serde(default)]
    pub queue_path: Option<String>,

    /// Caminho do arquivo da camada persistente do cache. `None` mantém em memória.
    #[serde(default)]
    pub cache_path: Option<String>,
}

fn default_provider() -> String {
    "deepl".to_string()
}

fn default_deepl_base_url() -> String {
    "https://api.deepl.com/v2".to_string()
}

fn default_libre_base_url() -> String {
    "https://libretranslate.com".to_string()
}

fn default_source_lang() -> String {
    "en".to_string()
}

fn default_target_lang() -> String {
    "pt".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_max_chunk_chars() -> usize {
    4000
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_rate_limit_per_window() -> u32 {
    60
}

fn default_lock_ttl_secs() -> u64 {
    300
}

fn default_batch_time_budget_secs() -> u64 {
    240
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_cache_capacity() -> usize {
    2048
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            deepl_api_key: String::new(),
            deepl_base_url: default_deepl_base_url(),
            deepl_cost_per_1000: 0.0,
            libre_api_key: String::new(),
            libre_base_url: default_libre_base_url(),
            libre_cost_per_1000: 0.0,
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            domain: None,
            batch_size: default_batch_size(),
            max_chunk_chars: default_max_chunk_chars(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            rate_limit_per_window: default_rate_limit_per_window(),
            lock_ttl_secs: default_lock_ttl_secs(),
            batch_time_budget_secs: default_batch_time_budget_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            queue_path: None,
            cache_path: None,
        }
    }
}

impl EngineConfig {
    /// Carrega a configuração do caminho dado, ou de `traduza.toml` no
    /// diretório atual. Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new("traduza.toml"));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<EngineConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variáveis de ambiente têm precedência sobre o arquivo para as chaves API.
        if let Ok(key) = std::env::var("DEEPL_API_KEY")
            && !key.is_empty()
        {
            config.deepl_api_key = key;
        }
        if let Ok(key) = std::env::var("LIBRE_API_KEY")
            && !key.is_empty()
        {
            config.libre_api_key = key;
        }

        Ok(config)
    }

    /// Valida os campos numéricos e o nome do provedor.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch_size == 0 {
            return Err(EngineError::Config("batch_size must be at least 1".into()));
        }
        if self.max_chunk_chars == 0 {
            return Err(EngineError::Config(
                "max_chunk_chars must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(EngineError::Config("max_attempts must be at least 1".into()));
        }
        if self.source_lang == self.target_lang {
            return Err(EngineError::Config(
                "source_lang and target_lang must differ".into(),
            ));
        }
        match self.provider.as_str() {
            "deepl" | "libretranslate" | "echo" => Ok(()),
            other => Err(EngineError::Config(format!(
                "unknown provider \"{other}\""
            ))),
        }
    }
}
