//! Tipos de erro para os provedores de tradução.
//!
//! Define [`ProviderError`] com variantes para cada classe de falha que o
//! processador precisa distinguir. Usa `thiserror` para derivar `Display`
//! e `Error` automaticamente a partir dos atributos `#[error(...)]`.
//!
//! A distinção central é permanente vs. transitório: apenas
//! [`RateLimited`](ProviderError::RateLimited),
//! [`Server`](ProviderError::Server) e
//! [`Network`](ProviderError::Network) são retentáveis dentro do provedor;
//! todas as outras variantes propagam imediatamente.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com um provedor de tradução.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// O provedor não tem chave/endpoint configurado. Aborta o lote antes
    /// de reivindicar qualquer job.
    #[error("provider is not configured")]
    MissingConfiguration,

    /// Credenciais rejeitadas (ex.: 401/403 chave inválida).
    #[error("authentication rejected (status {status})")]
    Auth { status: u16 },

    /// Requisição malformada ou recusada (4xx exceto 429).
    #[error("invalid request (status {status}): {message}")]
    InvalidRequest { status: u16, message: String },

    /// Cota/créditos esgotados. Permanente: retentar não ajuda até que a
    /// conta seja recarregada.
    #[error("translation quota exhausted")]
    QuotaExceeded,

    /// O servidor retornou HTTP 429 (rate limit). O campo `retry_after_ms`
    /// indica quantos milissegundos esperar antes de retentar.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro do lado do servidor (500/502/503/504). Transitório.
    #[error("server error (status {status})")]
    Server { status: u16 },

    /// O provedor respondeu 200 mas sem tradução utilizável.
    #[error("provider returned an empty translation")]
    EmptyResponse,

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    /// Encapsula o erro original do `reqwest` via `#[from]`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Resposta que não corresponde ao contrato da API.
    #[error("unexpected provider response: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Se retentar com backoff pode resolver esta falha.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Server { .. }
                | ProviderError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn auth_display() {
        let err = ProviderError::Auth { status: 403 };
        assert_eq!(err.to_string(), "authentication rejected (status 403)");
    }

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::RateLimited { retry_after_ms: 0 }.is_retryable());
        assert!(ProviderError::Server { status: 503 }.is_retryable());

        assert!(!ProviderError::MissingConfiguration.is_retryable());
        assert!(!ProviderError::Auth { status: 401 }.is_retryable());
        assert!(
            !ProviderError::InvalidRequest {
                status: 400,
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!ProviderError::QuotaExceeded.is_retryable());
        assert!(!ProviderError::EmptyResponse.is_retryable());
        assert!(!ProviderError::Unexpected("weird".into()).is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderError>();
    }
}
