//! Asynchronous translation job engine.
//!
//! Content fields are enqueued as [`queue::Job`]s, and a periodic
//! [`processor::BatchProcessor`] run claims and executes them under a
//! TTL [`lock::BatchLock`]: resolve the source text, translate through the
//! configured [`provider::Provider`] (with chunking, caching, rate limiting
//! and jittered retries), write the value back and record a version.
//! [`engine::TranslationEngine`] wires the services together and is the
//! surface embedders call.

pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod lock;
pub mod processor;
pub mod provider;
pub mod queue;
pub mod rate_limit;
pub mod ui;
pub mod versioning;

pub use cache::{CacheStats, TranslationCache};
pub use config::EngineConfig;
pub use content::{ContentSource, Glossary, MemoryContent, NoGlossary, TermGlossary};
pub use engine::{CostEstimate, TranslationEngine};
pub use error::EngineError;
pub use lock::BatchLock;
pub use processor::{BatchProcessor, BatchSummary};
pub use provider::{Provider, ProviderError, TranslateBackend, Translator};
pub use queue::{ContentKey, Job, JobOutcome, JobQueue, JobState, ObjectType};
pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use versioning::{VersionLog, VersionRecord};
