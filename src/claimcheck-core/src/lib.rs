//! ClaimCheck Core Library
//!
//! Provides the claim-checking pipeline: cached web evidence search,
//! topical context over earlier statements, and per-claim verdict
//! orchestration.

pub mod cache;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod rate_limit;
pub mod search;
pub mod topic;
pub mod verdict;

pub use cache::EvidenceCache;
pub use collaborator::{
    Categorizer, ClaimExtractor, Diarization, Diarizer, EmptyCategorizer, FixedDiarizer,
    NeutralSentiment, SentimentAnalyzer, SpeakerTurn, TextFileTranscriber, Transcriber,
    VerdictProvider, VerdictRequest, parse_turns,
};
pub use config::{Config, default_config};
pub use error::FactCheckError;
pub use llm::{LlmClaimExtractor, LlmVerdictProvider, chat_client};
pub use orchestrator::{
    CancelHandle, ClaimCallback, ClaimEvent, ClaimOrchestrator, ClaimOutcome, ClaimResult,
    Collaborators, RunState, verification_counts,
};
pub use rate_limit::RateLimiter;
pub use search::{
    EvidenceResult, FetchedPage, HttpTransport, SearchTransport, WebSearcher, default_client,
};
pub use topic::{Statement, TopicIndex};
pub use verdict::{
    Confidence, VerdictRecord, Verification, format_evidence, parse_verdict,
    sentiment_to_percentage,
};
