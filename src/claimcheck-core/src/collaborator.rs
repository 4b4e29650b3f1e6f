//! External collaborator interfaces.
//!
//! Transcription, diarization, claim extraction, categorization, and
//! sentiment scoring are done by models outside this crate. The
//! pipeline talks to them through these narrow seams so they can be
//! swapped or stubbed freely.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FactCheckError;
use crate::search::EvidenceResult;

/// One diarization interval attributing speech to a speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub start: f32,
    pub end: f32,
    pub speaker: String,
}

/// Ordered diarization output for a recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diarization {
    turns: Vec<SpeakerTurn>,
}

impl Diarization {
    pub fn new(turns: Vec<SpeakerTurn>) -> Self {
        Self { turns }
    }

    /// Speaker of the first turn covering `position` seconds, if any.
    pub fn speaker_at(&self, position: f32) -> Option<&str> {
        self.turns
            .iter()
            .find(|turn| turn.start <= position && position < turn.end)
            .map(|turn| turn.speaker.as_str())
    }

    pub fn turns(&self) -> &[SpeakerTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Parse a turns listing with one `start end speaker` line per turn.
///
/// Blank lines and lines starting with `#` are skipped. The speaker
/// name may contain spaces.
pub fn parse_turns(content: &str) -> Result<Diarization, FactCheckError> {
    let mut turns = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.splitn(3, char::is_whitespace);
        let turn = (|| {
            let start: f32 = parts.next()?.parse().ok()?;
            let end: f32 = parts.next()?.parse().ok()?;
            let speaker = parts.next()?.trim();
            if speaker.is_empty() {
                return None;
            }
            Some(SpeakerTurn {
                start,
                end,
                speaker: speaker.to_string(),
            })
        })();

        match turn {
            Some(turn) => turns.push(turn),
            None => {
                return Err(FactCheckError::ConfigError(format!(
                    "Invalid turns line {}: {}",
                    number + 1,
                    line
                )));
            }
        }
    }

    Ok(Diarization::new(turns))
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recording to plain text.
    async fn transcribe(&self, audio: &Path) -> Result<String, FactCheckError>;
}

#[async_trait]
pub trait Diarizer: Send + Sync {
    /// Attribute spans of a recording to speakers.
    async fn diarize(&self, audio: &Path) -> Result<Diarization, FactCheckError>;
}

#[async_trait]
pub trait ClaimExtractor: Send + Sync {
    /// Extract fact-checkable claims from a transcript, in order.
    async fn extract(&self, transcript: &str) -> Result<Vec<String>, FactCheckError>;
}

#[async_trait]
pub trait Categorizer: Send + Sync {
    /// Entity categories mentioned in a claim.
    async fn categorize(&self, claim: &str) -> Result<BTreeSet<String>, FactCheckError>;
}

#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Score text in [-1, 1]; positive reads as favorable.
    async fn score(&self, text: &str) -> Result<f32, FactCheckError>;
}

/// Inputs handed to the verdict model for one claim.
#[derive(Debug, Clone)]
pub struct VerdictRequest<'a> {
    pub claim: &'a str,
    pub context: &'a str,
    pub evidence: &'a [EvidenceResult],
    pub categories: &'a BTreeSet<String>,
    pub sentiment: f32,
}

#[async_trait]
pub trait VerdictProvider: Send + Sync {
    /// Raw model response for a fact-check request.
    async fn check(&self, request: &VerdictRequest<'_>) -> Result<String, FactCheckError>;
}

/// Transcriber for recordings that are already text files.
pub struct TextFileTranscriber;

#[async_trait]
impl Transcriber for TextFileTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, FactCheckError> {
        tokio::fs::read_to_string(audio).await.map_err(|e| {
            FactCheckError::CollaboratorError(format!(
                "Failed to read transcript {}: {}",
                audio.display(),
                e
            ))
        })
    }
}

/// Diarizer that serves a turns listing parsed ahead of time.
pub struct FixedDiarizer {
    diarization: Diarization,
}

impl FixedDiarizer {
    pub fn new(diarization: Diarization) -> Self {
        Self { diarization }
    }
}

#[async_trait]
impl Diarizer for FixedDiarizer {
    async fn diarize(&self, _audio: &Path) -> Result<Diarization, FactCheckError> {
        Ok(self.diarization.clone())
    }
}

/// Categorizer used when no entity model is wired in.
pub struct EmptyCategorizer;

#[async_trait]
impl Categorizer for EmptyCategorizer {
    async fn categorize(&self, _claim: &str) -> Result<BTreeSet<String>, FactCheckError> {
        Ok(BTreeSet::new())
    }
}

/// Sentiment analyzer used when no sentiment model is wired in.
pub struct NeutralSentiment;

#[async_trait]
impl SentimentAnalyzer for NeutralSentiment {
    async fn score(&self, _text: &str) -> Result<f32, FactCheckError> {
        Ok(0.0)
    }
}
