//! Claim pipeline orchestration.
//!
//! Sequences transcription, claim extraction, evidence search, context
//! scoring, and verdict assembly, isolating failures per claim.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::collaborator::{
    Categorizer, ClaimExtractor, Diarization, Diarizer, SentimentAnalyzer, Transcriber,
    VerdictProvider, VerdictRequest,
};
use crate::config::Config;
use crate::error::FactCheckError;
use crate::search::WebSearcher;
use crate::topic::TopicIndex;
use crate::verdict::{VerdictRecord, Verification, parse_verdict};

/// Progress of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Transcribed,
    ClaimsExtracted,
    /// Checking the claim at this index.
    Processing(usize),
    Done,
}

/// A fact-checked claim with its verdict and attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResult {
    /// Position of the claim in extraction order.
    pub index: usize,
    /// The claim text.
    pub claim: String,
    /// Speaker the claim is attributed to.
    pub speaker: String,
    /// Parsed verdict from the fact-checking model.
    pub verdict: VerdictRecord,
    /// Locally derived entity categories.
    pub categories: BTreeSet<String>,
    /// Locally derived sentiment in [-1, 1].
    pub sentiment: f32,
}

/// Outcome for one claim: a verdict, or the error that stopped it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClaimOutcome {
    Checked(ClaimResult),
    Failed {
        index: usize,
        claim: String,
        error: String,
    },
}

impl ClaimOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Checked(result) => result.index,
            Self::Failed { index, .. } => *index,
        }
    }

    pub fn claim(&self) -> &str {
        match self {
            Self::Checked(result) => &result.claim,
            Self::Failed { claim, .. } => claim,
        }
    }

    pub fn as_checked(&self) -> Option<&ClaimResult> {
        match self {
            Self::Checked(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

/// Callback for pipeline events.
pub type ClaimCallback = Box<dyn Fn(ClaimEvent) + Send + Sync>;

/// Events emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum ClaimEvent {
    /// Claim processing is starting.
    RunStarted { claims: usize },
    /// A claim is about to be checked.
    ClaimStarted {
        index: usize,
        total: usize,
        claim: String,
    },
    /// A claim was checked.
    ClaimChecked {
        index: usize,
        speaker: String,
        verification: Verification,
    },
    /// A claim could not be checked.
    ClaimFailed { index: usize, error: String },
    /// The run has concluded.
    RunFinished { processed: usize },
}

/// Cooperative stop flag; raising it ends the run once the claim in
/// progress has finished. Each run starts with the flag cleared.
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// External collaborators wired into the pipeline.
pub struct Collaborators {
    pub transcriber: Box<dyn Transcriber>,
    pub diarizer: Box<dyn Diarizer>,
    pub extractor: Box<dyn ClaimExtractor>,
    pub categorizer: Box<dyn Categorizer>,
    pub sentiment: Box<dyn SentimentAnalyzer>,
    pub verdicts: Box<dyn VerdictProvider>,
}

/// Orchestrates fact-checking for the claims in a recording.
pub struct ClaimOrchestrator {
    config: Config,
    searcher: WebSearcher,
    topics: TopicIndex,
    collaborators: Collaborators,
    /// Outcomes of the current run.
    outcomes: Vec<ClaimOutcome>,
    /// Event callback.
    callback: Option<ClaimCallback>,
    cancel: CancelHandle,
    state: RunState,
}

impl ClaimOrchestrator {
    /// Create a new orchestrator with the given configuration.
    pub fn new(config: Config, searcher: WebSearcher, collaborators: Collaborators) -> Self {
        let topics = TopicIndex::new(
            config.context.max_context_size,
            config.context.topic_threshold,
        );

        Self {
            config,
            searcher,
            topics,
            collaborators,
            outcomes: Vec::new(),
            callback: None,
            cancel: CancelHandle::default(),
            state: RunState::Idle,
        }
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: ClaimCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Handle for stopping the run between claims.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the full pipeline on a recording.
    ///
    /// Stage failures degrade rather than abort: a failed transcription
    /// behaves like an empty recording, failed diarization leaves every
    /// speaker unknown.
    pub async fn run(&mut self, audio: &Path) -> Vec<ClaimOutcome> {
        let transcript = match self.collaborators.transcriber.transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                error!("Error transcribing audio: {}", e);
                String::new()
            }
        };
        self.state = RunState::Transcribed;

        let diarization = match self.collaborators.diarizer.diarize(audio).await {
            Ok(diarization) => diarization,
            Err(e) => {
                error!("Error during diarization: {}", e);
                Diarization::default()
            }
        };

        let claims = if transcript.is_empty() {
            Vec::new()
        } else {
            match self.collaborators.extractor.extract(&transcript).await {
                Ok(claims) => claims,
                Err(e) => {
                    error!("Error extracting claims: {}", e);
                    Vec::new()
                }
            }
        };
        self.state = RunState::ClaimsExtracted;

        self.process_claims(claims, &diarization).await
    }

    /// Check each claim in order. A claim that fails is reported as
    /// [`ClaimOutcome::Failed`] and the run moves on to the next one.
    pub async fn process_claims(
        &mut self,
        claims: Vec<String>,
        diarization: &Diarization,
    ) -> Vec<ClaimOutcome> {
        self.outcomes.clear();
        self.cancel.reset();
        let total = claims.len();
        self.emit_event(ClaimEvent::RunStarted { claims: total });

        for (index, claim) in claims.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Run cancelled after {} of {} claims", index, total);
                break;
            }

            self.state = RunState::Processing(index);
            self.emit_event(ClaimEvent::ClaimStarted {
                index,
                total,
                claim: claim.clone(),
            });

            match self.check_claim(index, &claim, diarization).await {
                Ok(result) => {
                    self.emit_event(ClaimEvent::ClaimChecked {
                        index,
                        speaker: result.speaker.clone(),
                        verification: result.verdict.verification,
                    });
                    // Checked claims become context for the ones after.
                    self.topics.add_statement(&result.claim, &result.speaker);
                    self.outcomes.push(ClaimOutcome::Checked(result));
                }
                Err(e) => {
                    error!("Error processing claim {}: {}", index + 1, e);
                    self.emit_event(ClaimEvent::ClaimFailed {
                        index,
                        error: e.to_string(),
                    });
                    self.outcomes.push(ClaimOutcome::Failed {
                        index,
                        claim,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.state = RunState::Done;
        self.emit_event(ClaimEvent::RunFinished {
            processed: self.outcomes.len(),
        });
        self.outcomes.clone()
    }

    /// Assemble the verdict record for one claim.
    async fn check_claim(
        &self,
        index: usize,
        claim: &str,
        diarization: &Diarization,
    ) -> Result<ClaimResult, FactCheckError> {
        // Coarse attribution: claims are assumed evenly spaced through
        // the recording.
        let position = index as f32 * self.config.pipeline.seconds_per_claim;
        let speaker = diarization
            .speaker_at(position)
            .unwrap_or("Unknown")
            .to_string();

        let evidence = self.searcher.search(claim).await;
        let context = self.topics.get_relevant_context(claim);

        let categories = self.collaborators.categorizer.categorize(claim).await?;
        let sentiment = match self.collaborators.sentiment.score(claim).await {
            Ok(score) => score.clamp(-1.0, 1.0),
            Err(e) => {
                warn!("Sentiment scoring failed, assuming neutral: {}", e);
                0.0
            }
        };

        let request = VerdictRequest {
            claim,
            context: &context,
            evidence: &evidence,
            categories: &categories,
            sentiment,
        };
        let verdict = match self.collaborators.verdicts.check(&request).await {
            Ok(raw) => parse_verdict(&raw),
            Err(e) => {
                error!("Error during fact-checking: {}", e);
                VerdictRecord::error(format!("Error during fact-checking: {}", e))
            }
        };

        Ok(ClaimResult {
            index,
            claim: claim.to_string(),
            speaker,
            verdict,
            categories,
            sentiment,
        })
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: ClaimEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    /// Outcomes of the latest run.
    pub fn outcomes(&self) -> &[ClaimOutcome] {
        &self.outcomes
    }

    /// Context index accumulated over checked claims.
    pub fn topics(&self) -> &TopicIndex {
        &self.topics
    }

    pub fn state(&self) -> RunState {
        self.state
    }
}

/// Count verified, partially verified, and not verified outcomes.
pub fn verification_counts(outcomes: &[ClaimOutcome]) -> (usize, usize, usize) {
    let mut verified = 0;
    let mut partially = 0;
    let mut not_verified = 0;

    for outcome in outcomes {
        if let ClaimOutcome::Checked(result) = outcome {
            match result.verdict.verification {
                Verification::Verified => verified += 1,
                Verification::PartiallyVerified => partially += 1,
                Verification::NotVerified => not_verified += 1,
                Verification::Error => {}
            }
        }
    }

    (verified, partially, not_verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::SpeakerTurn;
    use crate::config::default_config;
    use crate::search::{FetchedPage, SearchTransport};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct PageTransport;

    #[async_trait]
    impl SearchTransport for PageTransport {
        async fn fetch_page(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> Result<FetchedPage, FactCheckError> {
            Ok(FetchedPage {
                status: 200,
                body: "<html></html>".to_string(),
            })
        }
    }

    struct StubTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _audio: &Path) -> Result<String, FactCheckError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        async fn transcribe(&self, _audio: &Path) -> Result<String, FactCheckError> {
            Err(FactCheckError::CollaboratorError(
                "speech model offline".to_string(),
            ))
        }
    }

    struct StubDiarizer(Vec<SpeakerTurn>);

    #[async_trait]
    impl Diarizer for StubDiarizer {
        async fn diarize(&self, _audio: &Path) -> Result<Diarization, FactCheckError> {
            Ok(Diarization::new(self.0.clone()))
        }
    }

    struct StubExtractor(Vec<&'static str>);

    #[async_trait]
    impl ClaimExtractor for StubExtractor {
        async fn extract(&self, _transcript: &str) -> Result<Vec<String>, FactCheckError> {
            Ok(self.0.iter().map(|claim| claim.to_string()).collect())
        }
    }

    struct StubCategorizer {
        fail_marker: Option<&'static str>,
    }

    #[async_trait]
    impl Categorizer for StubCategorizer {
        async fn categorize(&self, claim: &str) -> Result<BTreeSet<String>, FactCheckError> {
            if let Some(marker) = self.fail_marker {
                if claim.contains(marker) {
                    return Err(FactCheckError::CollaboratorError(
                        "category model offline".to_string(),
                    ));
                }
            }
            Ok(["economy".to_string()].into())
        }
    }

    struct StubSentiment(f32);

    #[async_trait]
    impl SentimentAnalyzer for StubSentiment {
        async fn score(&self, _text: &str) -> Result<f32, FactCheckError> {
            Ok(self.0)
        }
    }

    struct FailingVerdicts;

    #[async_trait]
    impl VerdictProvider for FailingVerdicts {
        async fn check(&self, _request: &VerdictRequest<'_>) -> Result<String, FactCheckError> {
            Err(FactCheckError::CollaboratorError(
                "verdict model offline".to_string(),
            ))
        }
    }

    /// Verdict provider that records the claim and context it saw.
    struct RecordingVerdicts {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl RecordingVerdicts {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VerdictProvider for RecordingVerdicts {
        async fn check(&self, request: &VerdictRequest<'_>) -> Result<String, FactCheckError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.claim.to_string(), request.context.to_string()));
            Ok(r#"{"Verification": "VERIFIED", "Confidence": "HIGH"}"#.to_string())
        }
    }

    fn turns() -> Vec<SpeakerTurn> {
        vec![
            SpeakerTurn {
                start: 0.0,
                end: 15.0,
                speaker: "Alice".to_string(),
            },
            SpeakerTurn {
                start: 15.0,
                end: 40.0,
                speaker: "Bob".to_string(),
            },
        ]
    }

    fn searcher() -> WebSearcher {
        WebSearcher::new(Arc::new(PageTransport), &default_config().search)
    }

    fn collaborators(
        claims: Vec<&'static str>,
        verdicts: Box<dyn VerdictProvider>,
    ) -> Collaborators {
        Collaborators {
            transcriber: Box::new(StubTranscriber("full transcript")),
            diarizer: Box::new(StubDiarizer(turns())),
            extractor: Box::new(StubExtractor(claims)),
            categorizer: Box::new(StubCategorizer { fail_marker: None }),
            sentiment: Box::new(StubSentiment(0.5)),
            verdicts,
        }
    }

    #[tokio::test]
    async fn test_run_checks_all_claims_in_order() {
        let claims = vec!["claim one", "claim two", "claim three"];
        let mut orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(claims, Box::new(RecordingVerdicts::new())),
        );

        let outcomes = orchestrator.run(Path::new("debate.wav")).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(orchestrator.state(), RunState::Done);
        for (index, outcome) in outcomes.iter().enumerate() {
            let result = outcome.as_checked().expect("claim should be checked");
            assert_eq!(result.index, index);
            assert_eq!(result.verdict.verification, Verification::Verified);
            assert!(result.categories.contains("economy"));
            assert!((result.sentiment - 0.5).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_speakers_follow_claim_spacing() {
        let claims = vec!["one", "two", "three", "four", "five"];
        let mut orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(claims, Box::new(RecordingVerdicts::new())),
        );

        let outcomes = orchestrator.run(Path::new("debate.wav")).await;

        // 10 seconds per claim: 0s, 10s -> Alice; 20s, 30s -> Bob; 40s
        // falls outside every turn.
        let speakers: Vec<&str> = outcomes
            .iter()
            .map(|outcome| outcome.as_checked().unwrap().speaker.as_str())
            .collect();
        assert_eq!(speakers, vec!["Alice", "Alice", "Bob", "Bob", "Unknown"]);
    }

    #[tokio::test]
    async fn test_failed_claim_does_not_stop_the_run() {
        let mut collaborators = collaborators(
            vec!["claim one", "claim two", "claim three"],
            Box::new(RecordingVerdicts::new()),
        );
        collaborators.categorizer = Box::new(StubCategorizer {
            fail_marker: Some("two"),
        });

        let mut orchestrator =
            ClaimOrchestrator::new(default_config(), searcher(), collaborators);
        let outcomes = orchestrator.run(Path::new("debate.wav")).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].as_checked().is_some());
        assert!(outcomes[2].as_checked().is_some());
        assert_eq!(outcomes[0].index(), 0);
        assert_eq!(outcomes[0].claim(), "claim one");
        assert_eq!(outcomes[1].index(), 1);
        assert_eq!(outcomes[1].claim(), "claim two");
        match &outcomes[1] {
            ClaimOutcome::Failed { error, .. } => {
                assert!(error.contains("category model offline"));
            }
            ClaimOutcome::Checked(_) => panic!("claim two should have failed"),
        }
    }

    #[tokio::test]
    async fn test_verdict_failure_is_absorbed_into_record() {
        let mut orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(vec!["claim one"], Box::new(FailingVerdicts)),
        );

        let outcomes = orchestrator.run(Path::new("debate.wav")).await;

        let result = outcomes[0].as_checked().expect("claim should be checked");
        assert_eq!(result.verdict.verification, Verification::Error);
        assert!(result.verdict.explanation.contains("verdict model offline"));
    }

    #[tokio::test]
    async fn test_transcription_failure_behaves_like_empty_recording() {
        let mut collaborators =
            collaborators(vec!["never extracted"], Box::new(RecordingVerdicts::new()));
        collaborators.transcriber = Box::new(FailingTranscriber);

        let mut orchestrator =
            ClaimOrchestrator::new(default_config(), searcher(), collaborators);
        let outcomes = orchestrator.run(Path::new("debate.wav")).await;

        assert!(outcomes.is_empty());
        assert_eq!(orchestrator.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_checked_claims_become_context_for_later_ones() {
        let text = "The moon landing happened in 1969";
        let verdicts = Arc::new(RecordingVerdicts::new());

        struct SharedVerdicts(Arc<RecordingVerdicts>);

        #[async_trait]
        impl VerdictProvider for SharedVerdicts {
            async fn check(
                &self,
                request: &VerdictRequest<'_>,
            ) -> Result<String, FactCheckError> {
                self.0.check(request).await
            }
        }

        let mut orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(vec![text, text], Box::new(SharedVerdicts(verdicts.clone()))),
        );
        orchestrator.run(Path::new("debate.wav")).await;

        let seen = verdicts.seen.lock().unwrap();
        assert_eq!(seen[0].1, "");
        assert_eq!(seen[1].1, text);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let mut orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(vec!["one", "two"], Box::new(RecordingVerdicts::new())),
        )
        .with_callback(Box::new(move |event| {
            let label = match event {
                ClaimEvent::RunStarted { claims } => format!("start:{}", claims),
                ClaimEvent::ClaimStarted { index, .. } => format!("claim:{}", index),
                ClaimEvent::ClaimChecked { index, .. } => format!("checked:{}", index),
                ClaimEvent::ClaimFailed { index, .. } => format!("failed:{}", index),
                ClaimEvent::RunFinished { processed } => format!("finish:{}", processed),
            };
            sink.lock().unwrap().push(label);
        }));

        orchestrator.run(Path::new("debate.wav")).await;

        let seen = events.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                "start:2",
                "claim:0",
                "checked:0",
                "claim:1",
                "checked:1",
                "finish:2",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_claims() {
        let orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(
                vec!["one", "two", "three"],
                Box::new(RecordingVerdicts::new()),
            ),
        );

        let handle = orchestrator.cancel_handle();
        let mut orchestrator = orchestrator.with_callback(Box::new(move |event| {
            if matches!(event, ClaimEvent::ClaimStarted { index: 0, .. }) {
                handle.cancel();
            }
        }));

        let outcomes = orchestrator.run(Path::new("debate.wav")).await;

        // The claim in progress finishes; the rest are abandoned.
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].as_checked().is_some());
        assert_eq!(orchestrator.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_second_run_starts_fresh_after_cancellation() {
        let orchestrator = ClaimOrchestrator::new(
            default_config(),
            searcher(),
            collaborators(
                vec!["one", "two", "three"],
                Box::new(RecordingVerdicts::new()),
            ),
        );

        let handle = orchestrator.cancel_handle();
        let cancel_once = AtomicBool::new(true);
        let mut orchestrator = orchestrator.with_callback(Box::new(move |event| {
            if matches!(event, ClaimEvent::ClaimStarted { index: 0, .. })
                && cancel_once.swap(false, Ordering::Relaxed)
            {
                handle.cancel();
            }
        }));

        let first = orchestrator.run(Path::new("debate.wav")).await;
        assert_eq!(first.len(), 1);

        let second = orchestrator.run(Path::new("debate.wav")).await;
        assert_eq!(second.len(), 3);
    }

    #[tokio::test]
    async fn test_verification_counts_ignore_failures_and_errors() {
        let make = |verification: Verification| {
            ClaimOutcome::Checked(ClaimResult {
                index: 0,
                claim: "c".to_string(),
                speaker: "s".to_string(),
                verdict: VerdictRecord {
                    verification,
                    ..VerdictRecord::error("x")
                },
                categories: BTreeSet::new(),
                sentiment: 0.0,
            })
        };

        let outcomes = vec![
            make(Verification::Verified),
            make(Verification::Verified),
            make(Verification::PartiallyVerified),
            make(Verification::NotVerified),
            make(Verification::Error),
            ClaimOutcome::Failed {
                index: 5,
                claim: "c".to_string(),
                error: "e".to_string(),
            },
        ];

        assert_eq!(verification_counts(&outcomes), (2, 1, 1));
    }
}
