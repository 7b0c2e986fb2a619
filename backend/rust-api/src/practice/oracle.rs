use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Failures from the pronunciation oracle. Transport problems are
/// retryable: the practice session stays where it is and the learner can
/// try the same utterance again.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::Transport(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordScore {
    pub word: String,
    pub score: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeScore {
    pub phoneme: String,
    pub score: i32,
}

/// Confidence verdict for one utterance against its reference text.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationScore {
    /// Overall confidence, 0-100.
    pub pronunciation: i32,
    #[serde(default)]
    pub per_word: Vec<WordScore>,
    #[serde(default)]
    pub per_phoneme: Vec<PhonemeScore>,
}

/// Opaque scoring oracle. The engine never looks inside the model; it only
/// consumes the confidence number.
#[async_trait]
pub trait PronunciationScorer: Send + Sync {
    async fn score(
        &self,
        reference_text: &str,
        audio: &[u8],
    ) -> Result<PronunciationScore, OracleError>;
}

/// HTTP client for the scoring sidecar. Audio goes up as the raw request
/// body with the reference text in the query string.
pub struct HttpPronunciationScorer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPronunciationScorer {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl PronunciationScorer for HttpPronunciationScorer {
    async fn score(
        &self,
        reference_text: &str,
        audio: &[u8],
    ) -> Result<PronunciationScore, OracleError> {
        let url = format!("{}/v1/score", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .query(&[("text", reference_text)])
            .header("content-type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|err| OracleError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Transport(format!(
                "oracle returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let score: PronunciationScore = response
            .json()
            .await
            .map_err(|err| OracleError::MalformedResponse(err.to_string()))?;

        if !(0..=100).contains(&score.pronunciation) {
            return Err(OracleError::MalformedResponse(format!(
                "confidence {} out of range",
                score.pronunciation
            )));
        }
        Ok(score)
    }
}

/// Scripted oracle for tests: returns queued confidence values in order.
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub struct ScriptedScorer {
        responses: Mutex<VecDeque<Result<i32, OracleError>>>,
    }

    impl ScriptedScorer {
        pub fn new(scores: impl IntoIterator<Item = i32>) -> Self {
            Self {
                responses: Mutex::new(scores.into_iter().map(Ok).collect()),
            }
        }

        pub fn push_failure(&self) {
            self.responses
                .lock()
                .expect("script mutex poisoned")
                .push_back(Err(OracleError::Transport("connection reset".into())));
        }

        pub fn push_score(&self, score: i32) {
            self.responses
                .lock()
                .expect("script mutex poisoned")
                .push_back(Ok(score));
        }
    }

    #[async_trait]
    impl PronunciationScorer for ScriptedScorer {
        async fn score(
            &self,
            _reference_text: &str,
            _audio: &[u8],
        ) -> Result<PronunciationScore, OracleError> {
            let next = self
                .responses
                .lock()
                .expect("script mutex poisoned")
                .pop_front()
                .unwrap_or(Ok(0));
            next.map(|pronunciation| PronunciationScore {
                pronunciation,
                per_word: vec![],
                per_phoneme: vec![],
            })
        }
    }
}
