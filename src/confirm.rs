use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::error::StageError;
use crate::formats::{Candidate, ChapterVerdict, ConfirmedChapter};

pub const CHAPTER_TITLE_INSTRUCTIONS: &str = "You are a professional novel editor. \
Your task is to determine if a given line of text is an independent chapter title. \
Respond ONLY with a JSON object: {\"is_chapter_title\": boolean}, with no additional explanations.";

/// A text completion service: one instruction, one input, one text reply.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, instructions: &str, input: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Default)]
pub struct ConfirmOutcome {
    /// Surviving candidates, in candidate order.
    pub confirmed: Vec<ConfirmedChapter>,
    /// One `StageError::Classification` per dropped-on-error candidate.
    pub failures: Vec<StageError>,
}

pub fn parse_verdict(raw: &str) -> anyhow::Result<bool> {
    let verdict: ChapterVerdict =
        serde_json::from_str(raw.trim()).context("parse chapter verdict json")?;
    Ok(verdict.is_chapter_title)
}

/// Asks the service about every candidate, one request at a time, in order.
///
/// A failed request or an unparseable reply drops that candidate and is
/// recorded in `failures`; the remaining candidates are still classified.
pub async fn confirm_candidates(
    candidates: &[Candidate],
    service: &dyn CompletionService,
) -> ConfirmOutcome {
    let mut outcome = ConfirmOutcome::default();
    let total = candidates.len();
    let mut last_progress_log_at = Instant::now();

    for (done, candidate) in candidates.iter().enumerate() {
        let line_number = candidate.line_index + 1;
        tracing::debug!(line_number, text = %candidate.text, "classify candidate");

        let result = match service
            .complete(CHAPTER_TITLE_INSTRUCTIONS, &candidate.text)
            .await
        {
            Ok(raw) => {
                tracing::debug!(line_number, raw = %raw, "classification reply");
                parse_verdict(&raw)
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(true) => {
                tracing::debug!(line_number, "confirmed as chapter title");
                outcome.confirmed.push(candidate.clone().into());
            }
            Ok(false) => {}
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::error!(
                    line_number,
                    text = %candidate.text,
                    error = %reason,
                    "failed to classify candidate; dropping it"
                );
                outcome.failures.push(StageError::Classification {
                    line_number,
                    text: candidate.text.clone(),
                    reason,
                });
            }
        }

        let done = done + 1;
        if done == total || last_progress_log_at.elapsed() >= Duration::from_secs(2) {
            tracing::info!(
                done,
                total,
                confirmed = outcome.confirmed.len(),
                failed = outcome.failures.len(),
                "llm confirmation: progress"
            );
            last_progress_log_at = Instant::now();
        }
    }

    outcome
}
