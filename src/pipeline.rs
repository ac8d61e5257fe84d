use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::confirm::{CompletionService, confirm_candidates};
use crate::detect::{DetectRules, identify};
use crate::error::StageError;
use crate::formats::{Candidate, ConfirmedChapter};
use crate::review::{GateDecision, Operator, review};
use crate::split::{SplitRequest, write_split};

/// State threaded through the stages of one run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub filepath: PathBuf,
    pub output_dir: PathBuf,
    pub candidates: Vec<Candidate>,
    pub confirmed_chapters: Vec<ConfirmedChapter>,
    pub user_confirmed: bool,
    pub auto_confirm: bool,
    pub task_id: String,
    pub start_time: DateTime<Local>,
}

impl RunState {
    fn new(filepath: &Path, output_dir: &Path, auto_confirm: bool) -> Self {
        Self {
            filepath: filepath.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            candidates: Vec::new(),
            confirmed_chapters: Vec::new(),
            user_confirmed: false,
            auto_confirm,
            task_id: uuid::Uuid::new_v4().to_string(),
            start_time: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Identify,
    Confirm,
    Prompt,
    Split,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No candidate survived confirmation; nothing was written.
    NoChapters,
    /// The review was declined or interrupted; nothing was written.
    Rejected,
    /// `chapters` files were written along with the metadata record.
    Split { chapters: usize },
    /// Output directories or the source were unusable at split time.
    SplitAborted,
}

#[derive(Debug)]
pub struct RunReport {
    pub task_id: String,
    pub source: PathBuf,
    pub outcome: RunOutcome,
    /// Stages entered, in order, ending with `Stage::End`.
    pub stages: Vec<Stage>,
    pub failures: Vec<StageError>,
    pub metadata_path: Option<PathBuf>,
}

impl RunReport {
    /// True when a failure stopped a stage as a whole, not just one item.
    pub fn has_structural_failure(&self) -> bool {
        self.failures.iter().any(|f| !f.is_per_item())
    }
}

/// Identify -> Confirm -> (End | Prompt) -> (End | Split) -> End.
pub struct Pipeline {
    service: Arc<dyn CompletionService>,
    operator: Box<dyn Operator>,
    rules: DetectRules,
}

impl Pipeline {
    pub fn new(
        service: Arc<dyn CompletionService>,
        operator: Box<dyn Operator>,
        rules: DetectRules,
    ) -> Self {
        Self {
            service,
            operator,
            rules,
        }
    }

    pub async fn run(
        &mut self,
        filepath: &Path,
        output_dir: &Path,
        auto_confirm: bool,
    ) -> RunReport {
        let mut state = RunState::new(filepath, output_dir, auto_confirm);
        let mut report = RunReport {
            task_id: state.task_id.clone(),
            source: filepath.to_path_buf(),
            outcome: RunOutcome::NoChapters,
            stages: Vec::new(),
            failures: Vec::new(),
            metadata_path: None,
        };

        tracing::info!(
            task_id = %state.task_id,
            file = %filepath.display(),
            "workflow starting"
        );

        let mut stage = Stage::Identify;
        loop {
            report.stages.push(stage);
            stage = match stage {
                Stage::Identify => {
                    state = self.identify(state, &mut report);
                    Stage::Confirm
                }
                Stage::Confirm => {
                    state = self.confirm(state, &mut report).await;
                    if state.confirmed_chapters.is_empty() {
                        tracing::warn!("no chapters confirmed; ending workflow");
                        report.outcome = RunOutcome::NoChapters;
                        Stage::End
                    } else {
                        Stage::Prompt
                    }
                }
                Stage::Prompt => {
                    state = self.prompt(state).await;
                    if state.user_confirmed || state.auto_confirm {
                        Stage::Split
                    } else {
                        tracing::info!("user chose not to proceed; ending workflow");
                        report.outcome = RunOutcome::Rejected;
                        Stage::End
                    }
                }
                Stage::Split => {
                    state = self.split(state, &mut report);
                    Stage::End
                }
                Stage::End => break,
            };
        }

        tracing::info!(
            task_id = %report.task_id,
            outcome = ?report.outcome,
            failures = report.failures.len(),
            "workflow finished"
        );
        report
    }

    fn identify(&self, state: RunState, report: &mut RunReport) -> RunState {
        tracing::info!(
            file = %state.filepath.display(),
            "identify: scanning for candidate chapter lines"
        );
        let candidates = match identify(&state.filepath, &self.rules) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::error!(error = %err, "identify: cannot read source");
                report.failures.push(err);
                Vec::new()
            }
        };
        tracing::info!(candidates = candidates.len(), "identify: done");
        RunState { candidates, ..state }
    }

    async fn confirm(&self, state: RunState, report: &mut RunReport) -> RunState {
        tracing::info!(candidates = state.candidates.len(), "confirm: asking the LLM");
        let outcome = confirm_candidates(&state.candidates, self.service.as_ref()).await;
        tracing::info!(
            confirmed = outcome.confirmed.len(),
            failed = outcome.failures.len(),
            "confirm: done"
        );
        report.failures.extend(outcome.failures);
        RunState {
            confirmed_chapters: outcome.confirmed,
            ..state
        }
    }

    async fn prompt(&mut self, state: RunState) -> RunState {
        let source_name = crate::source::file_name(&state.filepath);
        let decision = review(
            &source_name,
            &state.confirmed_chapters,
            state.auto_confirm,
            self.operator.as_mut(),
        )
        .await;
        RunState {
            user_confirmed: decision == GateDecision::Confirmed,
            ..state
        }
    }

    fn split(&self, state: RunState, report: &mut RunReport) -> RunState {
        tracing::info!(chapters = state.confirmed_chapters.len(), "split: writing chapters");
        let request = SplitRequest {
            source: &state.filepath,
            output_dir: &state.output_dir,
            task_id: &state.task_id,
            start_time: state.start_time,
            chapters: &state.confirmed_chapters,
        };

        match write_split(&request) {
            Ok(output) => {
                let split_dir = crate::split::split_data_dir(&state.output_dir, &state.task_id);
                tracing::info!(
                    written = output.written.len(),
                    split_dir = %split_dir.display(),
                    "split: done"
                );
                report.outcome = RunOutcome::Split {
                    chapters: output.written.len(),
                };
                report.metadata_path = output.metadata_path;
                report.failures.extend(output.failures);
            }
            Err(err) => {
                tracing::error!(error = %err, "split: aborted");
                report.outcome = RunOutcome::SplitAborted;
                report.failures.push(err);
            }
        }
        state
    }
}
