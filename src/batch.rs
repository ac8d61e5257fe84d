use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::SplitArgs;
use crate::config::LlmConfig;
use crate::detect::DetectRules;
use crate::interrupt::Interrupts;
use crate::openai::OpenAiChat;
use crate::pipeline::{Pipeline, RunOutcome, RunReport};
use crate::review::ConsoleOperator;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub split: usize,
    pub no_chapters: usize,
    pub rejected: usize,
    /// Runs that hit a structural failure (unreadable source, unusable output).
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, report: &RunReport) {
        self.processed += 1;
        if report.has_structural_failure() {
            self.failed += 1;
        }
        match report.outcome {
            RunOutcome::Split { .. } => self.split += 1,
            RunOutcome::NoChapters => self.no_chapters += 1,
            RunOutcome::Rejected => self.rejected += 1,
            RunOutcome::SplitAborted => {}
        }
    }
}

pub async fn run(args: SplitArgs, interrupts: Interrupts) -> anyhow::Result<BatchSummary> {
    let root = PathBuf::from(&args.path);
    let files = discover_files(&root, &args.extension)?;
    if files.is_empty() {
        tracing::warn!(
            root = %root.display(),
            extension = %args.extension,
            "no matching files found"
        );
        return Ok(BatchSummary::default());
    }

    let config = LlmConfig::from_env()
        .context("load llm config")?
        .with_overrides(
            args.llm_base_url.as_deref(),
            args.llm_model.as_deref(),
            args.llm_retries,
        );
    let chat = OpenAiChat::new(&config).context("initialize llm client")?;
    tracing::info!(
        model = chat.model(),
        endpoint = chat.endpoint(),
        "llm client initialized"
    );

    let rules = DetectRules::default().with_extra_keywords(&args.keywords);
    let mut pipeline = Pipeline::new(
        Arc::new(chat),
        Box::new(ConsoleOperator::new(interrupts)),
        rules,
    );

    let output_dir = PathBuf::from(&args.out);
    let total = files.len();
    let mut summary = BatchSummary::default();

    for (idx, file) in files.iter().enumerate() {
        tracing::info!(
            file = %file.display(),
            index = idx + 1,
            total,
            "processing file"
        );
        let report = pipeline.run(file, &output_dir, args.yes).await;
        for failure in &report.failures {
            tracing::debug!(
                task_id = %report.task_id,
                file = %report.source.display(),
                error = %failure,
                "run failure"
            );
        }
        summary.record(&report);
    }

    tracing::info!(
        processed = summary.processed,
        split = summary.split,
        no_chapters = summary.no_chapters,
        rejected = summary.rejected,
        failed = summary.failed,
        "batch finished"
    );

    Ok(summary)
}

/// A file root yields itself; a directory root yields every file below it
/// whose extension matches (case-insensitive), in path order.
pub fn discover_files(root: &Path, extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("input path does not exist: {}", root.display()))?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("read dir: {}", current.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read dir entry: {}", current.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("read file type: {}", path.display()))?;
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            // Symlinked directories can point back up the tree.
            if file_type.is_symlink() && path.is_dir() {
                tracing::debug!(path = %path.display(), "skipping symlinked directory");
                continue;
            }
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
