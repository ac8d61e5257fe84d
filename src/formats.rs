use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A line that looks like it could open a chapter. `line_index` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub line_index: usize,
    pub text: String,
}

/// A candidate the classification service judged to be a real chapter title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedChapter {
    pub line_index: usize,
    pub title: String,
}

impl From<Candidate> for ConfirmedChapter {
    fn from(candidate: Candidate) -> Self {
        Self {
            line_index: candidate.line_index,
            title: candidate.text,
        }
    }
}

/// Reply expected from the classification service.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterVerdict {
    pub is_chapter_title: bool,
}

/// The metadata record persisted once per run, after splitting.
///
/// `split_files` are relative to the metadata directory and always use `/`.
/// `split_files[i]` holds the chapter titled `chapter_titles[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub source_filename: String,
    pub split_files: Vec<String>,
    pub chapter_titles: Vec<String>,
    pub task_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}
