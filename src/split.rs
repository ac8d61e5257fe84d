use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize as _;

use crate::error::StageError;
use crate::formats::{ConfirmedChapter, TaskMetadata};

/// Lines `[start, end)` of the source belonging to chapter `number` (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub number: usize,
    pub title: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Partitions `[first boundary, total_lines)` into one segment per chapter.
///
/// Lines before the first confirmed chapter belong to no segment.
pub fn plan_segments(chapters: &[ConfirmedChapter], total_lines: usize) -> Vec<Segment<'_>> {
    chapters
        .iter()
        .enumerate()
        .map(|(idx, chapter)| {
            let end = chapters
                .get(idx + 1)
                .map_or(total_lines, |next| next.line_index);
            Segment {
                number: idx + 1,
                title: &chapter.title,
                start: chapter.line_index.min(total_lines),
                end: end.min(total_lines),
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SplitRequest<'a> {
    pub source: &'a Path,
    pub output_dir: &'a Path,
    pub task_id: &'a str,
    pub start_time: DateTime<Local>,
    pub chapters: &'a [ConfirmedChapter],
}

#[derive(Debug, Default)]
pub struct SplitOutput {
    /// Chapters written to disk, in order.
    pub written: Vec<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    /// Per-segment write failures, plus a metadata write failure if any.
    pub failures: Vec<StageError>,
}

pub fn split_data_dir(output_dir: &Path, task_id: &str) -> PathBuf {
    output_dir.join("splitdata").join(task_id)
}

pub fn metadata_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("metadata")
}

/// Writes one file per chapter and then the task metadata record.
///
/// Returns `Err` only when the output directories cannot be created or the
/// source cannot be read; nothing is written in that case.
pub fn write_split(request: &SplitRequest<'_>) -> Result<SplitOutput, StageError> {
    let split_dir = split_data_dir(request.output_dir, request.task_id);
    let meta_dir = metadata_dir(request.output_dir);

    for dir in [&split_dir, &meta_dir] {
        std::fs::create_dir_all(dir).map_err(|source| StageError::OutputDir {
            path: dir.clone(),
            source,
        })?;
    }

    let lines = crate::source::read_lines(request.source)?;

    let mut output = SplitOutput::default();
    let mut split_files = Vec::new();
    let mut chapter_titles = Vec::new();

    for segment in plan_segments(request.chapters, lines.len()) {
        let file_name = format!("{}.txt", segment.number);
        let path = split_dir.join(&file_name);
        let contents = lines[segment.start..segment.end].concat();

        match create_new_file(&path, contents.as_bytes()) {
            Ok(()) => {
                tracing::debug!(
                    path = %path.display(),
                    title = segment.title,
                    lines = segment.end - segment.start,
                    "wrote chapter"
                );
                split_files.push(format!("../splitdata/{}/{file_name}", request.task_id));
                chapter_titles.push(segment.title.to_owned());
                output.written.push(path);
            }
            Err(source) => {
                tracing::error!(
                    path = %path.display(),
                    error = %source,
                    "failed to write chapter file"
                );
                output.failures.push(StageError::Write { path, source });
            }
        }
    }

    let metadata = TaskMetadata {
        source_filename: crate::source::file_name(request.source),
        split_files,
        chapter_titles,
        task_id: request.task_id.to_owned(),
        start_time: request.start_time,
        end_time: Local::now(),
    };

    let metadata_path = meta_dir.join(format!("{}-metadata.json", request.task_id));
    match write_metadata(&metadata_path, &metadata) {
        Ok(()) => {
            tracing::info!(path = %metadata_path.display(), "metadata file created");
            output.metadata_path = Some(metadata_path);
        }
        Err(source) => {
            tracing::error!(
                path = %metadata_path.display(),
                error = %source,
                "failed to write metadata file"
            );
            output.failures.push(StageError::Write {
                path: metadata_path,
                source,
            });
        }
    }

    Ok(output)
}

fn create_new_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    file.write_all(contents)?;
    file.flush()
}

fn write_metadata(path: &Path, metadata: &TaskMetadata) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    metadata
        .serialize(&mut serializer)
        .map_err(std::io::Error::other)?;
    buf.push(b'\n');
    create_new_file(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(line_index: usize, title: &str) -> ConfirmedChapter {
        ConfirmedChapter {
            line_index,
            title: title.to_owned(),
        }
    }

    #[test]
    fn segments_are_contiguous_from_first_boundary_to_eof() {
        let chapters = vec![chapter(2, "a"), chapter(5, "b"), chapter(6, "c")];
        let segments = plan_segments(&chapters, 10);

        let ranges = segments
            .iter()
            .map(|s| (s.number, s.start, s.end))
            .collect::<Vec<_>>();
        assert_eq!(ranges, vec![(1, 2, 5), (2, 5, 6), (3, 6, 10)]);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn boundaries_past_eof_are_clamped() {
        let chapters = vec![chapter(1, "a"), chapter(20, "b")];
        let segments = plan_segments(&chapters, 4);
        assert_eq!((segments[0].start, segments[0].end), (1, 4));
        assert_eq!((segments[1].start, segments[1].end), (4, 4));
    }

    #[test]
    fn writes_chapters_and_metadata() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let source = temp.path().join("novel.txt");
        std::fs::write(&source, "前言\n第一章 开端\ntext\n第二章 风起\nmore text")?;
        let out = temp.path().join("results");
        let chapters = vec![chapter(1, "第一章 开端"), chapter(3, "第二章 风起")];

        let output = write_split(&SplitRequest {
            source: &source,
            output_dir: &out,
            task_id: "task-1",
            start_time: Local::now(),
            chapters: &chapters,
        })?;

        assert!(output.failures.is_empty());
        assert_eq!(output.written.len(), 2);
        let split_dir = out.join("splitdata").join("task-1");
        assert_eq!(
            std::fs::read_to_string(split_dir.join("1.txt"))?,
            "第一章 开端\ntext\n"
        );
        assert_eq!(
            std::fs::read_to_string(split_dir.join("2.txt"))?,
            "第二章 风起\nmore text"
        );

        let metadata_path = output.metadata_path.expect("metadata written");
        assert_eq!(
            metadata_path,
            out.join("metadata").join("task-1-metadata.json")
        );
        let raw = std::fs::read_to_string(&metadata_path)?;
        assert!(raw.contains("\n    \"source_filename\": \"novel.txt\""));
        assert!(raw.contains("第一章 开端"));
        let metadata: TaskMetadata = serde_json::from_str(&raw)?;
        assert_eq!(
            metadata.split_files,
            vec!["../splitdata/task-1/1.txt", "../splitdata/task-1/2.txt"]
        );
        assert_eq!(metadata.chapter_titles, vec!["第一章 开端", "第二章 风起"]);
        assert_eq!(metadata.task_id, "task-1");
        assert!(metadata.end_time >= metadata.start_time);
        Ok(())
    }

    #[test]
    fn failed_segment_is_left_out_of_metadata() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let source = temp.path().join("novel.txt");
        std::fs::write(&source, "Chapter 1\na\nChapter 2\nb\nChapter 3\nc\n")?;
        let out = temp.path().join("results");

        // A directory squatting on `2.txt` makes that segment unwritable.
        std::fs::create_dir_all(out.join("splitdata").join("task-2").join("2.txt"))?;

        let chapters = vec![
            chapter(0, "Chapter 1"),
            chapter(2, "Chapter 2"),
            chapter(4, "Chapter 3"),
        ];
        let output = write_split(&SplitRequest {
            source: &source,
            output_dir: &out,
            task_id: "task-2",
            start_time: Local::now(),
            chapters: &chapters,
        })?;

        assert_eq!(output.written.len(), 2);
        assert_eq!(output.failures.len(), 1);
        assert!(matches!(output.failures[0], StageError::Write { .. }));

        let metadata_path = output.metadata_path.expect("metadata written");
        let metadata: TaskMetadata =
            serde_json::from_str(&std::fs::read_to_string(metadata_path)?)?;
        assert_eq!(
            metadata.split_files,
            vec!["../splitdata/task-2/1.txt", "../splitdata/task-2/3.txt"]
        );
        assert_eq!(metadata.chapter_titles, vec!["Chapter 1", "Chapter 3"]);
        Ok(())
    }

    #[test]
    fn missing_source_aborts_without_metadata() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("results");
        let chapters = vec![chapter(0, "Chapter 1")];

        let err = write_split(&SplitRequest {
            source: &temp.path().join("gone.txt"),
            output_dir: &out,
            task_id: "task-3",
            start_time: Local::now(),
            chapters: &chapters,
        })
        .unwrap_err();

        assert!(matches!(err, StageError::SourceNotFound { .. }));
        assert_eq!(std::fs::read_dir(out.join("metadata"))?.count(), 0);
        Ok(())
    }

    #[test]
    fn unusable_output_root_aborts() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let source = temp.path().join("novel.txt");
        std::fs::write(&source, "Chapter 1\n")?;
        let out = temp.path().join("results");
        std::fs::write(&out, "not a directory")?;
        let chapters = vec![chapter(0, "Chapter 1")];

        let err = write_split(&SplitRequest {
            source: &source,
            output_dir: &out,
            task_id: "task-4",
            start_time: Local::now(),
            chapters: &chapters,
        })
        .unwrap_err();

        assert!(matches!(err, StageError::OutputDir { .. }));
        Ok(())
    }
}
