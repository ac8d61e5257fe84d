use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;

use crate::cli::DetectArgs;
use crate::error::StageError;
use crate::formats::Candidate;

const NUMBERING_MAX_CHARS: usize = 50;
const KEYWORD_MAX_CHARS: usize = 30;

static CHINESE_NUMBERING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^第[零〇一二三四五六七八九十百千万两0-9０-９]+[章回]")
        .expect("chinese chapter pattern is valid")
});

static ENGLISH_NUMBERING: LazyLock<Regex> = LazyLock::new(|| {
    // Roman numerals are upper case only ("Chapter civil war" is prose).
    Regex::new(r"^(?i:chapter)\s*(\d+|[IVXLC]+\b)").expect("english chapter pattern is valid")
});

const DEFAULT_KEYWORDS: &[&str] = &[
    "序章",
    "序言",
    "序幕",
    "楔子",
    "引子",
    "前言",
    "番外",
    "后记",
    "尾声",
    "prologue",
    "foreword",
    "interlude",
    "afterword",
    "epilogue",
];

/// Line-pattern rules used to pick chapter candidates.
#[derive(Debug, Clone)]
pub struct DetectRules {
    keywords: Vec<String>,
}

impl Default for DetectRules {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|kw| (*kw).to_owned()).collect(),
        }
    }
}

impl DetectRules {
    pub fn with_extra_keywords<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for kw in extra {
            let kw = kw.as_ref().trim().to_lowercase();
            if !kw.is_empty() && !self.keywords.contains(&kw) {
                self.keywords.push(kw);
            }
        }
        self
    }

    /// Returns true when a trimmed, non-blank line looks like a chapter start.
    pub fn matches(&self, line: &str) -> bool {
        let chars = line.chars().count();

        if chars < NUMBERING_MAX_CHARS
            && (CHINESE_NUMBERING.is_match(line) || ENGLISH_NUMBERING.is_match(line))
        {
            return true;
        }

        if chars < KEYWORD_MAX_CHARS {
            let lowered = line.to_lowercase();
            return self.keywords.iter().any(|kw| lowered.contains(kw.as_str()));
        }

        false
    }
}

/// Scans lines in order; the result is ascending by `line_index` with no duplicates.
pub fn detect_candidates<S: AsRef<str>>(lines: &[S], rules: &DetectRules) -> Vec<Candidate> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line_index, line)| {
            let text = line.as_ref().trim();
            if text.is_empty() || !rules.matches(text) {
                return None;
            }
            Some(Candidate {
                line_index,
                text: text.to_owned(),
            })
        })
        .collect()
}

pub fn identify(path: &Path, rules: &DetectRules) -> Result<Vec<Candidate>, StageError> {
    let lines = crate::source::read_lines(path)?;
    Ok(detect_candidates(&lines, rules))
}

/// Prints the candidates of one file as JSON lines, without asking the LLM.
pub fn run(args: DetectArgs) -> anyhow::Result<()> {
    let path = PathBuf::from(&args.file);
    let rules = DetectRules::default().with_extra_keywords(&args.keywords);
    let candidates = identify(&path, &rules)?;
    tracing::info!(
        file = %path.display(),
        candidates = candidates.len(),
        "detect"
    );

    let mut out = std::io::stdout().lock();
    for candidate in &candidates {
        serde_json::to_writer(&mut out, candidate).context("serialize candidate")?;
        out.write_all(b"\n").context("write candidate newline")?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}
