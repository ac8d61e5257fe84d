use std::io::Write as _;

use anyhow::Context as _;
use tokio::io::AsyncBufReadExt as _;

use crate::formats::ConfirmedChapter;
use crate::interrupt::Interrupts;

pub const PROCEED_QUESTION: &str = "Please review the list above. Proceed with splitting? (y/n): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorReply {
    Answer(String),
    Interrupted,
}

/// Someone who looks at the preview and answers the proceed question.
#[async_trait::async_trait]
pub trait Operator: Send {
    async fn ask(&mut self, preview: &str, question: &str) -> anyhow::Result<OperatorReply>;
}

/// Reads the answer from stdin; Ctrl-C while waiting counts as "no".
pub struct ConsoleOperator {
    interrupts: Interrupts,
    stdin: tokio::io::BufReader<tokio::io::Stdin>,
}

impl ConsoleOperator {
    pub fn new(interrupts: Interrupts) -> Self {
        Self {
            interrupts,
            stdin: tokio::io::BufReader::new(tokio::io::stdin()),
        }
    }
}

#[async_trait::async_trait]
impl Operator for ConsoleOperator {
    async fn ask(&mut self, preview: &str, question: &str) -> anyhow::Result<OperatorReply> {
        let mut scope = self.interrupts.enter_prompt();

        {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{preview}").context("write preview")?;
            write!(stdout, "{question}").context("write question")?;
            stdout.flush().context("flush stdout")?;
        }

        let mut line = String::new();
        let read = tokio::select! {
            read = self.stdin.read_line(&mut line) => Some(read),
            () = scope.interrupted() => None,
        };

        match read {
            Some(read) => {
                read.context("read answer from stdin")?;
                Ok(OperatorReply::Answer(line))
            }
            None => {
                println!();
                Ok(OperatorReply::Interrupted)
            }
        }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// The human approval step.
///
/// With `auto_confirm` the operator is never consulted. Otherwise the gate
/// waits for one reply: an affirmative answer confirms, anything else
/// (including an interrupt, end of input or a read error) rejects.
pub async fn review(
    source_name: &str,
    chapters: &[ConfirmedChapter],
    auto_confirm: bool,
    operator: &mut dyn Operator,
) -> GateDecision {
    if auto_confirm {
        tracing::info!("skipping review (auto confirm)");
        return GateDecision::Confirmed;
    }

    let preview = render_preview(source_name, chapters);
    let decision = match operator.ask(&preview, PROCEED_QUESTION).await {
        Ok(OperatorReply::Answer(answer)) if is_affirmative(&answer) => GateDecision::Confirmed,
        Ok(OperatorReply::Answer(_)) => GateDecision::Rejected,
        Ok(OperatorReply::Interrupted) => {
            tracing::warn!("review interrupted; treating as cancel");
            GateDecision::Rejected
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "review failed; treating as cancel");
            GateDecision::Rejected
        }
    };

    tracing::info!(
        decision = match decision {
            GateDecision::Confirmed => "proceed",
            GateDecision::Rejected => "cancel",
        },
        "user decision"
    );
    decision
}

pub fn render_preview(source_name: &str, chapters: &[ConfirmedChapter]) -> String {
    let headers = ["No.", "Chapter Title", "Original Line No."];
    let rows = chapters
        .iter()
        .enumerate()
        .map(|(idx, ch)| {
            [
                (idx + 1).to_string(),
                ch.title.clone(),
                (ch.line_index + 1).to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let mut widths = headers.map(display_width);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(display_width(cell));
        }
    }

    let rule = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");

    let mut out = format!("Novel Chapter Split Preview - {source_name}\n");
    out.push_str(&format_row(&headers.map(str::to_owned), &widths));
    out.push_str(&rule);
    out.push('\n');
    for row in &rows {
        out.push_str(&format_row(row, &widths));
    }
    out
}

fn format_row(cells: &[String; 3], widths: &[usize; 3]) -> String {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
        if idx > 0 {
            line.push('|');
        }
        let pad = " ".repeat(width - display_width(cell));
        // The line number column is right aligned.
        if idx == 2 {
            line.push_str(&format!(" {pad}{cell} "));
        } else {
            line.push_str(&format!(" {cell}{pad} "));
        }
    }
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

/// Terminal columns taken by `text`, counting East Asian wide glyphs as two.
fn display_width(text: &str) -> usize {
    text.chars().map(|c| if is_wide(c) { 2 } else { 1 }).sum()
}

fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
    )
}
