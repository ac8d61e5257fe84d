use std::io::ErrorKind;
use std::path::Path;

use crate::error::StageError;

/// Reads a UTF-8 novel into lines, each keeping its original terminator.
///
/// Concatenating the returned lines reproduces the file byte for byte.
pub fn read_lines(path: &Path) -> Result<Vec<String>, StageError> {
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StageError::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => StageError::SourceRead {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let text = String::from_utf8(bytes).map_err(|err| StageError::SourceRead {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, err),
    })?;

    Ok(split_keep_terminators(&text))
}

/// Splits on `\n`, `\r\n` and a lone `\r`, leaving each terminator on its line.
pub fn split_keep_terminators(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let end = match bytes[idx] {
            b'\n' => idx + 1,
            b'\r' if bytes.get(idx + 1) == Some(&b'\n') => idx + 2,
            b'\r' => idx + 1,
            _ => {
                idx += 1;
                continue;
            }
        };
        lines.push(text[start..end].to_owned());
        start = end;
        idx = end;
    }

    if start < bytes.len() {
        lines.push(text[start..].to_owned());
    }
    lines
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
