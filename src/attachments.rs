//! Expansion of `@file` references in user input.
//!
//! `@notes.md` or `@"my notes.md"` is replaced by the file's content in a
//! fenced block. References only count at the start of the input or after
//! whitespace or an opening bracket, so e-mail addresses are left alone.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const MAX_ATTACHMENT_BYTES: u64 = 10_000;

/// Bytes inspected to decide whether a file is text.
const SNIFF_LEN: u64 = 1024;

/// Expands references relative to the working directory.
pub fn expand_file_references(input: &str) -> String {
    expand_file_references_in(input, Path::new(""))
}

/// Expands references, resolving relative names against `base`. The name is
/// shown as typed.
pub fn expand_file_references_in(input: &str, base: &Path) -> String {
    let mut result = input.to_string();
    let mut search = 0;

    while let Some(offset) = result[search..].find('@') {
        let at = search + offset;
        let bytes = result.as_bytes();

        if at > 0 && !may_precede_reference(bytes[at - 1]) {
            search = at + 1;
            continue;
        }

        let mut start = at + 1;
        if start >= bytes.len() {
            break;
        }

        let quote = match bytes[start] {
            q @ (b'"' | b'\'') => {
                start += 1;
                Some(q)
            }
            _ => None,
        };

        let mut end = start;
        match quote {
            Some(q) => {
                while end < bytes.len() && bytes[end] != q {
                    end += 1;
                }
            }
            None => {
                while end < bytes.len() && !ends_name(bytes, end) {
                    end += 1;
                }
            }
        }

        if end == start {
            search = start;
            continue;
        }

        let name = result[start..end]
            .trim_end_matches(['"', '\'', '`'])
            .to_string();
        let mut suffix_start = end;
        if name.is_empty() {
            search = suffix_start;
            continue;
        }
        if quote.is_some() && suffix_start < bytes.len() {
            suffix_start += 1;
        }

        let replacement = render(&name, base);
        result.replace_range(at..suffix_start, &replacement);
        search = at + replacement.len();
    }

    result
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || b == 0x0b
}

fn may_precede_reference(b: u8) -> bool {
    is_space(b) || matches!(b, b'(' | b'[' | b'{')
}

/// A `.` only ends a name when it ends the sentence.
fn ends_name(bytes: &[u8], i: usize) -> bool {
    match bytes[i] {
        b'?' | b'!' | b';' | b',' | b')' | b'}' => true,
        b'.' => bytes.get(i + 1).is_none_or(|&next| is_space(next)),
        b => is_space(b),
    }
}

fn render(name: &str, base: &Path) -> String {
    let path = base.join(name);
    if !path.exists() || !is_plain_text(&path) {
        warn!("File not found or not plain text: {}", name);
        return format!("[File not found: {}]", name);
    }

    match read_attachment(&path) {
        Some(content) => {
            info!("Attached file content: {} ({} bytes)", name, content.len());
            format!("\nFile: {}\n```\n{}\n```", name, content)
        }
        None => format!("[Error: Could not read {}]", name),
    }
}

/// No NUL bytes and at most one control character in twenty.
fn is_plain_text(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };

    let mut head = Vec::new();
    if file.take(SNIFF_LEN).read_to_end(&mut head).is_err() {
        return false;
    }
    if head.is_empty() {
        return true;
    }

    let mut control = 0;
    for &b in &head {
        if b == 0 {
            return false;
        }
        if b < 32 && !matches!(b, b'\n' | b'\r' | b'\t') {
            control += 1;
        }
    }
    control <= head.len() / 20
}

fn read_attachment(path: &Path) -> Option<String> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Failed to stat {}: {}", path.display(), e);
            return None;
        }
    };
    if size > MAX_ATTACHMENT_BYTES {
        warn!("File too large (>10KB): {}", path.display());
        return None;
    }

    match fs::read(path) {
        Ok(bytes) => {
            debug!("Read {} bytes from file: {}", bytes.len(), path.display());
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        Err(e) => {
            warn!("Failed to open file {}: {}", path.display(), e);
            None
        }
    }
}
