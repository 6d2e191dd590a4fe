//! Tag-file reading and writing.
//!
//! Tag files (`bagit.txt`, `bag-info.txt`) hold `Name: value` lines. A line
//! starting with whitespace continues the previous value; `fetch.txt` holds
//! `<url> <length> <path>` lines.

use crate::error::{BagError, BagResult};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Ordered tag name → values (a name may repeat).
pub type BagInfo = IndexMap<String, Vec<String>>;

/// Iterator over the lines of a tag file, trailing whitespace removed.
pub struct TagLines<R: BufRead> {
    reader: R,
    line_buffer: String,
    line_number: usize,
}

impl<R: BufRead> TagLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buffer: String::new(),
            line_number: 0,
        }
    }

    /// Current line number (1-indexed).
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl TagLines<BufReader<File>> {
    pub fn open(path: &Path) -> BagResult<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for TagLines<R> {
    type Item = BagResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line_buffer.clear();
        match self.reader.read_line(&mut self.line_buffer) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                Some(Ok(self.line_buffer.trim_end().to_string()))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Parse `Name: value` lines into a [`BagInfo`].
///
/// Continuation lines are folded onto the previous logical line with their
/// leading whitespace collapsed to one space. Each logical line is split at
/// its first `:`; both sides are trimmed. A line without `:` records the
/// whole line as a name with an empty value. Blank lines are skipped.
pub fn parse_baginfo<I>(lines: I) -> BagResult<BagInfo>
where
    I: IntoIterator<Item = BagResult<String>>,
{
    let mut out = BagInfo::new();
    let mut current: Option<String> = None;

    for line in lines {
        let line = line?;
        if line.starts_with(|c: char| c.is_whitespace()) {
            let rest = line.trim_start();
            match current.as_mut() {
                Some(cur) if !rest.is_empty() => {
                    cur.push(' ');
                    cur.push_str(rest);
                }
                Some(_) => {}
                None => current = Some(rest.to_string()),
            }
            continue;
        }
        if let Some(logical) = current.take() {
            push_logical(&mut out, &logical);
        }
        current = Some(line);
    }
    if let Some(logical) = current {
        push_logical(&mut out, &logical);
    }
    Ok(out)
}

fn push_logical(out: &mut BagInfo, logical: &str) {
    if logical.trim().is_empty() {
        return;
    }
    let (name, value) = logical.split_once(':').unwrap_or((logical, ""));
    out.entry(name.trim().to_string())
        .or_default()
        .push(value.trim().to_string());
}

/// Read a tag file into a [`BagInfo`]; a missing file yields an empty map.
pub fn read_baginfo(path: &Path) -> BagResult<BagInfo> {
    if !path.exists() {
        return Ok(BagInfo::new());
    }
    parse_baginfo(TagLines::open(path)?)
}

/// Format one `Name: value` entry, folding at `width` columns.
///
/// Breaks are taken greedily at spaces; continuation lines start with a
/// single space. A word longer than the width is never split.
pub fn fold_entry(name: &str, value: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = format!("{}:", name);
    let mut cur_has_word = false;

    for word in value.split_whitespace() {
        // the first word always stays on the name line
        if !cur_has_word || cur.len() + 1 + word.len() <= width {
            cur.push(' ');
            cur.push_str(word);
        } else {
            lines.push(std::mem::take(&mut cur));
            cur = format!(" {}", word);
        }
        cur_has_word = true;
    }
    lines.push(cur);
    lines
}

/// Render a [`BagInfo`] as tag-file text (one entry per value, in order).
pub fn format_baginfo(info: &BagInfo, width: usize) -> String {
    let mut out = String::new();
    for (name, values) in info {
        for value in values {
            for line in fold_entry(name, value, width) {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }
    out
}

/// One `fetch.txt` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub url: String,
    /// `None` when the file gives `-` (length unknown).
    pub length: Option<u64>,
    /// Bag-relative path of the fetched file.
    pub path: String,
}

/// Lazy parser over `fetch.txt` lines.
///
/// A malformed line ends iteration with a [`BagError::Format`].
pub struct FetchRecords<R: BufRead> {
    lines: Option<TagLines<R>>,
    file: String,
}

impl<R: BufRead> FetchRecords<R> {
    pub fn new(reader: R, file: impl Into<String>) -> Self {
        Self {
            lines: Some(TagLines::new(reader)),
            file: file.into(),
        }
    }

    pub(crate) fn empty(file: impl Into<String>) -> Self {
        Self {
            lines: None,
            file: file.into(),
        }
    }

    fn parse(&self, line: &str, line_number: usize) -> BagResult<FetchRecord> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let bad = |why: &str| BagError::Format {
            file: self.file.clone(),
            message: format!("line {}: {}: \"{}\"", line_number, why, line),
        };
        let [url, length, path] = parts.as_slice() else {
            return Err(bad("bad fetch line syntax"));
        };
        let length = match *length {
            "-" => None,
            n => Some(n.parse::<u64>().map_err(|_| bad("bad length"))?),
        };
        Ok(FetchRecord {
            url: url.to_string(),
            length,
            path: path.to_string(),
        })
    }
}

impl<R: BufRead> Iterator for FetchRecords<R> {
    type Item = BagResult<FetchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let lines = self.lines.as_mut()?;
            let item = match lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    let n = lines.line_number();
                    self.parse(&line, n)
                }
                Err(e) => Err(e),
            };
            if item.is_err() {
                self.lines = None;
            }
            return Some(item);
        }
    }
}
