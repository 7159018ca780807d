//! Unified record format and newline-delimited JSON I/O.
//!
//! Every dataset (QA, fact verification, entity linking, ...) is converted to
//! one record per line. A record carries a query (`input`) and a list of
//! acceptable outputs, each of which may hold an answer string and a list of
//! provenance entries pointing at spans inside knowledge-source pages.
//! Multiple outputs are alternatives: a prediction succeeds if it matches any
//! one of them.
//!
//! # File format
//!
//! ```text
//! {"id": "q1", "input": "who wrote Dune", "output": [{"answer": "Frank Herbert",
//!  "provenance": [{"wikipedia_id": "8698", "title": "Dune (novel)", ...}]}]}
//! ```
//!
//! One JSON object per line, no binary framing. Parse errors carry the
//! 1-based line number of the offending record.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// A single benchmark datapoint: one query with its acceptable outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within a file.
    pub id: String,
    /// Query text.
    pub input: String,
    /// Alternative acceptable outputs (OR semantics).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<Output>,
    /// Dataset-specific metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// One acceptable answer/evidence combination for a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Output {
    /// Answer in textual form, when the task has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Citations justifying this answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
    /// Output-level metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// A structured citation pointing at a span within a knowledge-source page.
///
/// Span fields use `-1` in published corpora when a span could not be
/// located, so they are kept as plain integers rather than indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Knowledge-source page id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_id: Option<String>,
    /// Knowledge-source page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Section heading inside the page, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Paragraph index where the span starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_paragraph_id: Option<i64>,
    /// Character offset of the span start within its paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_character: Option<i64>,
    /// Paragraph index where the span ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_paragraph_id: Option<i64>,
    /// Character offset of the span end within its paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_character: Option<i64>,
    /// Span-match confidence: 1.0 for exact matches, lower for fuzzy ones,
    /// -1.0 when matching failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bleu_score: Option<f64>,
    /// Paragraph text, when the producer chose to inline it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Provenance-level metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Any additional identifier fields (e.g. dataset-specific keys usable
    /// with `--rank-keys`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Provenance {
    /// Returns the stringified, trimmed value of a rank-key field.
    ///
    /// Known fields are looked up directly; anything else is resolved
    /// against the flattened extras. Returns `None` when the field is absent,
    /// in which case the provenance entry cannot contribute to ranking.
    pub fn rank_value(&self, key: &str) -> Option<String> {
        let trimmed = |s: &str| s.trim().to_string();
        match key {
            "wikipedia_id" => self.wikipedia_id.as_deref().map(trimmed),
            "title" => self.title.as_deref().map(trimmed),
            "section" => self.section.as_deref().map(trimmed),
            "start_paragraph_id" => self.start_paragraph_id.map(|v| v.to_string()),
            "end_paragraph_id" => self.end_paragraph_id.map(|v| v.to_string()),
            _ => self.extra.get(key).and_then(|v| match v {
                Value::String(s) => Some(trimmed(s)),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }),
        }
    }
}

impl Record {
    /// Collects the distinct non-empty gold answer strings across all
    /// alternative outputs, trimmed.
    pub fn gold_answers(&self) -> Vec<String> {
        let mut answers: Vec<String> = Vec::new();
        for output in &self.output {
            if let Some(answer) = output.answer.as_deref() {
                let answer = answer.trim();
                if !answer.is_empty() && !answers.iter().any(|a| a == answer) {
                    answers.push(answer.to_string());
                }
            }
        }
        answers
    }

    /// Checks the structural conventions a well-formed gold datapoint obeys:
    /// non-empty output list, and every provenance entry carrying a page id
    /// and title. Violations are logged and make the record unusable for
    /// retrieval, but are not fatal to a run.
    pub fn validate(&self) -> bool {
        if self.output.is_empty() {
            warn!(id = %self.id, "empty output");
            return false;
        }
        for output in &self.output {
            for provenance in &output.provenance {
                if provenance.wikipedia_id.is_none() {
                    warn!(id = %self.id, "provenance without wikipedia_id");
                    return false;
                }
                if provenance.title.is_none() {
                    warn!(id = %self.id, "provenance without title");
                    return false;
                }
            }
        }
        true
    }
}

/// A knowledge-source page: an ordered list of paragraphs with a stable id.
///
/// Immutable once loaded; owned by the knowledge-source collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable page id.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Paragraph texts in page order.
    pub paragraphs: Vec<String>,
}

/// Loads a newline-delimited JSON record file.
///
/// Blank lines are skipped. The first malformed line aborts the load with
/// its line number.
pub fn load_records(path: &Path) -> Result<Vec<Record>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| DataError::Parse {
            path: path.display().to_string(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Writes records as newline-delimited JSON, one record per line.
pub fn store_records(path: &Path, records: &[Record]) -> Result<(), DataError> {
    let file = File::create(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    for (idx, record) in records.iter().enumerate() {
        let line = serde_json::to_string(record).map_err(|source| DataError::Parse {
            path: path.display().to_string(),
            line: idx + 1,
            source,
        })?;
        writer.write_all(line.as_bytes()).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        writer.write_all(b"\n").map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    writer.flush().map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}
