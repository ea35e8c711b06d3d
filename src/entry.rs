//! Lines of a `.sqlog` file. Every line is one JSON object tagged by `kind`,
//! so a file can be read back sequentially even if the process died with
//! sections still open.

use crate::level::Level;
use crate::uniq_id::SectionID;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    Open(OpenEntry),
    Record(RecordEntry),
    Close(CloseEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub id: SectionID,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SectionID>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Innermost open section of the writing stack, `None` at top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<SectionID>,
    pub level: Level,
    pub logger: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<RefEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefEntry {
    pub id: SectionID,
    pub label: String,
    /// Set only when the section lives in another log file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub id: SectionID,
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl Entry {
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize log entry")
    }

    pub fn from_json_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).with_context(|| format!("malformed log entry: {}", line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9::*;

    #[test]
    fn json_shape() -> Result<()> {
        let open = Entry::Open(OpenEntry {
            ts: None,
            id: 2,
            parent: Some(1),
            label: "<b>Start</b>".into(),
        });
        let record = Entry::Record(RecordEntry {
            ts: Some("<redacted>".into()),
            section: Some(2),
            level: Level::Info,
            logger: "test".into(),
            message: "2 ** 2 = 4".into(),
            refs: vec![
                RefEntry {
                    id: 1,
                    label: "Common".into(),
                    file: None,
                },
                RefEntry {
                    id: 1,
                    label: "Other".into(),
                    file: Some("log/other.sqlog".into()),
                },
            ],
        });
        let close = Entry::Close(CloseEntry {
            ts: None,
            id: 2,
            header: "<b>Start</b><delim>done".into(),
            elapsed_ms: None,
        });

        let lines = [&open, &record, &close]
            .iter()
            .map(|e| e.to_json_line())
            .collect::<Result<Vec<_>>>()?
            .join("\n");

        snapshot!(
            lines,
            r#"
{"kind":"open","id":2,"parent":1,"label":"<b>Start</b>"}
{"kind":"record","ts":"<redacted>","section":2,"level":"INFO","logger":"test","message":"2 ** 2 = 4","refs":[{"id":1,"label":"Common"},{"id":1,"label":"Other","file":"log/other.sqlog"}]}
{"kind":"close","id":2,"header":"<b>Start</b><delim>done"}
"#
        );

        assert_eq!(Entry::from_json_line(&record.to_json_line()?)?, record);
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        let err = Entry::from_json_line("{\"kind\":\"nope\"}").unwrap_err();
        assert!(format!("{:?}", err).contains("malformed log entry"));
    }
}
