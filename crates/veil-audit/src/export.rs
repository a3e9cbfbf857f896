//! Audit export formats
//!
//! Tabular rows follow RFC 4180: each field is wrapped in double quotes and
//! any double quote inside a field is doubled, so commas, quotes and line
//! breaks inside the details never break the row structure.

use serde::{Deserialize, Serialize};

use crate::entry::AuditEntry;
use crate::Result;

pub const TABULAR_HEADER: &str = "timestamp,domain,capability,status,type,details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless JSON array of entries
    #[default]
    Structured,
    /// CSV with one header row
    Tabular,
}

impl ExportFormat {
    /// Unrecognized names fall back to [`ExportFormat::Structured`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" | "structured" => ExportFormat::Structured,
            "csv" | "tabular" => ExportFormat::Tabular,
            other => {
                tracing::warn!(format = %other, "Unknown export format, using structured");
                ExportFormat::Structured
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Structured => "structured",
            ExportFormat::Tabular => "tabular",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub(crate) fn render<'a, I>(format: ExportFormat, entries: I) -> Result<String>
where
    I: IntoIterator<Item = &'a AuditEntry>,
{
    match format {
        ExportFormat::Structured => {
            let entries: Vec<&AuditEntry> = entries.into_iter().collect();
            Ok(serde_json::to_string_pretty(&entries)?)
        }
        ExportFormat::Tabular => {
            let mut out = String::from(TABULAR_HEADER);
            out.push('\n');

            for entry in entries {
                let row = [
                    entry.timestamp.to_rfc3339(),
                    entry.domain.clone(),
                    entry.capability.clone(),
                    entry.status.to_string(),
                    entry.event_type.to_string(),
                    serde_json::to_string(&entry.details)?,
                ];
                let quoted: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
                out.push_str(&quoted.join(","));
                out.push('\n');
            }

            Ok(out)
        }
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
