//! Adherence report export for the PDF report generator and spreadsheets.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::MedicationStatsReport;

/// Current export format version.
pub const FORMAT_VERSION: &str = "1.0";

/// A statistics report with integrity metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportExport {
    /// Export metadata
    pub metadata: ReportMetadata,
    /// The exported report
    pub report: MedicationStatsReport,
}

/// Report export metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    /// Export format version
    pub format_version: String,
    /// Export timestamp
    pub exported_at: String,
    /// Hash algorithm used
    pub hash_algorithm: String,
    /// Hex digest of the compact JSON encoding of the report
    pub content_hash: String,
    /// Care group the report covers
    pub group_id: String,
    /// Patient the report was narrowed to
    pub patient_id: Option<String>,
}

impl ReportExport {
    /// Wrap a report, hashing its content.
    pub fn from_report(
        report: MedicationStatsReport,
        group_id: impl Into<String>,
        patient_id: Option<String>,
    ) -> Result<Self, serde_json::Error> {
        let content_hash = hash_report(&report)?;
        Ok(Self {
            metadata: ReportMetadata {
                format_version: FORMAT_VERSION.to_string(),
                exported_at: chrono::Utc::now().to_rfc3339(),
                hash_algorithm: "SHA-256".to_string(),
                content_hash,
                group_id: group_id.into(),
                patient_id,
            },
            report,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a previously exported JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the report still matches the recorded content hash.
    pub fn verify_content_hash(&self) -> Result<bool, serde_json::Error> {
        Ok(hash_report(&self.report)? == self.metadata.content_hash)
    }

    /// Export to CSV format, one row per medicine.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("medicine_name,total_doses,taken,skipped,pending,adherence_rate,total_amount,unit,period_start,period_end\n");

        let period = &self.report.period;
        for medicine in &self.report.medicines {
            csv.push_str(&format!(
                "{},{},{},{},{},{:.1},{},{},{},{}\n",
                escape_csv(&medicine.medicine_name),
                medicine.total_doses,
                medicine.taken_count,
                medicine.skipped_count,
                medicine.pending_count,
                medicine.adherence_rate,
                medicine.total_amount,
                escape_csv(&medicine.unit),
                period.start_date,
                period.end_date,
            ));
        }

        csv
    }
}

/// SHA-256 of the compact JSON encoding of `report`, hex encoded.
pub fn hash_report(report: &MedicationStatsReport) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(report)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
