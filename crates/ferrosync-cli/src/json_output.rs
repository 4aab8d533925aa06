//! JSON output structures for the ferrosync CLI

use ferrosync_sync::SyncReport;
use ferrosync_types::{Error, SyncMode, SyncOptions};
use serde::{Deserialize, Serialize};

/// Complete JSON output for a push or pull
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Counters of the run; absent when it aborted
    pub report: Option<SyncReport>,
    /// Overall result
    pub result: OperationResult,
}

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// ferrosync version
    pub version: String,
    /// "push" or "pull"
    pub operation: String,
    /// Whether sources were deleted after transfer
    #[serde(rename = "move")]
    pub is_move: bool,
    /// Timestamp when the output was produced
    pub timestamp: String,
    /// Local root
    pub local_root: String,
    /// Remote root
    pub remote_root: String,
}

/// Overall result
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the run finished
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// Error kind of a fatal failure
    pub error_kind: Option<String>,
}

impl SyncResultJson {
    /// Build the output of a run that ended with `outcome`
    pub fn new(
        local_root: &str,
        remote_root: &str,
        options: SyncOptions,
        outcome: &Result<SyncReport, Error>,
    ) -> Self {
        let metadata = OperationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            operation: match options.mode {
                SyncMode::Push => "push".to_string(),
                SyncMode::Pull => "pull".to_string(),
            },
            is_move: options.is_move(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            local_root: local_root.to_string(),
            remote_root: remote_root.to_string(),
        };

        let (report, result) = match outcome {
            Ok(report) => {
                let message = if report.errors == 0 {
                    format!("{} files transferred", report.transferred())
                } else {
                    format!(
                        "{} files transferred, {} failed",
                        report.transferred(),
                        report.errors
                    )
                };
                (
                    Some(report.clone()),
                    OperationResult {
                        success: true,
                        message,
                        error_kind: None,
                    },
                )
            }
            Err(e) => (
                None,
                OperationResult {
                    success: false,
                    message: e.to_string(),
                    error_kind: Some(format!("{:?}", e.kind())),
                },
            ),
        };

        Self {
            metadata,
            report,
            result,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
