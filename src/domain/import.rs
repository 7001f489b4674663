//! Bookkeeping for CSV contact imports.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{ContactListId, ImportId, UserId, code_enum};

code_enum! {
    ImportStatus {
        Pending => "PENDING",
        Processing => "PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

/// A row that could not be imported.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactImport {
    pub id: ImportId,
    pub user_id: UserId,
    pub file_name: String,
    pub status: ImportStatus,
    pub target_list_id: Option<ContactListId>,
    pub update_existing: bool,
    pub total_rows: i32,
    pub successful_imports: i32,
    pub failed_imports: i32,
    pub duplicate_skipped: i32,
    pub errors: Vec<ImportRowError>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl ContactImport {
    pub fn success_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            f64::from(self.successful_imports) / f64::from(self.total_rows) * 100.0
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContactImport {
    pub user_id: UserId,
    pub file_name: String,
    pub target_list_id: Option<ContactListId>,
    pub update_existing: bool,
}

/// Final counters written when an import run finishes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub total_rows: i32,
    pub successful_imports: i32,
    pub failed_imports: i32,
    pub duplicate_skipped: i32,
    pub errors: Vec<ImportRowError>,
}

impl ImportSummary {
    pub fn push_error(&mut self, row: usize, error: impl Into<String>, at: NaiveDateTime) {
        self.failed_imports += 1;
        self.errors.push(ImportRowError {
            row,
            error: error.into(),
            timestamp: at,
        });
    }
}
