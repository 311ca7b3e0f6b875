// Copyright 2024 Jurimatch AG
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The append-only audit log.
//!
//! One self-describing JSON record per line, one record per recommendation
//! and per offer state change. The log is the sole source of truth for the
//! learning-to-rank training dataset, so appends are synchronous and a failed
//! append propagates instead of being dropped.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jurimatch_scoring::{
    CaseId,
    Complexity,
    FeatureVector,
    LawyerId,
    Preset,
    SuccessStatus,
    WeightVector,
};

use crate::error::{PersistenceError, SetupError};

/// One line of the audit log.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditRecord {
    Recommend(RecommendRecord),
    Feedback(FeedbackRecord),
}

/// Emitted for each lawyer of a top-N ranking result, in result order.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RecommendRecord {
    pub case_id: CaseId,
    pub lawyer_id: LawyerId,
    pub features: FeatureVector,
    pub delta: FeatureVector,
    pub raw: f32,
    pub fair: f32,
    pub equity: f32,
    pub diversity_boost: f32,
    pub weights_used: WeightVector,
    pub preset: Preset,
    pub complexity: Complexity,
    pub success_status: SuccessStatus,
    pub timestamp: DateTime<Utc>,
}

/// Emitted on every offer state change after `pending`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FeedbackRecord {
    pub case_id: CaseId,
    pub lawyer_id: LawyerId,
    pub label: FeedbackLabel,
    pub raw: f32,
    pub fair: f32,
    pub timestamp: DateTime<Utc>,
}

/// The outcome label of an offer used as learning-to-rank relevance.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLabel {
    Accepted,
    Declined,
    Expired,
    Won,
    Lost,
}

impl FeedbackLabel {
    /// The relevance grade used for learning-to-rank training.
    pub fn relevance(self) -> u8 {
        match self {
            Self::Lost | Self::Expired => 0,
            Self::Declined => 1,
            Self::Accepted => 2,
            Self::Won => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

/// An append-only structured-event sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends all records or none.
    async fn append(&self, records: &[AuditRecord]) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T> AuditSink for std::sync::Arc<T>
where
    T: AuditSink + ?Sized,
{
    async fn append(&self, records: &[AuditRecord]) -> Result<(), PersistenceError> {
        (**self).append(records).await
    }
}

/// Collects records in memory, for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap(/* not poisoned */).clone()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn append(&self, records: &[AuditRecord]) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .unwrap(/* not poisoned */)
            .extend_from_slice(records);
        Ok(())
    }
}

/// Appends JSON lines to a durable log file.
#[derive(Debug)]
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self, SetupError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditSink for JsonLinesSink {
    async fn append(&self, records: &[AuditRecord]) -> Result<(), PersistenceError> {
        let mut lines = Vec::new();
        for record in records {
            serde_json::to_writer(&mut lines, record)?;
            lines.push(b'\n');
        }

        let mut file = self.file.lock().unwrap(/* not poisoned */);
        file.write_all(&lines)?;
        file.flush()?;

        Ok(())
    }
}

/// Configurations of the audit log.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Location of the JSON-lines log, in-memory collection if unset.
    pub file: Option<PathBuf>,
}

impl Config {
    pub(crate) fn setup(&self) -> Result<Box<dyn AuditSink>, SetupError> {
        Ok(match &self.file {
            Some(path) => Box::new(JsonLinesSink::create(path)?),
            None => Box::new(MemorySink::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(label: FeedbackLabel) -> AuditRecord {
        AuditRecord::Feedback(FeedbackRecord {
            case_id: CaseId::from("case_1"),
            lawyer_id: LawyerId::from("adv_1"),
            label,
            raw: 0.6,
            fair: 0.7,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn test_relevance_grades() {
        assert_eq!(FeedbackLabel::Lost.relevance(), 0);
        assert_eq!(FeedbackLabel::Expired.relevance(), 0);
        assert_eq!(FeedbackLabel::Declined.relevance(), 1);
        assert_eq!(FeedbackLabel::Accepted.relevance(), 2);
        assert_eq!(FeedbackLabel::Won.relevance(), 3);
    }

    #[tokio::test]
    async fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::default();
        sink.append(&[feedback(FeedbackLabel::Accepted)])
            .await
            .unwrap();
        sink.append(&[feedback(FeedbackLabel::Won)]).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(matches!(
            &records[0],
            AuditRecord::Feedback(record) if record.label == FeedbackLabel::Accepted,
        ));
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = JsonLinesSink::create(&path).unwrap();

        sink.append(&[
            feedback(FeedbackLabel::Accepted),
            feedback(FeedbackLabel::Won),
        ])
        .await
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let record = serde_json::from_str::<AuditRecord>(line).unwrap();
            assert!(matches!(record, AuditRecord::Feedback(_)));
        }
    }
}
