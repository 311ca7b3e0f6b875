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

//! Export of the learning-to-rank training dataset.
//!
//! Flattens the audit log into one CSV row per feedback record, joining the
//! recommendation features of the same (case, lawyer) pair with the outcome
//! relevance grade. The offline training job consumes this file and writes a
//! new weight snapshot back.

use std::{
    collections::HashMap,
    io::{BufRead, Write},
};

use displaydoc::Display;
use thiserror::Error;
use tracing::warn;

use jurimatch_scoring::{CaseId, FeatureVector, LawyerId};

use crate::audit::AuditRecord;

/// Errors of the dataset export.
#[derive(Debug, Display, Error)]
pub enum ExportError {
    /// Reading the audit log failed: {0}
    Io(#[from] std::io::Error),
    /// Writing the dataset failed: {0}
    Csv(#[from] csv::Error),
}

const HEADER: [&str; 12] = [
    "case_id", "lawyer_id", "f_A", "f_S", "f_T", "f_G", "f_Q", "f_U", "f_R", "f_C", "label",
    "relevance",
];

/// Exports the dataset, returns the number of training rows written.
///
/// Malformed log lines and feedback without a preceding recommendation are
/// skipped with a warning, mirroring a best-effort ETL over a long-lived log.
pub fn export_dataset(
    reader: impl BufRead,
    writer: impl Write,
) -> Result<usize, ExportError> {
    let mut features = HashMap::<(CaseId, LawyerId), FeatureVector>::new();
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    let mut rows = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<AuditRecord>(&line) {
            Ok(record) => record,
            Err(error) => {
                warn!(%error, "skipping malformed audit line");
                continue;
            }
        };

        match record {
            AuditRecord::Recommend(recommend) => {
                features.insert(
                    (recommend.case_id, recommend.lawyer_id),
                    recommend.features,
                );
            }
            AuditRecord::Feedback(feedback) => {
                let key = (feedback.case_id, feedback.lawyer_id);
                let Some(features) = features.get(&key) else {
                    warn!(
                        case_id = %key.0,
                        lawyer_id = %key.1,
                        "skipping feedback without recommendation features",
                    );
                    continue;
                };

                csv.write_record([
                    key.0.to_string(),
                    key.1.to_string(),
                    features.a.to_string(),
                    features.s.to_string(),
                    features.t.to_string(),
                    features.g.to_string(),
                    features.q.to_string(),
                    features.u.to_string(),
                    features.r.to_string(),
                    features.c.to_string(),
                    feedback.label.as_str().to_string(),
                    feedback.label.relevance().to_string(),
                ])?;
                rows += 1;
            }
        }
    }
    csv.flush()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::Utc;

    use super::*;
    use crate::audit::{FeedbackLabel, FeedbackRecord, RecommendRecord};
    use jurimatch_scoring::{Complexity, Preset, SuccessStatus, WeightVector};

    fn recommend(case: &str, lawyer: &str) -> String {
        let record = AuditRecord::Recommend(RecommendRecord {
            case_id: CaseId::from(case),
            lawyer_id: LawyerId::from(lawyer),
            features: FeatureVector {
                a: 1.,
                s: 0.5,
                ..FeatureVector::default()
            },
            delta: FeatureVector::default(),
            raw: 0.4,
            fair: 0.6,
            equity: 0.7,
            diversity_boost: 0.,
            weights_used: WeightVector::default(),
            preset: Preset::Balanced,
            complexity: Complexity::Medium,
            success_status: SuccessStatus::V,
            timestamp: Utc::now(),
        });

        serde_json::to_string(&record).unwrap()
    }

    fn feedback(case: &str, lawyer: &str, label: FeedbackLabel) -> String {
        let record = AuditRecord::Feedback(FeedbackRecord {
            case_id: CaseId::from(case),
            lawyer_id: LawyerId::from(lawyer),
            label,
            raw: 0.4,
            fair: 0.6,
            timestamp: Utc::now(),
        });

        serde_json::to_string(&record).unwrap()
    }

    #[test]
    fn test_export_joins_features_with_labels() {
        let log = [
            recommend("case_1", "adv_1"),
            recommend("case_1", "adv_2"),
            feedback("case_1", "adv_1", FeedbackLabel::Accepted),
            feedback("case_1", "adv_2", FeedbackLabel::Declined),
            feedback("case_1", "adv_1", FeedbackLabel::Won),
        ]
        .join("\n");

        let mut out = Vec::new();
        let rows = export_dataset(Cursor::new(log), &mut out).unwrap();
        assert_eq!(rows, 3);

        let csv = String::from_utf8(out).unwrap();
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("case_id,lawyer_id,f_A"));
        assert!(lines[1].starts_with("case_1,adv_1,1,0.5"));
        assert!(lines[1].ends_with("accepted,2"));
        assert!(lines[2].ends_with("declined,1"));
        assert!(lines[3].ends_with("won,3"));
    }

    #[test]
    fn test_export_skips_junk_and_orphans() {
        let log = [
            "not json at all".to_string(),
            feedback("case_1", "adv_9", FeedbackLabel::Expired),
        ]
        .join("\n");

        let mut out = Vec::new();
        let rows = export_dataset(Cursor::new(log), &mut out).unwrap();
        assert_eq!(rows, 0);
    }
}
