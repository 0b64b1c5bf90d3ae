//! Record-linkage reconciliation of imported roster rows.
//!
//! Rows are matched against a snapshot of one roster pool using two keys,
//! `external_id` and `email`. The reconciler is pure: it returns what should
//! be written and leaves persistence to the caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::membership::{initial_status, refresh_status};
use crate::models::course::Course;
use crate::models::roster::{IdentityRecord, LifecycleStatus, RosterKind, RosterRow};

/// Why a row could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// The row's external id and email point at two different records.
    AmbiguousIdentity { id_match: String, email_match: String },
    /// The row carries neither key.
    MissingIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row: RosterRow,
    #[serde(flatten)]
    pub reason: RejectionReason,
}

#[derive(Debug, Default, Clone)]
pub struct BatchResult {
    pub inserted: Vec<IdentityRecord>,
    pub updated: Vec<IdentityRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl BatchResult {
    /// True when the batch may be persisted.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn touched(&self) -> impl Iterator<Item = &IdentityRecord> {
        self.inserted.iter().chain(self.updated.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touch {
    Inserted,
    Updated,
}

/// Snapshot records plus both key indexes, kept consistent as rows apply.
struct WorkingIndex {
    records: Vec<IdentityRecord>,
    by_external_id: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
    touched: Vec<(usize, Touch)>,
}

impl WorkingIndex {
    fn new(snapshot: &[IdentityRecord]) -> Self {
        let records = snapshot.to_vec();
        let mut by_external_id = HashMap::new();
        let mut by_email = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            if let Some(ext) = &record.external_id {
                by_external_id.insert(ext.clone(), idx);
            }
            if let Some(email) = &record.email {
                by_email.insert(email.to_lowercase(), idx);
            }
        }
        Self {
            records,
            by_external_id,
            by_email,
            touched: Vec::new(),
        }
    }

    fn mark(&mut self, idx: usize, touch: Touch) {
        if !self.touched.iter().any(|(i, _)| *i == idx) {
            self.touched.push((idx, touch));
        }
    }

    fn set_external_id(&mut self, idx: usize, external_id: &str) {
        if let Some(old) = self.records[idx].external_id.take() {
            self.by_external_id.remove(&old);
        }
        self.records[idx].external_id = Some(external_id.to_string());
        self.by_external_id.insert(external_id.to_string(), idx);
    }

    fn set_email(&mut self, idx: usize, email: &str) {
        if let Some(old) = self.records[idx].email.take() {
            self.by_email.remove(&old);
        }
        self.records[idx].email = Some(email.to_string());
        self.by_email.insert(email.to_string(), idx);
    }

    fn insert(&mut self, record: IdentityRecord) -> usize {
        let idx = self.records.len();
        if let Some(ext) = &record.external_id {
            self.by_external_id.insert(ext.clone(), idx);
        }
        if let Some(email) = &record.email {
            self.by_email.insert(email.clone(), idx);
        }
        self.records.push(record);
        self.mark(idx, Touch::Inserted);
        idx
    }

    fn into_result(self, rejected: Vec<RejectedRow>) -> BatchResult {
        let mut result = BatchResult {
            rejected,
            ..Default::default()
        };
        let mut records: Vec<Option<IdentityRecord>> =
            self.records.into_iter().map(Some).collect();
        for (idx, touch) in self.touched {
            if let Some(record) = records[idx].take() {
                match touch {
                    Touch::Inserted => result.inserted.push(record),
                    Touch::Updated => result.updated.push(record),
                }
            }
        }
        result
    }
}

/// Stateless matching and merge engine.
pub struct Reconciler;

impl Reconciler {
    /// Merge `rows` into `snapshot`, the current records of `(course, kind)`.
    ///
    /// Every matched or created record takes `target` as its lifecycle status.
    /// When `rejected` is non-empty nothing in the result should be persisted.
    pub fn reconcile(
        course: &Course,
        kind: RosterKind,
        snapshot: &[IdentityRecord],
        rows: &[RosterRow],
        target: LifecycleStatus,
    ) -> BatchResult {
        let now = Utc::now();
        let mut index = WorkingIndex::new(snapshot);
        let mut rejected = Vec::new();

        for raw in rows {
            let row = raw.normalized();
            if row.external_id.is_none() && row.email.is_none() {
                rejected.push(RejectedRow {
                    row: raw.clone(),
                    reason: RejectionReason::MissingIdentity,
                });
                continue;
            }

            let by_id = row
                .external_id
                .as_ref()
                .and_then(|e| index.by_external_id.get(e).copied());
            let by_email = row
                .email
                .as_ref()
                .and_then(|m| index.by_email.get(m).copied());

            match (by_id, by_email) {
                (Some(a), Some(b)) if a != b => {
                    rejected.push(RejectedRow {
                        row: raw.clone(),
                        reason: RejectionReason::AmbiguousIdentity {
                            id_match: index.records[a].id.clone(),
                            email_match: index.records[b].id.clone(),
                        },
                    });
                }
                (Some(idx), _) => {
                    merge(&mut index, idx, &row, course, target, now);
                }
                (None, Some(idx)) => {
                    if let Some(ext) = &row.external_id {
                        index.set_external_id(idx, ext);
                    }
                    merge(&mut index, idx, &row, course, target, now);
                }
                (None, None) => {
                    index.insert(new_record(course, kind, &row, target, now));
                }
            }
        }

        index.into_result(rejected)
    }
}

fn merge(
    index: &mut WorkingIndex,
    idx: usize,
    row: &RosterRow,
    course: &Course,
    target: LifecycleStatus,
    now: DateTime<Utc>,
) {
    if let Some(email) = &row.email {
        index.set_email(idx, email);
    }
    let record = &mut index.records[idx];
    record.first_name = row.first_name.clone();
    record.last_name = row.last_name.clone();
    record.lifecycle_status = target;
    record.org_status = refresh_status(record.org_status, course);
    record.updated_at = now;
    index.mark(idx, Touch::Updated);
}

fn new_record(
    course: &Course,
    kind: RosterKind,
    row: &RosterRow,
    target: LifecycleStatus,
    now: DateTime<Utc>,
) -> IdentityRecord {
    IdentityRecord {
        id: Uuid::new_v4().to_string(),
        course_id: course.id.clone(),
        kind,
        external_id: row.external_id.clone(),
        email: row.email.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        github_id: None,
        github_login: None,
        lifecycle_status: target,
        org_status: initial_status(course),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::roster::OrgStatus;

    fn course() -> Course {
        Course::new("cs101", "Intro to CS")
    }

    fn linked() -> Course {
        let mut c = course();
        c.installation_ref = Some("77".to_string());
        c.external_org_ref = Some("cs101-org".to_string());
        c
    }

    fn existing(id: &str, ext: Option<&str>, email: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            id: id.to_string(),
            course_id: "cs101".to_string(),
            kind: RosterKind::Student,
            external_id: ext.map(String::from),
            email: email.map(String::from),
            first_name: "Old".to_string(),
            last_name: "Name".to_string(),
            github_id: None,
            github_login: None,
            lifecycle_status: LifecycleStatus::Active,
            org_status: OrgStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn run(snapshot: &[IdentityRecord], rows: &[RosterRow]) -> BatchResult {
        Reconciler::reconcile(
            &course(),
            RosterKind::Student,
            snapshot,
            rows,
            LifecycleStatus::Active,
        )
    }

    #[test]
    fn single_row_into_empty_unlinked_course() {
        let rows = vec![RosterRow::new(Some("A1"), Some("a@x.edu"), "Ada", "L")];
        let result = run(&[], &rows);

        assert!(result.is_clean());
        assert!(result.updated.is_empty());
        assert_eq!(result.inserted.len(), 1);
        let r = &result.inserted[0];
        assert_eq!(r.external_id.as_deref(), Some("A1"));
        assert_eq!(r.email.as_deref(), Some("a@x.edu"));
        assert_eq!(r.lifecycle_status, LifecycleStatus::Active);
        assert_eq!(r.org_status, OrgStatus::Pending);
        assert!(Uuid::parse_str(&r.id).is_ok());
    }

    #[test]
    fn new_records_in_linked_course_are_self_join_eligible() {
        let rows = vec![RosterRow::new(Some("A1"), None, "Ada", "L")];
        let result = Reconciler::reconcile(
            &linked(),
            RosterKind::Staff,
            &[],
            &rows,
            LifecycleStatus::Active,
        );
        assert_eq!(result.inserted[0].org_status, OrgStatus::SelfJoinEligible);
        assert_eq!(result.inserted[0].kind, RosterKind::Staff);
    }

    #[test]
    fn reimport_is_idempotent() {
        let rows = vec![
            RosterRow::new(Some("A1"), Some("a@x.edu"), "Ada", "L"),
            RosterRow::new(Some("B2"), None, "Bob", "M"),
            RosterRow::new(None, Some("c@x.edu"), "Cy", "N"),
        ];
        let first = run(&[], &rows);
        assert_eq!(first.inserted.len(), 3);

        let second = run(&first.inserted, &rows);
        assert!(second.is_clean());
        assert!(second.inserted.is_empty());
        assert_eq!(second.updated.len(), 3);
        for record in &second.updated {
            let before = first.inserted.iter().find(|r| r.id == record.id).unwrap();
            assert_eq!(before.external_id, record.external_id);
            assert_eq!(before.email, record.email);
            assert_eq!(before.first_name, record.first_name);
            assert_eq!(before.lifecycle_status, record.lifecycle_status);
            assert_eq!(before.org_status, record.org_status);
        }
    }

    #[test]
    fn cross_matching_row_is_rejected() {
        let snapshot = vec![
            existing("R1", Some("X"), Some("p@q")),
            existing("R2", Some("Y"), Some("r@s")),
        ];
        let rows = vec![RosterRow::new(Some("X"), Some("r@s"), "Mix", "Up")];
        let result = run(&snapshot, &rows);

        assert!(!result.is_clean());
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].row, rows[0]);
        assert_eq!(
            result.rejected[0].reason,
            RejectionReason::AmbiguousIdentity {
                id_match: "R1".to_string(),
                email_match: "R2".to_string(),
            }
        );
        assert!(result.inserted.is_empty());
        assert!(result.updated.is_empty());
    }

    #[test]
    fn all_conflicts_are_reported() {
        let snapshot = vec![
            existing("R1", Some("X"), Some("p@q")),
            existing("R2", Some("Y"), Some("r@s")),
        ];
        let rows = vec![
            RosterRow::new(Some("X"), Some("r@s"), "A", "A"),
            RosterRow::new(Some("Z"), Some("z@z"), "ok", "ok"),
            RosterRow::new(Some("Y"), Some("p@q"), "B", "B"),
        ];
        let result = run(&snapshot, &rows);
        assert_eq!(result.rejected.len(), 2);
        assert_eq!(result.rejected[1].row, rows[2]);
    }

    #[test]
    fn email_match_rekeys_external_id() {
        let snapshot = vec![existing("R1", Some("OLD"), Some("a@x.edu"))];
        let rows = vec![RosterRow::new(Some("NEW"), Some("A@X.edu"), "Ada", "L")];
        let result = run(&snapshot, &rows);

        assert!(result.inserted.is_empty());
        assert_eq!(result.updated.len(), 1);
        let r = &result.updated[0];
        assert_eq!(r.id, "R1");
        assert_eq!(r.external_id.as_deref(), Some("NEW"));
        assert_eq!(r.first_name, "Ada");
    }

    #[test]
    fn email_match_without_external_id_keeps_key() {
        let snapshot = vec![existing("R1", Some("OLD"), Some("a@x.edu"))];
        let rows = vec![RosterRow::new(None, Some("a@x.edu"), "Ada", "L")];
        let result = run(&snapshot, &rows);
        assert_eq!(result.updated[0].external_id.as_deref(), Some("OLD"));
    }

    #[test]
    fn external_id_match_merges_email_only_when_present() {
        let snapshot = vec![
            existing("R1", Some("A1"), Some("old@x.edu")),
            existing("R2", Some("B2"), Some("keep@x.edu")),
        ];
        let rows = vec![
            RosterRow::new(Some("A1"), Some("new@x.edu"), "Ada", "L"),
            RosterRow::new(Some("B2"), None, "Bob", "M"),
        ];
        let result = run(&snapshot, &rows);
        assert_eq!(result.updated[0].email.as_deref(), Some("new@x.edu"));
        assert_eq!(result.updated[1].email.as_deref(), Some("keep@x.edu"));
    }

    #[test]
    fn row_without_keys_is_rejected() {
        let rows = vec![RosterRow::new(Some("  "), None, "No", "Keys")];
        let result = run(&[], &rows);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].reason, RejectionReason::MissingIdentity);
    }

    #[test]
    fn duplicate_rows_last_write_wins() {
        let rows = vec![
            RosterRow::new(Some("A1"), None, "Ada", "First"),
            RosterRow::new(Some("A1"), Some("a@x.edu"), "Ada", "Second"),
        ];
        let result = run(&[], &rows);
        assert!(result.is_clean());
        assert_eq!(result.inserted.len(), 1);
        assert!(result.updated.is_empty());
        assert_eq!(result.inserted[0].last_name, "Second");
        assert_eq!(result.inserted[0].email.as_deref(), Some("a@x.edu"));
    }

    #[test]
    fn working_index_follows_new_email() {
        let snapshot = vec![existing("R1", Some("A1"), Some("old@x.edu"))];
        let rows = vec![
            RosterRow::new(Some("A1"), Some("new@x.edu"), "Ada", "L"),
            RosterRow::new(None, Some("old@x.edu"), "Someone", "Else"),
            RosterRow::new(None, Some("new@x.edu"), "Ada", "Final"),
        ];
        let result = run(&snapshot, &rows);
        assert!(result.is_clean());
        // old@x.edu was released by the first row, so it becomes a new record.
        assert_eq!(result.inserted.len(), 1);
        assert_eq!(result.inserted[0].email.as_deref(), Some("old@x.edu"));
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.updated[0].last_name, "Final");
    }

    #[test]
    fn matched_records_never_regress_linked_status() {
        let mut member = existing("R1", Some("A1"), None);
        member.org_status = OrgStatus::Member;
        member.lifecycle_status = LifecycleStatus::Dropped;
        let rows = vec![RosterRow::new(Some("A1"), None, "Ada", "L")];
        let result = run(&[member], &rows);
        assert_eq!(result.updated[0].org_status, OrgStatus::Member);
        assert_eq!(result.updated[0].lifecycle_status, LifecycleStatus::Active);
    }

    #[test]
    fn pending_records_follow_installation_on_update() {
        let snapshot = vec![existing("R1", Some("A1"), None)];
        let rows = vec![RosterRow::new(Some("A1"), None, "Ada", "L")];
        let result = Reconciler::reconcile(
            &linked(),
            RosterKind::Student,
            &snapshot,
            &rows,
            LifecycleStatus::Active,
        );
        assert_eq!(result.updated[0].org_status, OrgStatus::SelfJoinEligible);
    }

    #[test]
    fn rejected_rows_serialize_with_reason_tag() {
        let rejected = RejectedRow {
            row: RosterRow::new(Some("X"), Some("r@s"), "A", "B"),
            reason: RejectionReason::AmbiguousIdentity {
                id_match: "R1".into(),
                email_match: "R2".into(),
            },
        };
        let json = serde_json::to_value(&rejected).unwrap();
        assert_eq!(json["reason"], "ambiguous_identity");
        assert_eq!(json["id_match"], "R1");
        assert_eq!(json["row"]["externalId"], "X");
    }
}
