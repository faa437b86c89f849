//! Structured diffing of employee month records
//!
//! Compares the tracked fields of a record before and after an update and
//! reduces the difference to atomic changes. Each tracked field has a
//! declared comparison kind; the dispatch table below is the single place
//! a new tracked field gets registered. Floats compare with a tolerance
//! to absorb serialization round-trips.

use crate::attendance;
use crate::db::models::{EmployeeMonthRecord, PayItem};
use crate::tracking::types::{AtomicChange, ChangeField, ChangeType};
use crate::utils::time;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Float comparison tolerance
pub const FLOAT_EPSILON: f64 = 1e-9;

/// How a tracked field is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Positional string array (attendance day-codes)
    StringArray,
    /// Keyed object array (payment lists)
    ObjectArray,
    /// Scalar compared with tolerance
    Number,
}

/// Dispatch entry for one tracked field
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub field: ChangeField,
    pub kind: FieldKind,
}

/// Tracked fields in diff order
pub const TRACKED_FIELDS: [FieldDescriptor; 4] = [
    FieldDescriptor {
        field: ChangeField::Attendance,
        kind: FieldKind::StringArray,
    },
    FieldDescriptor {
        field: ChangeField::Payouts,
        kind: FieldKind::ObjectArray,
    },
    FieldDescriptor {
        field: ChangeField::AdditionalReqPays,
        kind: FieldKind::ObjectArray,
    },
    FieldDescriptor {
        field: ChangeField::Rate,
        kind: FieldKind::Number,
    },
];

/// The tracked subset of a record, captured before and after an update
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSnapshot {
    pub attendance: Vec<String>,
    pub payouts: Vec<PayItem>,
    pub additional_req_pays: Vec<PayItem>,
    pub rate: f64,
}

impl From<&EmployeeMonthRecord> for TrackedSnapshot {
    fn from(record: &EmployeeMonthRecord) -> Self {
        Self {
            attendance: record.attendance.clone(),
            payouts: record.payouts.clone(),
            additional_req_pays: record.additional_req_pays.clone(),
            rate: record.rate,
        }
    }
}

/// A single changed sub-field of a payment item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

/// Diff two snapshots of the same (month, year) record
///
/// Returns one [`AtomicChange`] per detected change, in tracked-field
/// order. Identical snapshots yield an empty vec.
pub fn diff(
    old: &TrackedSnapshot,
    new: &TrackedSnapshot,
    month: u32,
    year: i32,
) -> Vec<AtomicChange> {
    let mut changes = Vec::new();

    for descriptor in TRACKED_FIELDS {
        match descriptor.kind {
            FieldKind::StringArray => {
                diff_attendance(&old.attendance, &new.attendance, month, year, &mut changes);
            }
            FieldKind::ObjectArray => {
                let (old_items, new_items) = payment_lists(descriptor.field, old, new);
                diff_payments(descriptor.field, old_items, new_items, &mut changes);
            }
            FieldKind::Number => {
                diff_rate(old.rate, new.rate, &mut changes);
            }
        }
    }

    changes
}

fn payment_lists<'a>(
    field: ChangeField,
    old: &'a TrackedSnapshot,
    new: &'a TrackedSnapshot,
) -> (&'a [PayItem], &'a [PayItem]) {
    match field {
        ChangeField::Payouts => (&old.payouts, &new.payouts),
        ChangeField::AdditionalReqPays => (&old.additional_req_pays, &new.additional_req_pays),
        _ => (&[], &[]),
    }
}

// ============================================================================
// Attendance (positional string array)
// ============================================================================

fn diff_attendance(
    old: &[String],
    new: &[String],
    month: u32,
    year: i32,
    changes: &mut Vec<AtomicChange>,
) {
    if old.len() == new.len() {
        let mut positional = Vec::new();
        for (index, (old_code, new_code)) in old.iter().zip(new.iter()).enumerate() {
            if old_code != new_code {
                positional.push(day_change(index + 1, month, year, old_code, new_code));
            }
        }
        if !positional.is_empty() {
            changes.extend(positional);
            return;
        }
        // equal length and no positional difference: fall through to the
        // set comparison, which finds nothing for identical arrays
    }

    diff_attendance_sets(old, new, changes);
}

/// One positional day-code change, resolved to a calendar date
fn day_change(
    position: usize,
    month: u32,
    year: i32,
    old_code: &str,
    new_code: &str,
) -> AtomicChange {
    let date = time::day_date(year, month, position as u32)
        .map(|d| d.format("%Y-%m-%d").to_string());
    let old_decoded = attendance::decode(old_code);
    let new_decoded = attendance::decode(new_code);

    AtomicChange {
        field: ChangeField::Attendance,
        change_type: ChangeType::Modified,
        description: format!("Day {position} attendance changed from '{old_code}' to '{new_code}'"),
        data: json!({
            "position": position,
            "date": date,
            "from": {
                "code": old_code,
                "status": old_decoded.status,
                "overtime_hours": old_decoded.overtime_hours,
            },
            "to": {
                "code": new_code,
                "status": new_decoded.status,
                "overtime_hours": new_decoded.overtime_hours,
            },
        }),
    }
}

/// Set comparison by exact code string, used when positions cannot be
/// paired (the arrays differ in length)
///
/// Iterates the arrays rather than the sets so output order follows
/// input order.
fn diff_attendance_sets(old: &[String], new: &[String], changes: &mut Vec<AtomicChange>) {
    let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    for code in new {
        if !seen.insert(code.as_str()) || old_set.contains(code.as_str()) {
            continue;
        }
        let occurrences = new.iter().filter(|c| *c == code).count();
        changes.push(AtomicChange {
            field: ChangeField::Attendance,
            change_type: ChangeType::Added,
            description: format!("Attendance code '{code}' added"),
            data: json!({ "value": code, "occurrences": occurrences }),
        });
    }

    let mut seen = HashSet::new();
    for code in old {
        if !seen.insert(code.as_str()) || new_set.contains(code.as_str()) {
            continue;
        }
        let occurrences = old.iter().filter(|c| *c == code).count();
        changes.push(AtomicChange {
            field: ChangeField::Attendance,
            change_type: ChangeType::Removed,
            description: format!("Attendance code '{code}' removed"),
            data: json!({ "value": code, "occurrences": occurrences }),
        });
    }
}

// ============================================================================
// Payments (keyed object array)
// ============================================================================

/// Synthetic identity key for a payment item
///
/// Stored items carry no ids, so identity is reconstructed from content.
/// Tiered by which fields are present:
/// 1. date + created_by + value + remark prefix (20 chars)
/// 2. value + remark + date
/// 3. value + remark
/// 4. SHA256 over the serialized item
pub fn payment_key(item: &PayItem) -> String {
    let date = item.date.as_deref().map(normalize_date);
    match (date, item.created_by.as_deref(), item.remark.as_deref()) {
        (Some(date), Some(created_by), remark) => {
            let remark_prefix: String = remark.unwrap_or("").chars().take(20).collect();
            format!("{date}|{created_by}|{}|{remark_prefix}", item.value)
        }
        (Some(date), None, remark) => {
            format!("{}|{}|{date}", item.value, remark.unwrap_or(""))
        }
        (None, _, Some(remark)) => format!("{}|{remark}", item.value),
        (None, _, None) => content_hash(item),
    }
}

/// Calendar-date prefix, so `2024-06-01` and `2024-06-01T00:00:00Z` key
/// identically
fn normalize_date(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

fn content_hash(item: &PayItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(item).unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

fn payment_label(field: ChangeField) -> &'static str {
    match field {
        ChangeField::Payouts => "Payout",
        ChangeField::AdditionalReqPays => "Additional pay",
        _ => "Payment",
    }
}

fn diff_payments(
    field: ChangeField,
    old_items: &[PayItem],
    new_items: &[PayItem],
    changes: &mut Vec<AtomicChange>,
) {
    let label = payment_label(field);
    let old_map: HashMap<String, &PayItem> =
        old_items.iter().map(|i| (payment_key(i), i)).collect();
    let new_map: HashMap<String, &PayItem> =
        new_items.iter().map(|i| (payment_key(i), i)).collect();

    // iterate the lists, not the maps, to keep output order deterministic
    let mut seen = HashSet::new();
    for item in new_items {
        let key = payment_key(item);
        if !seen.insert(key.clone()) {
            continue;
        }
        match old_map.get(&key) {
            None => changes.push(AtomicChange {
                field,
                change_type: ChangeType::Added,
                description: format!("{label} of {} added", item.value),
                data: json!({ "key": key, "item": item }),
            }),
            Some(old_item) => {
                let changed_fields = compare_payment_fields(old_item, item);
                if !changed_fields.is_empty() {
                    let names: Vec<&str> =
                        changed_fields.iter().map(|c| c.field.as_str()).collect();
                    changes.push(AtomicChange {
                        field,
                        change_type: ChangeType::Modified,
                        description: format!("{label} modified ({})", names.join(", ")),
                        data: json!({
                            "key": key,
                            "changed_fields": changed_fields,
                            "item": item,
                        }),
                    });
                }
            }
        }
    }

    let mut seen_removed = HashSet::new();
    for item in old_items {
        let key = payment_key(item);
        if !seen_removed.insert(key.clone()) {
            continue;
        }
        if !new_map.contains_key(&key) {
            changes.push(AtomicChange {
                field,
                change_type: ChangeType::Removed,
                description: format!("{label} of {} removed", item.value),
                data: json!({ "key": key, "item": item }),
            });
        }
    }
}

/// Field-level deltas between two payment items that share a key
fn compare_payment_fields(old: &PayItem, new: &PayItem) -> Vec<FieldChange> {
    let mut deltas = Vec::new();
    if (old.value - new.value).abs() >= FLOAT_EPSILON {
        deltas.push(FieldChange {
            field: "value".to_string(),
            from: json!(old.value),
            to: json!(new.value),
        });
    }
    if old.remark != new.remark {
        deltas.push(FieldChange {
            field: "remark".to_string(),
            from: json!(old.remark),
            to: json!(new.remark),
        });
    }
    if old.date != new.date {
        deltas.push(FieldChange {
            field: "date".to_string(),
            from: json!(old.date),
            to: json!(new.date),
        });
    }
    if old.created_by != new.created_by {
        deltas.push(FieldChange {
            field: "created_by".to_string(),
            from: json!(old.created_by),
            to: json!(new.created_by),
        });
    }
    deltas
}

// ============================================================================
// Rate (scalar)
// ============================================================================

fn diff_rate(old_rate: f64, new_rate: f64, changes: &mut Vec<AtomicChange>) {
    if (old_rate - new_rate).abs() < FLOAT_EPSILON {
        return;
    }
    let difference = new_rate - old_rate;
    let percentage_change = if old_rate.abs() < FLOAT_EPSILON {
        json!("N/A")
    } else {
        json!(difference / old_rate * 100.0)
    };
    changes.push(AtomicChange {
        field: ChangeField::Rate,
        change_type: ChangeType::Modified,
        description: format!("Rate changed from {old_rate} to {new_rate}"),
        data: json!({
            "from": old_rate,
            "to": new_rate,
            "difference": difference,
            "percentage_change": percentage_change,
        }),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(attendance: &[&str], rate: f64) -> TrackedSnapshot {
        TrackedSnapshot {
            attendance: attendance.iter().map(|s| s.to_string()).collect(),
            payouts: Vec::new(),
            additional_req_pays: Vec::new(),
            rate,
        }
    }

    fn item(value: f64, date: Option<&str>, remark: Option<&str>, created_by: Option<&str>) -> PayItem {
        PayItem {
            value,
            date: date.map(|s| s.to_string()),
            remark: remark.map(|s| s.to_string()),
            created_by: created_by.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_identical_snapshots_produce_no_changes() {
        let snap = snapshot(&["P", "A", "P8"], 500.0);
        assert!(diff(&snap, &snap.clone(), 6, 2024).is_empty());
    }

    #[test]
    fn test_attendance_positional_change() {
        let old = snapshot(&["P", "P", "A", "P"], 500.0);
        let new = snapshot(&["P", "P", "P8", "P"], 500.0);

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 1);

        let change = &changes[0];
        assert_eq!(change.field, ChangeField::Attendance);
        assert_eq!(change.change_type, ChangeType::Modified);
        assert_eq!(change.data["position"], 3);
        assert_eq!(change.data["date"], "2024-06-03");
        assert_eq!(change.data["from"]["code"], "A");
        assert_eq!(change.data["from"]["status"], "absent");
        assert_eq!(change.data["to"]["code"], "P8");
        assert_eq!(change.data["to"]["overtime_hours"], 8);
        assert!(change.description.contains("Day 3"));
    }

    #[test]
    fn test_attendance_every_position_reported() {
        let old = snapshot(&["P", "P", "P"], 500.0);
        let new = snapshot(&["A", "A", "A"], 500.0);

        let changes = diff(&old, &new, 2, 2024);
        assert_eq!(changes.len(), 3);
        for (i, change) in changes.iter().enumerate() {
            assert_eq!(change.data["position"], i + 1);
        }
    }

    #[test]
    fn test_attendance_length_change_falls_back_to_sets() {
        let old = snapshot(&["P", "P"], 500.0);
        let new = snapshot(&["P", "P", "P8"], 500.0);

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Added);
        assert_eq!(changes[0].data["value"], "P8");
    }

    #[test]
    fn test_attendance_cleared_reports_removals() {
        let old = snapshot(&["P", "A", "P"], 500.0);
        let new = snapshot(&[], 500.0);

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.change_type == ChangeType::Removed));
        let values: Vec<&str> = changes
            .iter()
            .map(|c| c.data["value"].as_str().unwrap())
            .collect();
        assert_eq!(values, vec!["P", "A"]);
        assert_eq!(changes[0].data["occurrences"], 2);
    }

    #[test]
    fn test_payment_added_and_removed() {
        let mut old = snapshot(&[], 500.0);
        let mut new = snapshot(&[], 500.0);
        old.payouts = vec![item(200.0, Some("2024-06-02"), None, Some("admin"))];
        new.payouts = vec![item(350.0, Some("2024-06-10"), Some("advance"), Some("admin"))];

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change_type, ChangeType::Added);
        assert_eq!(changes[0].field, ChangeField::Payouts);
        assert_eq!(changes[0].data["item"]["value"], 350.0);
        assert_eq!(changes[1].change_type, ChangeType::Removed);
        assert_eq!(changes[1].data["item"]["value"], 200.0);
    }

    #[test]
    fn test_payment_unchanged_item_not_reported() {
        let paid = item(500.0, Some("2024-06-05"), Some("week 1"), Some("admin"));
        let mut old = snapshot(&[], 500.0);
        let mut new = snapshot(&[], 500.0);
        old.payouts = vec![paid.clone()];
        new.payouts = vec![paid];

        assert!(diff(&old, &new, 6, 2024).is_empty());
    }

    #[test]
    fn test_payment_remark_tail_change_is_modified() {
        // remark differs beyond the 20-char key prefix, so the key matches
        // and the difference surfaces as a modification
        let long_a = "a very long remark that goes on";
        let long_b = "a very long remark t-CHANGED";
        let mut old = snapshot(&[], 500.0);
        let mut new = snapshot(&[], 500.0);
        old.additional_req_pays = vec![item(75.0, Some("2024-06-20"), Some(long_a), Some("clerk"))];
        new.additional_req_pays = vec![item(75.0, Some("2024-06-20"), Some(long_b), Some("clerk"))];

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, ChangeField::AdditionalReqPays);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        let fields = changes[0].data["changed_fields"].as_array().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0]["field"], "remark");
    }

    #[test]
    fn test_payment_key_tiers() {
        // full identity
        let full = item(100.0, Some("2024-06-01"), Some("r"), Some("admin"));
        assert_eq!(payment_key(&full), "2024-06-01|admin|100|r");

        // no created_by: value + remark + date
        let no_creator = item(100.0, Some("2024-06-01"), Some("r"), None);
        assert_eq!(payment_key(&no_creator), "100|r|2024-06-01");

        // no date: value + remark
        let no_date = item(100.0, None, Some("r"), Some("admin"));
        assert_eq!(payment_key(&no_date), "100|r");

        // bare value: content hash, stable for equal items
        let bare = item(100.0, None, None, None);
        assert_eq!(payment_key(&bare), payment_key(&bare.clone()));
        assert_ne!(payment_key(&bare), payment_key(&item(101.0, None, None, None)));
    }

    #[test]
    fn test_payment_key_normalizes_datetime() {
        let plain = item(100.0, Some("2024-06-01"), Some("r"), Some("admin"));
        let stamped = item(100.0, Some("2024-06-01T00:00:00Z"), Some("r"), Some("admin"));
        assert_eq!(payment_key(&plain), payment_key(&stamped));
    }

    #[test]
    fn test_rate_change_with_percentage() {
        let old = snapshot(&[], 500.0);
        let new = snapshot(&[], 550.0);

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, ChangeField::Rate);
        assert_eq!(changes[0].data["from"], 500.0);
        assert_eq!(changes[0].data["to"], 550.0);
        assert_eq!(changes[0].data["difference"], 50.0);
        let pct = changes[0].data["percentage_change"].as_f64().unwrap();
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_change_from_zero_has_no_percentage() {
        let old = snapshot(&[], 0.0);
        let new = snapshot(&[], 400.0);

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].data["percentage_change"], "N/A");
    }

    #[test]
    fn test_rate_within_epsilon_ignored() {
        let old = snapshot(&[], 500.0);
        let new = snapshot(&[], 500.0 + 1e-12);
        assert!(diff(&old, &new, 6, 2024).is_empty());
    }

    #[test]
    fn test_multi_field_diff_is_ordered() {
        let old = snapshot(&["P", "A"], 500.0);
        let mut new = snapshot(&["P", "P"], 520.0);
        new.payouts = vec![item(100.0, Some("2024-06-15"), None, Some("admin"))];

        let changes = diff(&old, &new, 6, 2024);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].field, ChangeField::Attendance);
        assert_eq!(changes[1].field, ChangeField::Payouts);
        assert_eq!(changes[2].field, ChangeField::Rate);
    }
}
