use chrono::{DateTime, TimeZone, Utc};

use crate::schemas::{default_category, ExpenseRecord, Group, RecordKind, Split};

pub fn group(members: &[&str]) -> Group {
    Group {
        id: "FLAT-1234".to_string(),
        name: "Test Flat".to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn expense_at(
    paid_by: &str,
    amount: f64,
    split: Split,
    created_at: DateTime<Utc>,
) -> ExpenseRecord {
    ExpenseRecord {
        id: None,
        group_id: "FLAT-1234".to_string(),
        description: String::new(),
        amount,
        paid_by: paid_by.to_string(),
        category: default_category(),
        kind: RecordKind::Expense { split },
        created_at,
    }
}

pub fn expense(paid_by: &str, amount: f64, split: Split) -> ExpenseRecord {
    expense_at(paid_by, amount, split, at(2024, 1, 15))
}

pub fn settlement(paid_by: &str, paid_to: &str, amount: f64) -> ExpenseRecord {
    ExpenseRecord {
        id: None,
        group_id: "FLAT-1234".to_string(),
        description: format!("Payment to {paid_to}"),
        amount,
        paid_by: paid_by.to_string(),
        category: "payment".to_string(),
        kind: RecordKind::Settlement {
            paid_to: paid_to.to_string(),
        },
        created_at: at(2024, 1, 15),
    }
}

pub fn shares(pairs: &[(&str, f64)]) -> Split {
    Split::Explicit {
        shares: pairs.iter().map(|(m, v)| (m.to_string(), *v)).collect(),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
