use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type MemberId = String;

/// Fallback shown whenever a member id has no resolvable display name.
pub const UNKNOWN_NAME: &str = "Unknown";

pub fn default_category() -> String {
    "other".to_string()
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberId>,
}

/// A member's profile document. `group_id` is the member's current group;
/// joining another group overwrites it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MemberProfile {
    pub id: MemberId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl MemberProfile {
    pub fn name_or_unknown(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }
}

/// How a shared expense is divided among members.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "split_type", rename_all = "snake_case")]
pub enum Split {
    /// Divide the amount by the current group size.
    #[default]
    Equal,
    /// Assigned per-member amounts; members not listed owe nothing.
    Explicit { shares: HashMap<MemberId, f64> },
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordKind {
    Expense {
        #[serde(default)]
        split: Split,
    },
    /// A direct payment from the payer to `paid_to`, no split.
    Settlement { paid_to: MemberId },
}

/// One ledger entry. Immutable once stored, deletable.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExpenseRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub group_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    pub paid_by: MemberId,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(flatten)]
    pub kind: RecordKind,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
