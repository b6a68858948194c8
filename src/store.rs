use std::collections::HashMap;

use futures::future;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::UpdateOptions;
use mongodb::{Client, Collection};

use crate::error::AppError;
use crate::schemas::{ExpenseRecord, Group, MemberId, MemberProfile, UNKNOWN_NAME};

const DATABASE: &str = "FlatSplit";

/// Access layer over the document store. All balance math happens on
/// snapshots fetched through here; nothing below this type does arithmetic.
#[derive(Clone)]
pub struct Store {
    client: Client,
}

impl Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn groups(&self) -> Collection<Group> {
        self.client.database(DATABASE).collection("Groups")
    }

    fn users(&self) -> Collection<MemberProfile> {
        self.client.database(DATABASE).collection("Users")
    }

    fn expenses(&self) -> Collection<ExpenseRecord> {
        self.client.database(DATABASE).collection("Expenses")
    }

    fn raw_expenses(&self) -> Collection<Document> {
        self.client.database(DATABASE).collection("Expenses")
    }

    pub async fn get_group(&self, id: &str) -> Result<Group, AppError> {
        self.groups()
            .find_one(doc! { "id": id }, None)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(id.to_string()))
    }

    pub async fn create_group(&self, group: Group) -> Result<(), AppError> {
        self.groups().insert_one(group, None).await?;
        Ok(())
    }

    /// Adds the member to the group and points their profile at it. A member
    /// belongs to one group at a time, so any previous link is overwritten.
    pub async fn join_group(&self, group_id: &str, member: &MemberId) -> Result<(), AppError> {
        let result = self
            .groups()
            .update_one(
                doc! { "id": group_id },
                doc! { "$addToSet": { "members": member } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::GroupNotFound(group_id.to_string()));
        }
        self.users()
            .update_one(
                doc! { "id": member },
                doc! { "$set": { "group_id": group_id } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    /// Drops the member from the group's roster. Historical expense records
    /// referencing them are left untouched.
    pub async fn remove_member(&self, group_id: &str, member: &MemberId) -> Result<(), AppError> {
        let result = self
            .groups()
            .update_one(
                doc! { "id": group_id },
                doc! { "$pull": { "members": member } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::GroupNotFound(group_id.to_string()));
        }
        self.users()
            .update_one(
                doc! { "id": member, "group_id": group_id },
                doc! { "$unset": { "group_id": "" } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_display_name(&self, member: &MemberId, name: &str) -> Result<(), AppError> {
        self.users()
            .update_one(
                doc! { "id": member },
                doc! { "$set": { "display_name": name } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    pub async fn add_expense(&self, record: &ExpenseRecord) -> Result<(), AppError> {
        self.expenses().insert_one(record, None).await?;
        Ok(())
    }

    pub async fn delete_expense(&self, group_id: &str, expense_id: &str) -> Result<(), AppError> {
        let oid = ObjectId::parse_str(expense_id)
            .map_err(|_| AppError::ExpenseNotFound(expense_id.to_string()))?;
        let result = self
            .raw_expenses()
            .delete_one(doc! { "_id": oid, "group_id": group_id }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(AppError::ExpenseNotFound(expense_id.to_string()));
        }
        Ok(())
    }

    pub async fn get_expense(
        &self,
        group_id: &str,
        expense_id: &str,
    ) -> Result<ExpenseRecord, AppError> {
        let oid = ObjectId::parse_str(expense_id)
            .map_err(|_| AppError::ExpenseNotFound(expense_id.to_string()))?;
        let document = self
            .raw_expenses()
            .find_one(doc! { "_id": oid, "group_id": group_id }, None)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))?;
        bson::from_document(document).map_err(|err| {
            tracing::warn!(group_id, expense_id, error = %err, "expense record no longer decodes");
            AppError::ExpenseNotFound(expense_id.to_string())
        })
    }

    /// Fetches the group's full expense history, in no particular order.
    /// Documents that no longer decode are skipped with a warning so one
    /// corrupt record can't block every balance computation.
    pub async fn list_expenses(&self, group_id: &str) -> Result<Vec<ExpenseRecord>, AppError> {
        let mut cursor = self
            .raw_expenses()
            .find(doc! { "group_id": group_id }, None)
            .await?;
        let mut records = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            match bson::from_document::<ExpenseRecord>(document) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(group_id, error = %err, "skipping undecodable expense record");
                }
            }
        }
        Ok(records)
    }

    /// Looks up display names for a set of member ids concurrently. Ids with
    /// no profile or no name resolve to "Unknown".
    pub async fn resolve_display_names<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a MemberId>,
    ) -> Result<HashMap<MemberId, String>, AppError> {
        let lookups = ids.into_iter().map(|id| async move {
            let profile = self.users().find_one(doc! { "id": id }, None).await?;
            let name = profile
                .map(|p| p.name_or_unknown())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string());
            Ok::<_, AppError>((id.clone(), name))
        });
        let pairs = future::try_join_all(lookups).await?;
        Ok(pairs.into_iter().collect())
    }
}
