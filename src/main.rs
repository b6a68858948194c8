use std::collections::{HashMap, HashSet};

use actix_cors::Cors;
use actix_web::{delete, get, post, put, web, App, HttpResponse, HttpServer};
use chrono::{DateTime, Utc};
use mongodb::Client;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

mod balance;
mod error;
mod schemas;
mod settle;
mod store;
mod summary;
#[cfg(test)]
mod testutil;

use balance::aggregate_balances;
use error::AppError;
use schemas::{ExpenseRecord, Group, MemberId, RecordKind, Split, UNKNOWN_NAME};
use settle::simplify_debts;
use store::Store;
use summary::monthly_summary;

/// Explicit split totals may drift from the expense amount by up to one
/// currency unit before the expense is rejected.
const SPLIT_TOLERANCE: f64 = 1.0;

#[derive(Deserialize, Serialize)]
struct GroupNameJson {
    name: String,
}

#[derive(Deserialize)]
struct JoinGroupJson {
    member_id: MemberId,
}

#[derive(Deserialize)]
struct DisplayNameJson {
    display_name: String,
}

#[derive(Deserialize)]
struct ExpenseJson {
    description: String,
    amount: f64,
    paid_by: MemberId,
    #[serde(default = "schemas::default_category")]
    category: String,
    #[serde(default)]
    split: Split,
}

#[derive(Deserialize)]
struct SettlementJson {
    amount: f64,
    paid_by: MemberId,
    paid_to: MemberId,
}

#[derive(Serialize)]
struct BalanceEntry {
    member: MemberId,
    name: String,
    balance: f64,
}

#[derive(Debug, Serialize)]
struct ExpenseEntry {
    id: String,
    description: String,
    amount: f64,
    paid_by: MemberId,
    paid_by_name: String,
    category: String,
    kind: RecordKind,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct TransferEntry {
    from: MemberId,
    from_name: String,
    to: MemberId,
    to_name: String,
    amount: f64,
}

fn validate_amount(amount: f64) -> Result<(), AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::InvalidAmount(amount));
    }
    Ok(())
}

fn validate_settlement(settlement: &SettlementJson) -> Result<(), AppError> {
    validate_amount(settlement.amount)?;
    if settlement.paid_by == settlement.paid_to {
        return Err(AppError::SelfSettlement);
    }
    Ok(())
}

fn expense_entry(record: ExpenseRecord, names: &HashMap<MemberId, String>) -> ExpenseEntry {
    let paid_by_name = names
        .get(&record.paid_by)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    ExpenseEntry {
        id: record.id.map(|oid| oid.to_hex()).unwrap_or_default(),
        description: record.description,
        amount: record.amount,
        paid_by: record.paid_by,
        paid_by_name,
        category: record.category,
        kind: record.kind,
        created_at: record.created_at,
    }
}

/// The expense feed as clients render it: newest first, payer names resolved.
fn expense_feed(
    mut records: Vec<ExpenseRecord>,
    names: &HashMap<MemberId, String>,
) -> Vec<ExpenseEntry> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
        .into_iter()
        .map(|record| expense_entry(record, names))
        .collect()
}

/// Creation-time invariant: explicit split assignments must add up to the
/// expense amount within [`SPLIT_TOLERANCE`]. Stored records are trusted and
/// never re-validated.
fn validate_expense(expense: &ExpenseJson) -> Result<(), AppError> {
    validate_amount(expense.amount)?;
    if let Split::Explicit { shares } = &expense.split {
        let assigned: f64 = shares.values().sum();
        if (assigned - expense.amount).abs() > SPLIT_TOLERANCE {
            return Err(AppError::SplitMismatch {
                assigned,
                amount: expense.amount,
            });
        }
    }
    Ok(())
}

#[put("/groups/{id}")]
async fn add_group(
    store: web::Data<Store>,
    id: web::Path<String>,
    json: web::Json<GroupNameJson>,
) -> Result<HttpResponse, AppError> {
    let group = Group {
        id: id.into_inner(),
        name: json.into_inner().name,
        members: vec![],
    };
    store.create_group(group).await?;
    Ok(HttpResponse::Ok().body("Group added"))
}

#[post("/groups/{id}/members")]
async fn join_group(
    store: web::Data<Store>,
    id: web::Path<String>,
    json: web::Json<JoinGroupJson>,
) -> Result<HttpResponse, AppError> {
    store
        .join_group(&id.into_inner(), &json.into_inner().member_id)
        .await?;
    Ok(HttpResponse::Ok().body("Member added"))
}

#[delete("/groups/{id}/members/{member}")]
async fn remove_member(
    store: web::Data<Store>,
    path: web::Path<(String, MemberId)>,
) -> Result<HttpResponse, AppError> {
    let (group_id, member) = path.into_inner();
    store.remove_member(&group_id, &member).await?;
    Ok(HttpResponse::Ok().body("Member removed"))
}

#[put("/users/{id}")]
async fn set_display_name(
    store: web::Data<Store>,
    id: web::Path<MemberId>,
    json: web::Json<DisplayNameJson>,
) -> Result<HttpResponse, AppError> {
    store
        .set_display_name(&id.into_inner(), &json.into_inner().display_name)
        .await?;
    Ok(HttpResponse::Ok().body("Name updated"))
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    store: web::Data<Store>,
    id: web::Path<String>,
    json: web::Json<ExpenseJson>,
) -> Result<HttpResponse, AppError> {
    let group_id = id.into_inner();
    let expense = json.into_inner();
    validate_expense(&expense)?;
    let group = store.get_group(&group_id).await?;
    let record = ExpenseRecord {
        id: None,
        group_id: group.id,
        description: expense.description,
        amount: expense.amount,
        paid_by: expense.paid_by,
        category: expense.category,
        kind: RecordKind::Expense {
            split: expense.split,
        },
        created_at: Utc::now(),
    };
    store.add_expense(&record).await?;
    Ok(HttpResponse::Ok().body("Expense added"))
}

#[post("/groups/{id}/settlements")]
async fn add_settlement(
    store: web::Data<Store>,
    id: web::Path<String>,
    json: web::Json<SettlementJson>,
) -> Result<HttpResponse, AppError> {
    let group_id = id.into_inner();
    let settlement = json.into_inner();
    validate_settlement(&settlement)?;
    let group = store.get_group(&group_id).await?;
    let names = store.resolve_display_names([&settlement.paid_to]).await?;
    let payee_name = names
        .get(&settlement.paid_to)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let record = ExpenseRecord {
        id: None,
        group_id: group.id,
        description: format!("Payment to {payee_name}"),
        amount: settlement.amount,
        paid_by: settlement.paid_by,
        category: "payment".to_string(),
        kind: RecordKind::Settlement {
            paid_to: settlement.paid_to,
        },
        created_at: Utc::now(),
    };
    store.add_expense(&record).await?;
    Ok(HttpResponse::Ok().body("Payment recorded"))
}

#[delete("/groups/{id}/expenses/{expense_id}")]
async fn delete_expense(
    store: web::Data<Store>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (group_id, expense_id) = path.into_inner();
    store.delete_expense(&group_id, &expense_id).await?;
    Ok(HttpResponse::Ok().body("Expense deleted"))
}

#[get("/groups/{id}/expenses")]
async fn list_expenses(
    store: web::Data<Store>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let group_id = id.into_inner();
    store.get_group(&group_id).await?;
    let records = store.list_expenses(&group_id).await?;
    let payers: HashSet<&MemberId> = records.iter().map(|record| &record.paid_by).collect();
    let names = store.resolve_display_names(payers).await?;
    Ok(HttpResponse::Ok().json(expense_feed(records, &names)))
}

#[get("/groups/{id}/expenses/{expense_id}")]
async fn get_expense(
    store: web::Data<Store>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (group_id, expense_id) = path.into_inner();
    let record = store.get_expense(&group_id, &expense_id).await?;
    let names = store.resolve_display_names([&record.paid_by]).await?;
    Ok(HttpResponse::Ok().json(expense_entry(record, &names)))
}

#[get("/groups/{id}/balances")]
async fn get_balances(
    store: web::Data<Store>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let group_id = id.into_inner();
    let group = store.get_group(&group_id).await?;
    let records = store.list_expenses(&group_id).await?;
    let balances = aggregate_balances(&records, &group);
    let names = store.resolve_display_names(balances.keys()).await?;
    let entries: Vec<BalanceEntry> = balances
        .iter()
        .map(|(member, &balance)| BalanceEntry {
            member: member.clone(),
            name: names
                .get(member)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            balance,
        })
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}

#[get("/groups/{id}/settle")]
async fn get_settle(
    store: web::Data<Store>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let group_id = id.into_inner();
    let group = store.get_group(&group_id).await?;
    let records = store.list_expenses(&group_id).await?;
    let balances = aggregate_balances(&records, &group);
    let names = store.resolve_display_names(balances.keys()).await?;
    let resolve = |member: &MemberId| {
        names
            .get(member)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    };
    let transfers: Vec<TransferEntry> = simplify_debts(&balances)
        .into_iter()
        .map(|tx| TransferEntry {
            from_name: resolve(&tx.from),
            to_name: resolve(&tx.to),
            from: tx.from,
            to: tx.to,
            amount: tx.amount,
        })
        .collect();
    Ok(HttpResponse::Ok().json(transfers))
}

#[get("/groups/{id}/summary/{member}")]
async fn get_summary(
    store: web::Data<Store>,
    path: web::Path<(String, MemberId)>,
) -> Result<HttpResponse, AppError> {
    let (group_id, viewer) = path.into_inner();
    let group = store.get_group(&group_id).await?;
    let records = store.list_expenses(&group_id).await?;
    Ok(HttpResponse::Ok().json(monthly_summary(&records, &group, &viewer)))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let uri = std::env::var("MONGODB_URI").expect("You need to add the MONGODB_URI to the env");
    let client = Client::with_uri_str(uri).await.expect("failed to connect");
    tracing::info!("connected to mongodb");
    let store = Store::new(client);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(store.clone()))
            .service(add_group)
            .service(join_group)
            .service(remove_member)
            .service(set_display_name)
            .service(add_expense)
            .service(add_settlement)
            .service(delete_expense)
            .service(list_expenses)
            .service(get_expense)
            .service(get_balances)
            .service(get_settle)
            .service(get_summary)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
