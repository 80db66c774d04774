//! Transaction business logic - the ledger every split and settlement refers to.
//!
//! Creating or deleting a transaction moves account balances in the same
//! database transaction as the row change. Deletion is a soft delete: the row
//! keeps its data for audit and gets a `deleted_at` stamp, after which every
//! aggregate ignores it.

use crate::{
    core::{
        account::{self, Effect},
        group, money,
        party::{self, PersonRef},
        person,
    },
    entities::{
        Transaction,
        account::AccountKind,
        transaction::{self, SplitType, TransactionStatus, TransactionType},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Request to record a plain transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub account_id: i64,
    /// Kind the caller believes the account is; checked when given
    #[serde(default)]
    pub account_type: Option<AccountKind>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    /// Defaults to the account currency; must equal it when given
    #[serde(default)]
    pub currency: Option<String>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Payer or counterparty
    #[serde(default)]
    pub person_id: Option<PersonRef>,
    /// Defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Defaults to completed
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub transfer_to_account_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

/// Filters for [`list_transactions`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub account_id: Option<i64>,
    pub group_id: Option<i64>,
    pub person_id: Option<i64>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// Transaction as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: i64,
    pub account_id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub person_id: Option<i64>,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub transfer_to_account_id: Option<i64>,
    pub parent_transaction_id: Option<i64>,
    pub group_id: Option<i64>,
    pub settlement_id: Option<i64>,
    pub split_type: SplitType,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<transaction::Model> for TransactionView {
    fn from(model: transaction::Model) -> Self {
        Self {
            amount: money::from_minor(model.amount_minor, &model.currency),
            id: model.id,
            account_id: model.account_id,
            transaction_type: model.transaction_type,
            currency: model.currency,
            description: model.description,
            category: model.category,
            notes: model.notes,
            person_id: model.person_id,
            date: model.date,
            status: model.status,
            transfer_to_account_id: model.transfer_to_account_id,
            parent_transaction_id: model.parent_transaction_id,
            group_id: model.group_id,
            settlement_id: model.settlement_id,
            split_type: model.split_type,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Validated fields of a ledger row, ready to insert.
#[derive(Debug, Clone)]
pub(crate) struct LedgerEntry {
    pub account_id: i64,
    pub transfer_to_account_id: Option<i64>,
    pub transaction_type: TransactionType,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub person_id: Option<i64>,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub group_id: Option<i64>,
}

impl LedgerEntry {
    /// Active model for a plain, unsplit row; callers set the split columns.
    pub(crate) fn to_active_model(&self, owner_id: &str) -> transaction::ActiveModel {
        let now = Utc::now();
        transaction::ActiveModel {
            owner_id: Set(owner_id.to_string()),
            account_id: Set(self.account_id),
            transfer_to_account_id: Set(self.transfer_to_account_id),
            transaction_type: Set(self.transaction_type),
            amount_minor: Set(self.amount_minor),
            currency: Set(self.currency.clone()),
            description: Set(self.description.clone()),
            category: Set(self.category.clone()),
            notes: Set(self.notes.clone()),
            person_id: Set(self.person_id),
            date: Set(self.date),
            status: Set(self.status),
            parent_transaction_id: Set(None),
            group_id: Set(self.group_id),
            settlement_id: Set(None),
            split_type: Set(SplitType::NotSplit),
            idempotency_key: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Checks a transaction request against the owner's accounts, people and groups.
pub(crate) async fn prepare_entry<C>(
    conn: &C,
    owner_id: &str,
    request: &NewTransaction,
) -> Result<LedgerEntry>
where
    C: ConnectionTrait,
{
    let description = request.description.trim();
    if description.is_empty() {
        return Err(Error::validation("description", "Description cannot be empty"));
    }

    let account = account::require_open_account(conn, owner_id, request.account_id).await?;
    account::check_kind(&account, request.account_type)?;
    if let Some(given) = &request.currency {
        let given = money::normalize_currency(given)?;
        if given != account.currency {
            return Err(Error::CurrencyMismatch {
                expected: account.currency,
                actual: given,
            });
        }
    }
    let amount_minor = money::positive_minor(request.amount, &account.currency, "amount")?;

    let transfer_to_account_id = match (request.transaction_type, request.transfer_to_account_id) {
        (TransactionType::Transfer, None) => {
            return Err(Error::validation(
                "transferToAccountId",
                "A transfer needs a destination account",
            ));
        }
        (TransactionType::Transfer, Some(destination)) => {
            if destination == account.id {
                return Err(Error::validation(
                    "transferToAccountId",
                    "A transfer cannot target its source account",
                ));
            }
            let target = account::require_open_account(conn, owner_id, destination).await?;
            if target.currency != account.currency {
                return Err(Error::CurrencyMismatch {
                    expected: account.currency,
                    actual: target.currency,
                });
            }
            Some(destination)
        }
        (_, Some(_)) => {
            return Err(Error::validation(
                "transferToAccountId",
                "Only transfers have a destination account",
            ));
        }
        (_, None) => None,
    };

    let person_id = party::resolve(request.person_id.as_ref());
    if let Some(id) = person_id {
        person::require_active_person(conn, owner_id, id).await?;
    }

    if let Some(group_id) = request.group_id {
        let group = group::require_group(conn, owner_id, group_id).await?;
        if group.currency != account.currency {
            return Err(Error::CurrencyMismatch {
                expected: group.currency,
                actual: account.currency,
            });
        }
    }

    Ok(LedgerEntry {
        account_id: account.id,
        transfer_to_account_id,
        transaction_type: request.transaction_type,
        amount_minor,
        currency: account.currency,
        description: description.to_string(),
        category: clean_optional(request.category.as_deref()),
        notes: clean_optional(request.notes.as_deref()),
        person_id,
        date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
        status: request.status.unwrap_or(TransactionStatus::Completed),
        group_id: request.group_id,
    })
}

/// Records a plain transaction and applies its balance effect.
#[instrument(skip(db, request), fields(account_id = request.account_id))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    owner_id: &str,
    request: NewTransaction,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let entry = prepare_entry(&txn, owner_id, &request).await?;
    let model = entry.to_active_model(owner_id).insert(&txn).await?;
    account::apply_transaction_effect(&txn, &model, Effect::Apply).await?;

    txn.commit().await?;
    info!(transaction_id = model.id, "Recorded transaction");
    Ok(model)
}

/// Finds a live transaction of the owner.
pub async fn require_transaction<C>(
    conn: &C,
    owner_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })
}

/// Retrieves a live transaction by id.
pub async fn get_transaction(
    db: &DatabaseConnection,
    owner_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model> {
    require_transaction(db, owner_id, transaction_id).await
}

/// Lists the owner's transactions, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    owner_id: &str,
    filter: &TransactionFilter,
) -> Result<Vec<transaction::Model>> {
    let mut query = Transaction::find().filter(transaction::Column::OwnerId.eq(owner_id));
    if let Some(account_id) = filter.account_id {
        query = query.filter(transaction::Column::AccountId.eq(account_id));
    }
    if let Some(group_id) = filter.group_id {
        query = query.filter(transaction::Column::GroupId.eq(group_id));
    }
    if let Some(person_id) = filter.person_id {
        query = query.filter(transaction::Column::PersonId.eq(person_id));
    }
    if !filter.include_deleted {
        query = query.filter(transaction::Column::DeletedAt.is_null());
    }
    query
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Live children of a parent split, in share order.
pub(crate) async fn live_children<C>(conn: &C, parent_id: i64) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::ParentTransactionId.eq(parent_id))
        .filter(transaction::Column::DeletedAt.is_null())
        .order_by_asc(transaction::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Soft-deletes the live children of a parent split.
pub(crate) async fn soft_delete_children<C>(conn: &C, parent_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let result = Transaction::update_many()
        .col_expr(transaction::Column::DeletedAt, Expr::value(now))
        .col_expr(transaction::Column::UpdatedAt, Expr::value(now))
        .filter(transaction::Column::ParentTransactionId.eq(parent_id))
        .filter(transaction::Column::DeletedAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Soft-deletes one row and reverses its balance effect.
pub(crate) async fn soft_delete<C>(conn: &C, model: transaction::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    account::apply_transaction_effect(conn, &model, Effect::Reverse).await?;
    let now = Utc::now();
    let mut active: transaction::ActiveModel = model.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(conn).await?;
    Ok(())
}

/// Soft-deletes a transaction. A parent split takes its children with it.
///
/// Children cannot be deleted on their own; removing the split is the way to
/// drop them, which keeps the parent's breakdown whole.
#[instrument(skip(db))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    owner_id: &str,
    transaction_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;

    let existing = require_transaction(&txn, owner_id, transaction_id).await?;
    if existing.parent_transaction_id.is_some() {
        return Err(Error::validation(
            "transactionId",
            format!("Transaction {transaction_id} is part of a split; remove the split instead"),
        ));
    }
    if existing.is_split_parent() {
        let removed = soft_delete_children(&txn, existing.id).await?;
        info!(transaction_id, removed, "Soft-deleted split children");
    }
    soft_delete(&txn, existing).await?;

    txn.commit().await?;
    info!(transaction_id, "Soft-deleted transaction");
    Ok(())
}
