//! Account business logic - bank accounts and cash wallets.
//!
//! Balances are never read, modified and written back. Every change is a
//! single `UPDATE accounts SET current_balance_minor = current_balance_minor + ?`
//! so concurrent transactions cannot lose each other's effects.

use crate::{
    core::money,
    entities::{
        Account,
        account::{self, AccountKind},
        transaction::{self, TransactionStatus, TransactionType},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Request to open an account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    #[serde(alias = "accountType")]
    pub kind: AccountKind,
    pub currency: String,
    #[serde(default)]
    pub opening_balance: Decimal,
}

/// Account as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub currency: String,
    pub opening_balance: Decimal,
    pub current_balance: Decimal,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<account::Model> for AccountView {
    fn from(model: account::Model) -> Self {
        Self {
            opening_balance: money::from_minor(model.opening_balance_minor, &model.currency),
            current_balance: money::from_minor(model.current_balance_minor, &model.currency),
            id: model.id,
            name: model.name,
            kind: model.kind,
            currency: model.currency,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Whether a transaction's effect is being applied or undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Apply,
    Reverse,
}

/// Opens a new account with its current balance equal to the opening balance.
pub async fn create_account(
    db: &DatabaseConnection,
    owner_id: &str,
    request: NewAccount,
) -> Result<account::Model> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Account name cannot be empty"));
    }
    let currency = money::normalize_currency(&request.currency)?;
    let opening = money::to_minor(request.opening_balance, &currency, "openingBalance")?;

    let now = Utc::now();
    let model = account::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        name: Set(name.to_string()),
        kind: Set(request.kind),
        currency: Set(currency),
        opening_balance_minor: Set(opening),
        current_balance_minor: Set(opening),
        is_archived: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(account_id = model.id, "Created account '{}'", model.name);
    Ok(model)
}

/// Lists the owner's accounts ordered by name.
pub async fn list_accounts(
    db: &DatabaseConnection,
    owner_id: &str,
    include_archived: bool,
) -> Result<Vec<account::Model>> {
    let mut query = Account::find().filter(account::Column::OwnerId.eq(owner_id));
    if !include_archived {
        query = query.filter(account::Column::IsArchived.eq(false));
    }
    query
        .order_by_asc(account::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds one of the owner's accounts, archived or not.
pub async fn require_account<C>(conn: &C, owner_id: &str, account_id: i64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    Account::find_by_id(account_id)
        .filter(account::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or(Error::AccountNotFound { id: account_id })
}

/// Finds an account that can still take new transactions.
pub async fn require_open_account<C>(
    conn: &C,
    owner_id: &str,
    account_id: i64,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let account = require_account(conn, owner_id, account_id).await?;
    if account.is_archived {
        return Err(Error::validation(
            "accountId",
            format!("Account {account_id} is archived"),
        ));
    }
    Ok(account)
}

/// Rejects a request whose stated account kind differs from the account's.
pub fn check_kind(account: &account::Model, stated: Option<AccountKind>) -> Result<()> {
    match stated {
        Some(kind) if kind != account.kind => Err(Error::validation(
            "accountType",
            format!(
                "Account {} is a {} account",
                account.id,
                account.kind.as_str()
            ),
        )),
        _ => Ok(()),
    }
}

/// Retrieves an account by id.
pub async fn get_account(
    db: &DatabaseConnection,
    owner_id: &str,
    account_id: i64,
) -> Result<account::Model> {
    require_account(db, owner_id, account_id).await
}

/// Archives an account. Existing transactions stay untouched.
pub async fn archive_account(
    db: &DatabaseConnection,
    owner_id: &str,
    account_id: i64,
) -> Result<account::Model> {
    let existing = require_account(db, owner_id, account_id).await?;
    let mut active: account::ActiveModel = existing.into();
    active.is_archived = Set(true);
    active.updated_at = Set(Utc::now());
    let model = active.update(db).await?;
    info!(account_id, "Archived account");
    Ok(model)
}

/// Atomically adds `delta` minor units to an account balance.
pub async fn apply_balance_delta<C>(conn: &C, account_id: i64, delta: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    if delta == 0 {
        return Ok(());
    }
    let result = Account::update_many()
        .col_expr(
            account::Column::CurrentBalanceMinor,
            Expr::col(account::Column::CurrentBalanceMinor).add(delta),
        )
        .col_expr(account::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(account::Column::Id.eq(account_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::AccountNotFound { id: account_id });
    }
    debug!(account_id, delta, "Applied balance delta");
    Ok(())
}

/// Applies or reverses the balance effect of a transaction.
///
/// Split children and cancelled transactions have no effect.
pub async fn apply_transaction_effect<C>(
    conn: &C,
    tx: &transaction::Model,
    effect: Effect,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if tx.parent_transaction_id.is_some() || tx.status == TransactionStatus::Cancelled {
        return Ok(());
    }
    let sign = match effect {
        Effect::Apply => 1,
        Effect::Reverse => -1,
    };
    let amount = tx.amount_minor * sign;
    match tx.transaction_type {
        TransactionType::Income => apply_balance_delta(conn, tx.account_id, amount).await,
        TransactionType::Expense => apply_balance_delta(conn, tx.account_id, -amount).await,
        TransactionType::Transfer => {
            apply_balance_delta(conn, tx.account_id, -amount).await?;
            if let Some(destination) = tx.transfer_to_account_id {
                apply_balance_delta(conn, destination, amount).await?;
            }
            Ok(())
        }
    }
}
