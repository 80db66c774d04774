//! Shared test utilities for `SplitBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        account::{self, NewAccount},
        group::{self, NewGroup},
        person::{self, NewPerson},
        split::{self, NewSplit, SplitDetails, SplitKind, SplitPolicy},
        transaction::NewTransaction,
    },
    entities::{self, account::AccountKind, group::GroupKind, person::PersonKind},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Owner every helper creates records for.
pub const OWNER: &str = "owner-1";
/// A second owner, for scoping tests.
pub const OTHER_OWNER: &str = "owner-2";
/// Display name used for the owner in tests.
pub const TEST_OWNER_NAME: &str = "You";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a bank account with a zero opening balance.
pub async fn create_test_account(
    db: &DatabaseConnection,
    currency: &str,
) -> Result<entities::account::Model> {
    account::create_account(
        db,
        OWNER,
        NewAccount {
            name: format!("Test {currency} account"),
            kind: AccountKind::Bank,
            currency: currency.to_string(),
            opening_balance: Decimal::ZERO,
        },
    )
    .await
}

/// Creates a friend without spending limits and returns the stored row.
pub async fn create_test_person(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::person::Model> {
    let view = person::create_person(
        db,
        OWNER,
        NewPerson {
            name: name.to_string(),
            kind: PersonKind::Friend,
            notes: None,
            overall_limit: None,
            limit_period: None,
            limit_currency: None,
            category_limits: Vec::new(),
        },
    )
    .await?;
    person::require_person(db, OWNER, view.id).await
}

/// Creates a trip group without members.
pub async fn create_test_group(
    db: &DatabaseConnection,
    name: &str,
    currency: &str,
    budget: Option<Decimal>,
) -> Result<entities::group::Model> {
    let view = group::create_group(
        db,
        OWNER,
        NewGroup {
            name: name.to_string(),
            kind: GroupKind::Trip,
            start_date: None,
            end_date: None,
            budget,
            currency: currency.to_string(),
            notes: None,
            member_ids: Vec::new(),
        },
    )
    .await?;
    group::require_group(db, OWNER, view.id).await
}

/// An expense request with sensible defaults.
///
/// # Defaults
/// * `description`: "Dinner"
/// * `category`: "Food"
/// * `date`: today
#[must_use]
pub fn test_expense(account_id: i64, amount: Decimal) -> NewTransaction {
    NewTransaction {
        account_id,
        account_type: None,
        transaction_type: entities::transaction::TransactionType::Expense,
        amount,
        currency: None,
        description: "Dinner".to_string(),
        category: Some("Food".to_string()),
        notes: None,
        person_id: None,
        date: None,
        status: None,
        transfer_to_account_id: None,
        group_id: None,
    }
}

/// An equal split request. `None` participants and payer stand for the owner.
#[must_use]
pub fn test_equal_split(
    account_id: i64,
    amount: Decimal,
    payer: Option<i64>,
    participants: Vec<Option<i64>>,
) -> NewSplit {
    let mut transaction = test_expense(account_id, amount);
    transaction.person_id = payer.map(Into::into);
    NewSplit {
        transaction,
        policy: SplitPolicy {
            split_type: SplitKind::Equal,
            person_ids: participants.into_iter().map(|p| p.map(Into::into)).collect(),
            percentages: None,
            amounts: None,
        },
        idempotency_key: None,
    }
}

/// Records an expense and splits it equally.
pub async fn create_test_split(
    db: &DatabaseConnection,
    account_id: i64,
    amount: Decimal,
    payer: Option<i64>,
    participants: Vec<Option<i64>>,
) -> Result<SplitDetails> {
    split::create_split(
        db,
        OWNER,
        TEST_OWNER_NAME,
        test_equal_split(account_id, amount, payer, participants),
    )
    .await
}

/// Records an expense and splits it with explicit amounts per person.
pub async fn create_custom_test_split(
    db: &DatabaseConnection,
    account_id: i64,
    amount: Decimal,
    payer: Option<i64>,
    shares: &[(i64, Decimal)],
) -> Result<SplitDetails> {
    let mut request = test_equal_split(
        account_id,
        amount,
        payer,
        shares.iter().map(|(id, _)| Some(*id)).collect(),
    );
    request.policy.split_type = SplitKind::Custom;
    request.policy.amounts = Some(shares.iter().map(|(_, a)| *a).collect());
    split::create_split(db, OWNER, TEST_OWNER_NAME, request).await
}
