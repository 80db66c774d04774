//! Balance aggregation - who owes whom, derived on every request.
//!
//! Nothing here is stored. Debts come from live split children that no
//! settlement has claimed: the child's person owes the parent's payer.
//! Settled settlements pay debts down. Each unordered pair of parties
//! collapses to a single directional balance per currency.

use crate::{
    core::party::Party,
    entities::{
        Settlement, Transaction,
        settlement::{self, SettlementStatus},
        transaction::{self, TransactionStatus},
    },
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A live split child together with the party it is owed to.
#[derive(Debug, Clone)]
pub struct Debt {
    pub child: transaction::Model,
    pub creditor: Party,
}

impl Debt {
    /// Party owing the child's amount.
    #[must_use]
    pub const fn debtor(&self) -> Party {
        Party::from_person_id(self.child.person_id)
    }
}

/// A net amount one party owes another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetBalance {
    pub currency: String,
    pub debtor: Party,
    pub creditor: Party,
    pub amount_minor: i64,
}

/// Signed running totals per unordered pair and currency.
///
/// Keys hold the pair with the smaller party first; a positive total means
/// the first party owes the second.
#[derive(Debug, Clone, Default)]
pub struct BalanceSheet {
    totals: BTreeMap<(String, Party, Party), i64>,
}

impl BalanceSheet {
    /// Records that `debtor` owes `creditor` `amount_minor` more.
    pub fn record_debt(&mut self, currency: &str, debtor: Party, creditor: Party, amount_minor: i64) {
        if debtor == creditor || amount_minor == 0 {
            return;
        }
        let (key, signed) = if debtor < creditor {
            ((currency.to_string(), debtor, creditor), amount_minor)
        } else {
            ((currency.to_string(), creditor, debtor), -amount_minor)
        };
        *self.totals.entry(key).or_default() += signed;
    }

    /// Records a payment from `payer` to `payee`, reducing what the payer owes.
    pub fn record_payment(&mut self, currency: &str, payer: Party, payee: Party, amount_minor: i64) {
        self.record_debt(currency, payee, payer, amount_minor);
    }

    /// Non-zero balances ordered by currency, debtor, creditor.
    #[must_use]
    pub fn net(&self) -> Vec<NetBalance> {
        let mut balances: Vec<NetBalance> = self
            .totals
            .iter()
            .filter(|(_, total)| **total != 0)
            .map(|((currency, low, high), total)| {
                let (debtor, creditor) = if *total > 0 { (*low, *high) } else { (*high, *low) };
                NetBalance {
                    currency: currency.clone(),
                    debtor,
                    creditor,
                    amount_minor: total.abs(),
                }
            })
            .collect();
        balances.sort_by(|a, b| {
            (&a.currency, a.debtor, a.creditor).cmp(&(&b.currency, b.debtor, b.creditor))
        });
        balances
    }
}

/// Every live split child whose parent is live and not cancelled, oldest first.
///
/// Children already stamped with a settlement are included; callers decide
/// what a stamp means for them.
pub async fn live_debts<C>(conn: &C, owner_id: &str) -> Result<Vec<Debt>>
where
    C: ConnectionTrait,
{
    let children = Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::ParentTransactionId.is_not_null())
        .filter(transaction::Column::DeletedAt.is_null())
        .filter(transaction::Column::Status.ne(TransactionStatus::Cancelled))
        .order_by_asc(transaction::Column::Date)
        .order_by_asc(transaction::Column::Id)
        .all(conn)
        .await?;
    if children.is_empty() {
        return Ok(Vec::new());
    }

    let parent_ids: Vec<i64> = children
        .iter()
        .filter_map(|c| c.parent_transaction_id)
        .collect();
    let payers: HashMap<i64, Party> = Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::Id.is_in(parent_ids))
        .filter(transaction::Column::DeletedAt.is_null())
        .filter(transaction::Column::Status.ne(TransactionStatus::Cancelled))
        .all(conn)
        .await?
        .into_iter()
        .filter(transaction::Model::is_split_parent)
        .map(|p| (p.id, Party::from_person_id(p.person_id)))
        .collect();

    Ok(children
        .into_iter()
        .filter_map(|child| {
            let creditor = *payers.get(&child.parent_transaction_id?)?;
            Some(Debt { child, creditor })
        })
        .collect())
}

/// Builds the balance sheet of an owner.
///
/// Run it inside a database transaction so all reads see one snapshot.
pub async fn load_balance_sheet<C>(conn: &C, owner_id: &str) -> Result<BalanceSheet>
where
    C: ConnectionTrait,
{
    let mut sheet = BalanceSheet::default();
    let mut stamped: HashMap<i64, i64> = HashMap::new();

    let debts = live_debts(conn, owner_id).await?;
    for debt in &debts {
        match debt.child.settlement_id {
            None => sheet.record_debt(
                &debt.child.currency,
                debt.debtor(),
                debt.creditor,
                debt.child.amount_minor,
            ),
            Some(settlement_id) => {
                *stamped.entry(settlement_id).or_default() += debt.child.amount_minor;
            }
        }
    }

    let settled = Settlement::find()
        .filter(settlement::Column::OwnerId.eq(owner_id))
        .filter(settlement::Column::Status.eq(SettlementStatus::Settled))
        .all(conn)
        .await?;
    for payment in &settled {
        let claimed = stamped.get(&payment.id).copied().unwrap_or_default();
        sheet.record_payment(
            &payment.currency,
            Party::from_person_id(payment.from_person_id),
            Party::from_person_id(payment.to_person_id),
            payment.amount_minor - claimed,
        );
    }

    debug!(
        debts = debts.len(),
        settlements = settled.len(),
        "Loaded balance sheet"
    );
    Ok(sheet)
}
