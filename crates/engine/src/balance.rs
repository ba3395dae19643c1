//! Running balance over the ledger.
//!
//! Split parents never count with their stored amount: each contributes its
//! residual (`amount - Σ children`) while every child contributes its own
//! amount. The sum of all line items is therefore the real net cash effect.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Loadable, Money, Transaction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Standalone,
    Residual,
    Child,
}

/// One contribution to a date group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub transaction_id: Uuid,
    pub date: NaiveDate,
    pub amount: Money,
    pub kind: LineKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateGroupBalance {
    pub date: NaiveDate,
    /// Sum of this date's line items.
    pub net: Money,
    /// Cumulative balance after this date's line items.
    pub balance: Money,
    pub lines: Vec<LineItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    pub initial: Money,
    /// Ascending by date.
    pub groups: Vec<DateGroupBalance>,
}

/// Sum of child amounts keyed by parent id, restricted to parents present in
/// `transactions`.
pub fn children_totals(transactions: &[Transaction]) -> HashMap<Uuid, Money> {
    let ids: HashSet<Uuid> = transactions.iter().map(|tx| tx.id).collect();
    let mut totals: HashMap<Uuid, Money> = HashMap::new();
    for tx in transactions {
        if let Some(parent_id) = tx.parent_id
            && ids.contains(&parent_id)
        {
            *totals.entry(parent_id).or_default() += tx.amount;
        }
    }
    totals
}

/// Expands transactions into balance line items.
///
/// A child whose parent is not in `transactions` counts as standalone.
pub fn line_items(transactions: &[Transaction]) -> Vec<LineItem> {
    let ids: HashSet<Uuid> = transactions.iter().map(|tx| tx.id).collect();
    let totals = children_totals(transactions);

    transactions
        .iter()
        .map(|tx| {
            let (amount, kind) = match (tx.parent_id, totals.get(&tx.id)) {
                (Some(parent_id), _) if ids.contains(&parent_id) => (tx.amount, LineKind::Child),
                (None, Some(children)) => (tx.amount - *children, LineKind::Residual),
                _ => (tx.amount, LineKind::Standalone),
            };
            LineItem {
                transaction_id: tx.id,
                date: tx.date,
                amount,
                kind,
            }
        })
        .collect()
}

impl RunningBalance {
    /// Groups `items` by date and accumulates from `initial`.
    pub fn compute(items: Vec<LineItem>, initial: Money) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<LineItem>> = BTreeMap::new();
        for item in items {
            by_date.entry(item.date).or_default().push(item);
        }

        let mut running = initial;
        let groups = by_date
            .into_iter()
            .map(|(date, lines)| {
                let net: Money = lines.iter().map(|line| line.amount).sum();
                running += net;
                DateGroupBalance {
                    date,
                    net,
                    balance: running,
                    lines,
                }
            })
            .collect();

        Self { initial, groups }
    }

    /// Balance after the last date group, or the initial balance when the
    /// ledger is empty.
    #[must_use]
    pub fn final_balance(&self) -> Money {
        self.groups
            .last()
            .map_or(self.initial, |group| group.balance)
    }

    /// Balance as of the latest date group on or before `date`.
    #[must_use]
    pub fn balance_on(&self, date: NaiveDate) -> Money {
        self.groups
            .iter()
            .take_while(|group| group.date <= date)
            .last()
            .map_or(self.initial, |group| group.balance)
    }

    #[must_use]
    pub fn group(&self, date: NaiveDate) -> Option<&DateGroupBalance> {
        self.groups.iter().find(|group| group.date == date)
    }
}

/// Computes the running balance once the initial balance is available.
pub fn running_balance(
    transactions: &[Transaction],
    initial: &Loadable<Money>,
) -> Loadable<RunningBalance> {
    initial
        .clone()
        .map(|initial| RunningBalance::compute(line_items(transactions), initial))
}
