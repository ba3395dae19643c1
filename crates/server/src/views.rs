//! Engine values to API bodies.

use api_types::{
    Amount, MoneyView,
    balance::{BalanceResponse, DateGroupView, LineKind, LineView},
    document::DocumentView,
    tag::{TagGroupView, TagView},
    transaction::{TagLinkOutcome, TransactionView},
};
use engine::{AmountInput, Document, Locale, Money, RunningBalance, Tag, TagGroup, TagLink};

pub(crate) fn money(amount: Money, locale: Locale) -> MoneyView {
    MoneyView {
        minor: amount.minor(),
        formatted: amount.format(locale),
    }
}

pub(crate) fn amount_input(amount: Amount) -> AmountInput {
    match amount {
        Amount::Number(value) => AmountInput::Number(value),
        Amount::Text(value) => AmountInput::Text(value),
    }
}

pub(crate) fn tag(tag: Tag) -> TagView {
    TagView {
        id: tag.id,
        tag_group_id: tag.tag_group_id,
        name: tag.name,
        color: tag.color,
        position: tag.position,
    }
}

pub(crate) fn tag_group(group: TagGroup) -> TagGroupView {
    TagGroupView {
        id: group.id,
        name: group.name,
        position: group.position,
        tags: group.tags.into_iter().map(tag).collect(),
    }
}

pub(crate) fn document(doc: Document) -> DocumentView {
    DocumentView {
        id: doc.id,
        transaction_id: doc.transaction_id,
        filename: doc.filename,
        size_bytes: doc.size_bytes,
        position: doc.position,
        created_at: doc.created_at,
    }
}

pub(crate) fn transaction(view: engine::TransactionView, locale: Locale) -> TransactionView {
    let tx = view.transaction;
    TransactionView {
        id: tx.id,
        date: tx.date,
        amount: money(tx.amount, locale),
        effective_amount: money(view.effective_amount, locale),
        description: tx.description,
        note: tx.note,
        parent_id: tx.parent_id,
        has_children: view.has_children,
        children: view.children,
        tags: view.tags.into_iter().map(tag).collect(),
        documents: view.documents.into_iter().map(document).collect(),
        created_at: tx.created_at,
        updated_at: tx.updated_at,
    }
}

pub(crate) fn tag_link(link: TagLink) -> TagLinkOutcome {
    match link {
        TagLink::Added => TagLinkOutcome::Added,
        TagLink::AlreadyAssociated => TagLinkOutcome::AlreadyAssociated,
        TagLink::Removed => TagLinkOutcome::Removed,
        TagLink::AlreadyAbsent => TagLinkOutcome::AlreadyAbsent,
    }
}

pub(crate) fn running_balance(sheet: RunningBalance, locale: Locale) -> BalanceResponse {
    let final_balance = money(sheet.final_balance(), locale);
    BalanceResponse {
        initial: money(sheet.initial, locale),
        final_balance,
        groups: sheet
            .groups
            .into_iter()
            .map(|group| DateGroupView {
                date: group.date,
                net: money(group.net, locale),
                balance: money(group.balance, locale),
                lines: group
                    .lines
                    .into_iter()
                    .map(|line| LineView {
                        transaction_id: line.transaction_id,
                        amount: money(line.amount, locale),
                        kind: match line.kind {
                            engine::LineKind::Standalone => LineKind::Standalone,
                            engine::LineKind::Residual => LineKind::Residual,
                            engine::LineKind::Child => LineKind::Child,
                        },
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_view_follows_locale() {
        let amount = Money::new(-123_456);
        assert_eq!(money(amount, Locale::PtBr).formatted, "-R$ 1.234,56");
        assert_eq!(money(amount, Locale::EnUs).formatted, "-R$1,234.56");
        assert_eq!(money(amount, Locale::EnUs).minor, -123_456);
    }
}
