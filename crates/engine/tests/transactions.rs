use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    DocumentStore, Engine, EngineError, Locale, MemoryDocumentStore, Money, NewTransaction,
    ResultEngine, Topic, TransactionFilter, TransactionPatch,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection, Arc<MemoryDocumentStore>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let store = Arc::new(MemoryDocumentStore::default());
    let engine = Engine::builder()
        .database(db.clone())
        .document_store(store.clone())
        .build()
        .await
        .unwrap();
    (engine, db, store)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn scenario_initial_balance_moves_date_group() {
    let (engine, _db, _) = engine_with_db().await;

    engine
        .create_transaction(NewTransaction::new("2023-10-01", "100.00", "Initial Item"))
        .await
        .unwrap();
    let sheet = engine.balance_sheet().await.unwrap();
    assert_eq!(
        sheet.group(date(2023, 10, 1)).unwrap().balance.to_string(),
        "R$ 100,00"
    );

    engine.set_initial_balance("1000.75".into()).await.unwrap();
    assert_eq!(engine.initial_balance().await.unwrap(), Money::new(100_075));
    let sheet = engine.balance_sheet().await.unwrap();
    assert_eq!(
        sheet.group(date(2023, 10, 1)).unwrap().balance.to_string(),
        "R$ 1.100,75"
    );
    assert_eq!(sheet.final_balance(), Money::new(110_075));
}

#[tokio::test]
async fn initial_balance_defaults_to_zero_and_is_durable() {
    let (engine, db, _) = engine_with_db().await;
    assert_eq!(engine.initial_balance().await.unwrap(), Money::ZERO);
    assert_eq!(engine.balance_sheet().await.unwrap().final_balance(), Money::ZERO);

    engine.set_initial_balance(250.5.into()).await.unwrap();
    engine.set_initial_balance("-10,00".into()).await.unwrap();

    let reopened = Engine::builder().database(db).build().await.unwrap();
    assert_eq!(reopened.initial_balance().await.unwrap(), Money::new(-1000));
}

#[tokio::test]
async fn corrupt_initial_balance_is_reported_as_pending() {
    let (engine, db, _) = engine_with_db().await;
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)",
        vec![
            "initial_balance".into(),
            "not a number".into(),
            "2023-10-01T00:00:00Z".into(),
        ],
    ))
    .await
    .unwrap();

    assert!(matches!(
        engine.balance_sheet().await,
        Err(EngineError::PendingDependency(_))
    ));
    assert!(!engine.current_final_balance().await.unwrap().is_ready());
}

#[tokio::test]
async fn create_transaction_validates_input() {
    let (engine, _db, _) = engine_with_db().await;

    let created = engine
        .create_transaction(NewTransaction::new("01/10/2023", "R$ 1.234,56", "  Rent  ").note(" "))
        .await
        .unwrap();
    assert_eq!(created.date, date(2023, 10, 1));
    assert_eq!(created.amount, Money::new(123_456));
    assert_eq!(created.description, "Rent");
    assert_eq!(created.note, None);

    assert!(matches!(
        engine
            .create_transaction(NewTransaction::new("2023-02-30", "1", "x"))
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .create_transaction(NewTransaction::new("2023-02-01", "12.34.5", "x"))
            .await,
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(matches!(
        engine
            .create_transaction(NewTransaction::new("2023-02-01", "1", "   "))
            .await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn amount_limit_is_configurable() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .amount_limit(Money::new(10_000))
        .build()
        .await
        .unwrap();

    assert!(
        engine
            .create_transaction(NewTransaction::new("2023-10-01", "100.00", "ok"))
            .await
            .is_ok()
    );
    assert!(matches!(
        engine
            .create_transaction(NewTransaction::new("2023-10-01", "100.01", "too much"))
            .await,
        Err(EngineError::InvalidAmount(_))
    ));
}

#[tokio::test]
async fn update_transaction_edits_fields() {
    let (engine, _db, _) = engine_with_db().await;
    let created = engine
        .create_transaction(NewTransaction::new("2023-10-01", "-50", "Groceries").note("weekly"))
        .await
        .unwrap();

    let updated = engine
        .update_transaction(
            created.id,
            TransactionPatch::default()
                .amount("-55,90")
                .date("2023-10-02")
                .description("Groceries (market)")
                .note(""),
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, Money::new(-5590));
    assert_eq!(updated.date, date(2023, 10, 2));
    assert_eq!(updated.description, "Groceries (market)");
    assert_eq!(updated.note, None);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        engine
            .update_transaction(missing, TransactionPatch::default().note("x"))
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn scenario_split_locks_parent_fields() {
    let (engine, _db, _) = engine_with_db().await;
    let parent = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-1200.00", "Laptop"))
        .await
        .unwrap();

    let outcome = engine.split_transaction(parent.id, 3).await.unwrap();
    let amounts: Vec<_> = outcome.children.iter().map(|c| c.amount).collect();
    assert_eq!(amounts, vec![Money::new(-40_000); 3]);
    assert_eq!(amounts.iter().sum::<Money>(), Money::new(-120_000));
    for child in &outcome.children {
        assert_eq!(child.parent_id, Some(parent.id));
        assert_eq!(child.date, parent.date);
        assert_eq!(child.description, "Laptop");
        assert_eq!(child.note, None);
    }

    let view = engine.transaction(parent.id).await.unwrap();
    assert!(view.has_children);
    assert_eq!(view.effective_amount, Money::ZERO);
    assert_eq!(view.children.len(), 3);

    for patch in [
        TransactionPatch::default().amount("-1000"),
        TransactionPatch::default().date("2023-11-06"),
        TransactionPatch::default().description("Notebook"),
    ] {
        assert!(matches!(
            engine.update_transaction(parent.id, patch).await,
            Err(EngineError::ImmutableField(_))
        ));
    }

    // Same values are not a change; the note stays editable.
    let noted = engine
        .update_transaction(
            parent.id,
            TransactionPatch::default()
                .amount("-1.200,00")
                .note("paid in 3x"),
        )
        .await
        .unwrap();
    assert_eq!(noted.note.as_deref(), Some("paid in 3x"));

    let sheet = engine.balance_sheet().await.unwrap();
    assert_eq!(sheet.final_balance(), Money::new(-120_000));
}

#[tokio::test]
async fn split_distributes_remainder_cents() {
    let (engine, _db, _) = engine_with_db().await;
    let parent = engine
        .create_transaction(NewTransaction::new("2023-11-05", "100.00", "Dinner"))
        .await
        .unwrap();

    let outcome = engine.split_transaction(parent.id, 3).await.unwrap();
    let formatted: Vec<_> = outcome
        .children
        .iter()
        .map(|c| c.amount.format(Locale::PtBr))
        .collect();
    assert_eq!(formatted, vec!["R$ 33,34", "R$ 33,33", "R$ 33,33"]);
    assert_eq!(
        engine.balance_sheet().await.unwrap().final_balance(),
        Money::new(10_000)
    );
}

#[tokio::test]
async fn split_preconditions_are_checked() {
    let (engine, _db, _) = engine_with_db().await;
    let parent = engine
        .create_transaction(NewTransaction::new("2023-11-05", "10", "Taxi"))
        .await
        .unwrap();

    for parts in [0, 1, 101] {
        assert!(matches!(
            engine.split_transaction(parent.id, parts).await,
            Err(EngineError::Validation(_))
        ));
    }
    assert!(matches!(
        engine.split_transaction(uuid::Uuid::new_v4(), 2).await,
        Err(EngineError::KeyNotFound(_))
    ));

    let outcome = engine.split_transaction(parent.id, 2).await.unwrap();
    assert!(matches!(
        engine.split_transaction(parent.id, 2).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.split_transaction(outcome.children[0].id, 2).await,
        Err(EngineError::Validation(_))
    ));

    let children = engine
        .transactions(TransactionFilter {
            parent_id: Some(parent.id),
            ..TransactionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(children.len(), 2);
}

#[tokio::test]
async fn split_child_inherits_date_and_description() {
    let (engine, _db, _) = engine_with_db().await;
    let parent = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-90", "Market"))
        .await
        .unwrap();
    let outcome = engine.split_transaction(parent.id, 3).await.unwrap();
    let child = &outcome.children[0];

    assert!(matches!(
        engine
            .update_transaction(child.id, TransactionPatch::default().date("2023-11-01"))
            .await,
        Err(EngineError::ImmutableField(_))
    ));
    assert!(matches!(
        engine
            .update_transaction(child.id, TransactionPatch::default().description("Other"))
            .await,
        Err(EngineError::ImmutableField(_))
    ));

    engine
        .update_transaction(child.id, TransactionPatch::default().amount("-20"))
        .await
        .unwrap();
    let view = engine.transaction(parent.id).await.unwrap();
    assert_eq!(view.effective_amount, Money::new(-1000));
    assert_eq!(
        engine.balance_sheet().await.unwrap().final_balance(),
        Money::new(-9000)
    );
}

#[tokio::test]
async fn deleting_children_unlocks_parent() {
    let (engine, _db, _) = engine_with_db().await;
    let parent = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-90", "Market"))
        .await
        .unwrap();
    let outcome = engine.split_transaction(parent.id, 2).await.unwrap();

    engine
        .delete_transaction(outcome.children[0].id)
        .await
        .unwrap();
    let view = engine.transaction(parent.id).await.unwrap();
    assert_eq!(view.effective_amount, Money::new(-4500));
    assert_eq!(
        engine.balance_sheet().await.unwrap().final_balance(),
        Money::new(-9000)
    );

    engine
        .delete_transaction(outcome.children[1].id)
        .await
        .unwrap();
    let view = engine.transaction(parent.id).await.unwrap();
    assert!(!view.has_children);
    engine
        .update_transaction(parent.id, TransactionPatch::default().amount("-80"))
        .await
        .unwrap();
}

#[tokio::test]
async fn deleting_parent_cascades_to_children() {
    let (engine, _db, store) = engine_with_db().await;
    let parent = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-90", "Market"))
        .await
        .unwrap();
    let outcome = engine.split_transaction(parent.id, 2).await.unwrap();
    let child = outcome.children[0].id;

    let group = engine.create_tag_group("Food").await.unwrap();
    let tag = engine.create_tag(group.id, "Groceries", "#0a0").await.unwrap();
    engine.add_tag(child, tag.id).await.unwrap();
    engine
        .attach_document(child, b"receipt", "receipt.pdf")
        .await
        .unwrap();
    assert_eq!(store.len(), 1);

    let deleted = engine.delete_transaction(parent.id).await.unwrap();
    assert_eq!(deleted.len(), 3);
    assert!(matches!(
        engine.transaction(child).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(store.is_empty());
    assert!(
        engine
            .transactions(TransactionFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        engine.delete_transaction(parent.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn documents_are_ordered_and_released() {
    let (engine, _db, store) = engine_with_db().await;
    let tx = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-90", "Market"))
        .await
        .unwrap();

    let first = engine
        .attach_document(tx.id, b"first", "scans/nota.pdf")
        .await
        .unwrap();
    let second = engine
        .attach_document(tx.id, b"second", "photo.jpg")
        .await
        .unwrap();
    assert_eq!(first.filename, "nota.pdf");
    assert_eq!((first.position, second.position), (0, 1));
    assert_eq!(second.size_bytes, 6);

    let (doc, bytes) = engine.document_content(first.id).await.unwrap();
    assert_eq!(doc, first);
    assert_eq!(bytes, b"first".to_vec());

    let view = engine.transaction(tx.id).await.unwrap();
    assert_eq!(view.documents, vec![first.clone(), second.clone()]);

    engine.detach_document(first.id).await.unwrap();
    assert_eq!(store.len(), 1);
    assert!(matches!(
        engine.document_content(first.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.detach_document(first.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert_eq!(engine.documents(tx.id).await.unwrap(), vec![second]);

    assert!(matches!(
        engine.attach_document(tx.id, b"", "empty.txt").await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .attach_document(uuid::Uuid::new_v4(), b"x", "x.txt")
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn attaching_and_detaching_documents_touches_the_transaction() {
    let (engine, _db, _) = engine_with_db().await;
    let created = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-90", "Market"))
        .await
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let document = engine
        .attach_document(created.id, b"receipt", "nota.pdf")
        .await
        .unwrap();
    let attached = engine.transaction(created.id).await.unwrap().transaction;
    assert!(attached.updated_at > created.updated_at);
    assert_eq!(attached.created_at, created.created_at);
    assert_eq!(engine.events().version(Topic::Documents), 1);

    std::thread::sleep(std::time::Duration::from_millis(5));
    engine.detach_document(document.id).await.unwrap();
    let detached = engine.transaction(created.id).await.unwrap().transaction;
    assert!(detached.updated_at > attached.updated_at);
}

/// Keeps bytes in memory but can never delete them.
#[derive(Debug, Default)]
struct UndeletableStore {
    inner: MemoryDocumentStore,
}

impl DocumentStore for UndeletableStore {
    fn put(&self, key: &str, bytes: &[u8]) -> ResultEngine<()> {
        self.inner.put(key, bytes)
    }

    fn get(&self, key: &str) -> ResultEngine<Vec<u8>> {
        self.inner.get(key)
    }

    fn delete(&self, _key: &str) -> ResultEngine<()> {
        Err(EngineError::Storage("read-only volume".to_string()))
    }
}

#[tokio::test]
async fn committed_removals_succeed_when_bytes_cannot_be_released() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let store = Arc::new(UndeletableStore::default());
    let engine = Engine::builder()
        .database(db)
        .document_store(store.clone())
        .build()
        .await
        .unwrap();
    let tx = engine
        .create_transaction(NewTransaction::new("2023-11-05", "-90", "Market"))
        .await
        .unwrap();

    let first = engine.attach_document(tx.id, b"a", "a.pdf").await.unwrap();
    engine.attach_document(tx.id, b"b", "b.pdf").await.unwrap();

    let detached = engine.detach_document(first.id).await.unwrap();
    assert_eq!(detached.id, first.id);
    assert_eq!(engine.documents(tx.id).await.unwrap().len(), 1);

    assert_eq!(engine.delete_transaction(tx.id).await.unwrap(), vec![tx.id]);
    assert!(matches!(
        engine.transaction(tx.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert_eq!(store.inner.len(), 2);
}

#[tokio::test]
async fn listing_a_large_ledger() {
    let (engine, db, _) = engine_with_db().await;
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33001) \
         INSERT INTO transactions \
         (id, date, amount_minor, description, note, parent_id, created_at, updated_at) \
         SELECT printf('00000000-0000-4000-8000-%012d', n), \
                date('2023-01-01', '+' || (n % 365) || ' days'), \
                100, 'Bulk ' || n, NULL, NULL, \
                '2023-01-01T00:00:00Z', '2023-01-01T00:00:00Z' \
         FROM seq",
    ))
    .await
    .unwrap();

    let tagged = engine
        .create_transaction(NewTransaction::new("2024-06-01", "-50", "Tagged"))
        .await
        .unwrap();
    let group = engine.create_tag_group("Categoria").await.unwrap();
    let tag = engine
        .create_tag(group.id, "Mercado", "#0a0")
        .await
        .unwrap();
    engine.add_tag(tagged.id, tag.id).await.unwrap();
    engine
        .attach_document(tagged.id, b"nota", "nota.pdf")
        .await
        .unwrap();

    let listed = engine
        .transactions(TransactionFilter::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 33_002);
    let last = listed.last().unwrap();
    assert_eq!(last.transaction.id, tagged.id);
    assert_eq!(last.tags.len(), 1);
    assert_eq!(last.documents.len(), 1);

    let by_tag = engine
        .transactions(TransactionFilter {
            tag_id: Some(tag.id),
            ..TransactionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(
        engine.balance_sheet().await.unwrap().final_balance(),
        Money::new(33_001 * 100 - 5000)
    );
}

#[tokio::test]
async fn list_filters_by_date_range() {
    let (engine, _db, _) = engine_with_db().await;
    for (day, desc) in [("2023-10-03", "c"), ("2023-10-01", "a"), ("2023-10-02", "b")] {
        engine
            .create_transaction(NewTransaction::new(day, "1", desc))
            .await
            .unwrap();
    }

    let all = engine
        .transactions(TransactionFilter::default())
        .await
        .unwrap();
    let order: Vec<_> = all
        .iter()
        .map(|v| v.transaction.description.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    let ranged = engine
        .transactions(TransactionFilter {
            from: Some(date(2023, 10, 2)),
            to: Some(date(2023, 10, 3)),
            ..TransactionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(ranged.len(), 2);

    assert!(matches!(
        engine
            .transactions(TransactionFilter {
                from: Some(date(2023, 10, 3)),
                to: Some(date(2023, 10, 1)),
                ..TransactionFilter::default()
            })
            .await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn mutations_publish_invalidations() {
    let (engine, _db, _) = engine_with_db().await;
    let mut rx = engine.events().subscribe();

    let tx = engine
        .create_transaction(NewTransaction::new("2023-10-01", "1", "x"))
        .await
        .unwrap();
    assert_eq!(engine.events().version(Topic::Transactions), 1);
    assert_eq!(engine.events().version(Topic::Balance), 1);
    assert_eq!(rx.try_recv().unwrap().topic, Topic::Transactions);

    // Failed mutations publish nothing.
    let _ = engine.split_transaction(tx.id, 1).await;
    assert_eq!(engine.events().version(Topic::Transactions), 1);

    engine.set_initial_balance("5".into()).await.unwrap();
    assert_eq!(engine.events().version(Topic::Balance), 2);
    assert_eq!(engine.events().version(Topic::Transactions), 1);
}
