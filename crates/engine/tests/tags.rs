use sea_orm::Database;

use engine::{
    Engine, EngineError, NewTransaction, TagLink, TagPatch, Topic, TransactionFilter,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

#[tokio::test]
async fn scenario_tag_association_is_idempotent() {
    let engine = engine_with_db().await;
    let group = engine.create_tag_group("Categoria").await.unwrap();
    let tag = engine
        .create_tag(group.id, "Alimentação", "#FF8800")
        .await
        .unwrap();
    assert_eq!(tag.color, "#ff8800");
    let tx = engine
        .create_transaction(NewTransaction::new("2023-10-01", "-35,50", "Padaria"))
        .await
        .unwrap();

    assert_eq!(engine.add_tag(tx.id, tag.id).await.unwrap(), TagLink::Added);
    let version = engine.events().version(Topic::TransactionTags);
    assert_eq!(
        engine.add_tag(tx.id, tag.id).await.unwrap(),
        TagLink::AlreadyAssociated
    );
    assert_eq!(engine.events().version(Topic::TransactionTags), version);

    let view = engine.transaction(tx.id).await.unwrap();
    assert_eq!(view.tags, vec![tag.clone()]);

    assert_eq!(
        engine.remove_tag(tx.id, tag.id).await.unwrap(),
        TagLink::Removed
    );
    assert_eq!(
        engine.remove_tag(tx.id, tag.id).await.unwrap(),
        TagLink::AlreadyAbsent
    );
    assert!(engine.transaction(tx.id).await.unwrap().tags.is_empty());
}

#[tokio::test]
async fn tag_links_require_existing_rows() {
    let engine = engine_with_db().await;
    let group = engine.create_tag_group("Categoria").await.unwrap();
    let tag = engine.create_tag(group.id, "Casa", "#123").await.unwrap();
    let tx = engine
        .create_transaction(NewTransaction::new("2023-10-01", "1", "x"))
        .await
        .unwrap();

    assert!(matches!(
        engine.add_tag(uuid::Uuid::new_v4(), tag.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.add_tag(tx.id, uuid::Uuid::new_v4()).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.remove_tag(uuid::Uuid::new_v4(), tag.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn names_are_unique_ignoring_case_and_accents() {
    let engine = engine_with_db().await;
    let group = engine.create_tag_group("Categoria").await.unwrap();
    assert!(matches!(
        engine.create_tag_group("  CATEGORÍA ").await,
        Err(EngineError::ExistingKey(_))
    ));

    engine
        .create_tag(group.id, "Alimentação", "#000")
        .await
        .unwrap();
    assert!(matches!(
        engine.create_tag(group.id, "alimentacao", "#000").await,
        Err(EngineError::ExistingKey(_))
    ));

    // The same tag name is fine in another group.
    let other = engine.create_tag_group("Pessoa").await.unwrap();
    engine
        .create_tag(other.id, "Alimentação", "#000")
        .await
        .unwrap();

    assert!(matches!(
        engine.rename_tag_group(other.id, "categoria").await,
        Err(EngineError::ExistingKey(_))
    ));
    let renamed = engine.rename_tag_group(other.id, "Pessoas").await.unwrap();
    assert_eq!(renamed.name, "Pessoas");
    assert_eq!(renamed.tags.len(), 1);
}

#[tokio::test]
async fn tag_input_is_validated() {
    let engine = engine_with_db().await;
    let group = engine.create_tag_group("Categoria").await.unwrap();

    for color in ["red", "#12", "#GGGGGG", ""] {
        assert!(matches!(
            engine.create_tag(group.id, "Casa", color).await,
            Err(EngineError::Validation(_))
        ));
    }
    assert!(matches!(
        engine.create_tag(group.id, "   ", "#fff").await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.create_tag_group("").await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine
            .create_tag(uuid::Uuid::new_v4(), "Casa", "#fff")
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn groups_and_tags_keep_creation_order() {
    let engine = engine_with_db().await;
    let first = engine.create_tag_group("Categoria").await.unwrap();
    let second = engine.create_tag_group("Projeto").await.unwrap();
    assert_eq!((first.position, second.position), (0, 1));

    for name in ["Casa", "Carro", "Lazer"] {
        engine.create_tag(first.id, name, "#abc").await.unwrap();
    }
    let groups = engine.tag_groups().await.unwrap();
    assert_eq!(groups.len(), 2);
    let names: Vec<_> = groups[0].tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Casa", "Carro", "Lazer"]);
    let positions: Vec<_> = groups[0].tags.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert!(groups[1].tags.is_empty());
    assert_eq!(engine.tags().await.unwrap().len(), 3);
}

#[tokio::test]
async fn moving_a_tag_appends_it_to_the_target_group() {
    let engine = engine_with_db().await;
    let from = engine.create_tag_group("Categoria").await.unwrap();
    let to = engine.create_tag_group("Projeto").await.unwrap();
    let moving = engine.create_tag(from.id, "Reforma", "#abc").await.unwrap();
    engine.create_tag(to.id, "Viagem", "#abc").await.unwrap();
    engine.create_tag(to.id, "reforma", "#abc").await.unwrap();

    assert!(matches!(
        engine
            .update_tag(
                moving.id,
                TagPatch {
                    tag_group_id: Some(to.id),
                    ..TagPatch::default()
                }
            )
            .await,
        Err(EngineError::ExistingKey(_))
    ));

    let moved = engine
        .update_tag(
            moving.id,
            TagPatch {
                name: Some("Obra".to_string()),
                color: Some("#ABCDEF".to_string()),
                tag_group_id: Some(to.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.tag_group_id, to.id);
    assert_eq!(moved.position, 2);
    assert_eq!(moved.name, "Obra");
    assert_eq!(moved.color, "#abcdef");
    assert!(engine.tag_groups().await.unwrap()[0].tags.is_empty());
}

#[tokio::test]
async fn deleting_tags_and_groups_drops_associations() {
    let engine = engine_with_db().await;
    let group = engine.create_tag_group("Categoria").await.unwrap();
    let casa = engine.create_tag(group.id, "Casa", "#abc").await.unwrap();
    let carro = engine.create_tag(group.id, "Carro", "#abc").await.unwrap();
    let tx = engine
        .create_transaction(NewTransaction::new("2023-10-01", "-100", "IPVA"))
        .await
        .unwrap();
    engine.add_tag(tx.id, casa.id).await.unwrap();
    engine.add_tag(tx.id, carro.id).await.unwrap();

    engine.delete_tag(casa.id).await.unwrap();
    let view = engine.transaction(tx.id).await.unwrap();
    assert_eq!(view.tags, vec![carro.clone()]);
    assert!(matches!(
        engine.delete_tag(casa.id).await,
        Err(EngineError::KeyNotFound(_))
    ));

    engine.delete_tag_group(group.id).await.unwrap();
    assert!(engine.transaction(tx.id).await.unwrap().tags.is_empty());
    assert!(engine.tag_groups().await.unwrap().is_empty());
    assert!(engine.tags().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_filters_by_tag() {
    let engine = engine_with_db().await;
    let group = engine.create_tag_group("Categoria").await.unwrap();
    let tag = engine.create_tag(group.id, "Lazer", "#abc").await.unwrap();
    let tagged = engine
        .create_transaction(NewTransaction::new("2023-10-01", "-60", "Cinema"))
        .await
        .unwrap();
    engine
        .create_transaction(NewTransaction::new("2023-10-01", "-10", "Ônibus"))
        .await
        .unwrap();
    engine.add_tag(tagged.id, tag.id).await.unwrap();

    let views = engine
        .transactions(TransactionFilter {
            tag_id: Some(tag.id),
            ..TransactionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].transaction.id, tagged.id);
}
