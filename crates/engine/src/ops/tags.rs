use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Tag, TagGroup, TagPatch, Topic, tag_groups, tags,
    transaction_tags,
    util::{normalize_color, normalize_name_key, normalize_required_name, parse_uuid},
};

use super::{Engine, with_tx};

fn group_not_found(id: Uuid) -> EngineError {
    EngineError::KeyNotFound(format!("tag group {id}"))
}

fn tag_not_found(id: Uuid) -> EngineError {
    EngineError::KeyNotFound(format!("tag {id}"))
}

fn tag_group_from(model: tag_groups::Model, tags: Vec<Tag>) -> ResultEngine<TagGroup> {
    Ok(TagGroup {
        id: parse_uuid(&model.id, "tag group")?,
        name: model.name,
        position: u32::try_from(model.position).unwrap_or_default(),
        tags,
    })
}

impl Engine {
    /// Creates a tag group. Names are unique ignoring case and accents.
    pub async fn create_tag_group(&self, name: &str) -> ResultEngine<TagGroup> {
        let name = normalize_required_name(name, "tag group name")?;
        let name_norm = normalize_name_key(&name);

        let group = with_tx!(self, |db_tx| {
            ensure_group_name_free(&db_tx, &name, &name_norm, None).await?;
            let position = tag_groups::Entity::find()
                .order_by_desc(tag_groups::Column::Position)
                .one(&db_tx)
                .await?
                .map_or(0, |last| last.position + 1);

            let model = tag_groups::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4().to_string()),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(name_norm.clone()),
                position: ActiveValue::Set(position),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            tag_group_from(model, Vec::new())
        })?;

        self.events.publish(&[Topic::Tags]);
        Ok(group)
    }

    pub async fn rename_tag_group(&self, id: Uuid, name: &str) -> ResultEngine<TagGroup> {
        let name = normalize_required_name(name, "tag group name")?;
        let name_norm = normalize_name_key(&name);

        let group = with_tx!(self, |db_tx| {
            let model = tag_groups::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| group_not_found(id))?;
            ensure_group_name_free(&db_tx, &name, &name_norm, Some(&model.id)).await?;

            let mut active: tag_groups::ActiveModel = model.into();
            active.name = ActiveValue::Set(name.clone());
            active.name_norm = ActiveValue::Set(name_norm.clone());
            let model = active.update(&db_tx).await?;
            let tags = group_tags(&db_tx, &model.id).await?;
            tag_group_from(model, tags)
        })?;

        self.events.publish(&[Topic::Tags]);
        Ok(group)
    }

    /// Deletes a group together with its tags and their transaction
    /// associations.
    pub async fn delete_tag_group(&self, id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = tag_groups::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| group_not_found(id))?;
            let tag_ids: Vec<String> = tags::Entity::find()
                .filter(tags::Column::TagGroupId.eq(model.id.clone()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|tag| tag.id)
                .collect();

            transaction_tags::Entity::delete_many()
                .filter(transaction_tags::Column::TagId.is_in(tag_ids))
                .exec(&db_tx)
                .await?;
            tags::Entity::delete_many()
                .filter(tags::Column::TagGroupId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            tag_groups::Entity::delete_by_id(model.id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })?;

        self.events.publish(&[Topic::Tags, Topic::TransactionTags]);
        Ok(())
    }

    /// All groups ordered by position, each with its tags ordered by position.
    pub async fn tag_groups(&self) -> ResultEngine<Vec<TagGroup>> {
        let mut tags_by_group: HashMap<String, Vec<Tag>> = HashMap::new();
        for model in tags::Entity::find()
            .order_by_asc(tags::Column::Position)
            .all(&self.database)
            .await?
        {
            tags_by_group
                .entry(model.tag_group_id.clone())
                .or_default()
                .push(Tag::try_from(model)?);
        }

        tag_groups::Entity::find()
            .order_by_asc(tag_groups::Column::Position)
            .all(&self.database)
            .await?
            .into_iter()
            .map(|model| {
                let tags = tags_by_group.remove(&model.id).unwrap_or_default();
                tag_group_from(model, tags)
            })
            .collect()
    }

    /// Creates a tag at the end of `group_id`. Names are unique within the
    /// group.
    pub async fn create_tag(&self, group_id: Uuid, name: &str, color: &str) -> ResultEngine<Tag> {
        let name = normalize_required_name(name, "tag name")?;
        let name_norm = normalize_name_key(&name);
        let color = normalize_color(color)?;

        let tag = with_tx!(self, |db_tx| {
            tag_groups::Entity::find_by_id(group_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| group_not_found(group_id))?;
            let group_id = group_id.to_string();
            ensure_tag_name_free(&db_tx, &group_id, &name, &name_norm, None).await?;
            let position = next_tag_position(&db_tx, &group_id).await?;

            let model = tags::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4().to_string()),
                tag_group_id: ActiveValue::Set(group_id),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(name_norm.clone()),
                color: ActiveValue::Set(color.clone()),
                position: ActiveValue::Set(position),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Tag::try_from(model)
        })?;

        self.events.publish(&[Topic::Tags]);
        Ok(tag)
    }

    /// Renames, recolors or moves a tag.
    pub async fn update_tag(&self, id: Uuid, patch: TagPatch) -> ResultEngine<Tag> {
        let name = patch
            .name
            .as_deref()
            .map(|name| normalize_required_name(name, "tag name"))
            .transpose()?;
        let color = patch.color.as_deref().map(normalize_color).transpose()?;

        let tag = with_tx!(self, |db_tx| {
            let model = tags::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| tag_not_found(id))?;

            let target_group = match patch.tag_group_id {
                Some(group_id) => {
                    tag_groups::Entity::find_by_id(group_id.to_string())
                        .one(&db_tx)
                        .await?
                        .ok_or_else(|| group_not_found(group_id))?
                        .id
                }
                None => model.tag_group_id.clone(),
            };
            let moved = target_group != model.tag_group_id;
            let name = name.clone().unwrap_or_else(|| model.name.clone());
            let name_norm = normalize_name_key(&name);
            if moved || name_norm != model.name_norm {
                ensure_tag_name_free(&db_tx, &target_group, &name, &name_norm, Some(&model.id))
                    .await?;
            }
            let position = if moved {
                Some(next_tag_position(&db_tx, &target_group).await?)
            } else {
                None
            };

            let mut active: tags::ActiveModel = model.into();
            active.name = ActiveValue::Set(name);
            active.name_norm = ActiveValue::Set(name_norm);
            if let Some(color) = color.clone() {
                active.color = ActiveValue::Set(color);
            }
            if let Some(position) = position {
                active.tag_group_id = ActiveValue::Set(target_group);
                active.position = ActiveValue::Set(position);
            }
            let model = active.update(&db_tx).await?;
            Tag::try_from(model)
        })?;

        self.events.publish(&[Topic::Tags, Topic::TransactionTags]);
        Ok(tag)
    }

    /// Deletes a tag and removes it from every transaction.
    pub async fn delete_tag(&self, id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = tags::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| tag_not_found(id))?;
            transaction_tags::Entity::delete_many()
                .filter(transaction_tags::Column::TagId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            tags::Entity::delete_by_id(model.id).exec(&db_tx).await?;
            Ok(())
        })?;

        self.events.publish(&[Topic::Tags, Topic::TransactionTags]);
        Ok(())
    }

    /// All tags, grouped by group and ordered by position.
    pub async fn tags(&self) -> ResultEngine<Vec<Tag>> {
        Ok(self
            .tag_groups()
            .await?
            .into_iter()
            .flat_map(|group| group.tags)
            .collect())
    }
}

async fn ensure_group_name_free<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    name_norm: &str,
    except: Option<&str>,
) -> ResultEngine<()> {
    let mut query = tag_groups::Entity::find().filter(tag_groups::Column::NameNorm.eq(name_norm));
    if let Some(id) = except {
        query = query.filter(tag_groups::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(EngineError::ExistingKey(format!("tag group {name}")));
    }
    Ok(())
}

async fn ensure_tag_name_free<C: ConnectionTrait>(
    conn: &C,
    group_id: &str,
    name: &str,
    name_norm: &str,
    except: Option<&str>,
) -> ResultEngine<()> {
    let mut query = tags::Entity::find()
        .filter(tags::Column::TagGroupId.eq(group_id))
        .filter(tags::Column::NameNorm.eq(name_norm));
    if let Some(id) = except {
        query = query.filter(tags::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(EngineError::ExistingKey(format!("tag {name}")));
    }
    Ok(())
}

async fn next_tag_position<C: ConnectionTrait>(conn: &C, group_id: &str) -> ResultEngine<i32> {
    Ok(tags::Entity::find()
        .filter(tags::Column::TagGroupId.eq(group_id))
        .order_by_desc(tags::Column::Position)
        .one(conn)
        .await?
        .map_or(0, |last| last.position + 1))
}

async fn group_tags<C: ConnectionTrait>(conn: &C, group_id: &str) -> ResultEngine<Vec<Tag>> {
    tags::Entity::find()
        .filter(tags::Column::TagGroupId.eq(group_id))
        .order_by_asc(tags::Column::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(Tag::try_from)
        .collect()
}
