//! Tags: colored labels attachable to transactions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub tag_group_id: Uuid,
    pub name: String,
    /// Lowercase `#rgb` or `#rrggbb`.
    pub color: String,
    pub position: u32,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tag_group_id: String,
    pub name: String,
    pub name_norm: String,
    pub color: String,
    pub position: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tag_groups::Entity",
        from = "Column::TagGroupId",
        to = "super::tag_groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TagGroup,
    #[sea_orm(has_many = "super::transaction_tags::Entity")]
    TransactionTags,
}

impl Related<super::tag_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TagGroup.def()
    }
}

impl Related<super::transaction_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Tag {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "tag")?,
            tag_group_id: parse_uuid(&model.tag_group_id, "tag group")?,
            name: model.name,
            color: model.color,
            position: u32::try_from(model.position).unwrap_or_default(),
        })
    }
}
