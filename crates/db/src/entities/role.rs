//! Role entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A named access level. Rows are seeded by migration and never change at runtime.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// "user", "moderator" or "admin"
    #[sea_orm(unique)]
    pub name: String,

    /// Higher levels strictly dominate lower ones.
    pub level: i32,

    #[sea_orm(column_type = "Text")]
    pub description: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
