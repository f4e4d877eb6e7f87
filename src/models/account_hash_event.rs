// Historique des changements d'account_hash (login MT5) d'une licence

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const ACTION_INITIAL_SET: &str = "initial_set";
pub const ACTION_REPLACED: &str = "replaced";
pub const ACTION_UPDATED: &str = "updated";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_hash_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub license_id: i32,
    pub account_hash: String,
    pub action: String, // 'initial_set', 'replaced', 'updated'
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::license::Entity",
        from = "Column::LicenseId",
        to = "super::license::Column::Id",
        on_delete = "Cascade"
    )]
    License,
}

impl Related<super::license::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::License.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
