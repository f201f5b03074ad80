//! Contact hint entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "contact_hints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String, // "{viewer role}_chat_{counterparty profile id}"
    pub value: String, // JSON {userId, username, email}
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
