use sea_orm::entity::prelude::*;

/// A report subscription. At most one per user, enforced by a
/// check-before-insert at subscribe time rather than a storage constraint.
///
/// `report_time` always has zero minutes and seconds; this is validated
/// once at creation and trusted everywhere else.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub start_date: Date,
    pub frequency: String,
    pub report_time: Time,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
