use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A task owned by one user.
///
/// `status` is one of `Pending`/`Completed`/`Overdue` by convention only;
/// the column accepts any string and filters compare it verbatim.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Date,
    pub due_date: Date,
    pub completion_date: Option<Date>,
    pub status: String,
    #[serde(skip)]
    pub user_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
