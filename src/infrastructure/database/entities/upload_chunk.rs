// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "upload_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub task_id: Uuid,
    pub chunk_index: i32,
    pub chunk_size: i64,
    pub chunk_md5: String,
    pub status: String,
    pub storage_path: Option<String>,
    pub temp_path: Option<String>,
    pub etag: Option<String>,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub uploaded_at: Option<ChronoDateTimeWithTimeZone>,
    pub failed_at: Option<ChronoDateTimeWithTimeZone>,
    pub duration_ms: Option<i64>,
    pub error: Option<Json>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub metadata: Json,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
    pub deleted_at: Option<ChronoDateTimeWithTimeZone>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub version: i32,
    pub is_active: bool,
    pub sort_order: i32,
    pub remark: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::upload_task::Entity",
        from = "Column::TaskId",
        to = "super::upload_task::Column::Id",
        on_delete = "Cascade"
    )]
    UploadTask,
}

impl Related<super::upload_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadTask.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
