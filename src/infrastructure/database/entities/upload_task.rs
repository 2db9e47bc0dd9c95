// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "upload_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub task_id: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub upload_type: String,
    pub status: String,
    pub progress: f64,
    pub uploaded_size: i64,
    pub total_chunks: Option<i32>,
    pub uploaded_chunks: i32,
    pub chunk_size: Option<i64>,
    pub file_md5: Option<String>,
    pub uploader_id: String,
    pub file_id: Option<Uuid>,
    pub storage_path: Option<String>,
    pub temp_path: Option<String>,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
    pub failed_at: Option<ChronoDateTimeWithTimeZone>,
    pub duration_ms: Option<i64>,
    pub error: Option<Json>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<ChronoDateTimeWithTimeZone>,
    pub upload_config: Option<Json>,
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
    #[sea_orm(has_many = "super::upload_chunk::Entity")]
    UploadChunk,
}

impl Related<super::upload_chunk::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadChunk.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
