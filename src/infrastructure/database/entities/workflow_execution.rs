// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_executions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub executor_id: String,
    pub status: String,
    pub priority: String,
    pub trigger_type: String,
    pub trigger: Json,
    pub input_data: Option<Json>,
    pub output_data: Option<Json>,
    pub current_node_id: Option<String>,
    pub node_history: Json,
    pub progress: Json,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
    pub paused_at: Option<ChronoDateTimeWithTimeZone>,
    pub resumed_at: Option<ChronoDateTimeWithTimeZone>,
    pub failed_at: Option<ChronoDateTimeWithTimeZone>,
    pub duration_ms: Option<i64>,
    pub error: Option<Json>,
    pub retry_info: Json,
    pub next_retry_at: Option<ChronoDateTimeWithTimeZone>,
    pub logs: Json,
    pub approvals: Json,
    pub notifications: Json,
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
        belongs_to = "super::workflow::Entity",
        from = "Column::WorkflowId",
        to = "super::workflow::Column::Id",
        on_delete = "Cascade"
    )]
    Workflow,
}

impl Related<super::workflow::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workflow.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
