// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 创建上传与工作流生命周期表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    /// 应用数据库迁移
    ///
    /// # 参数
    ///
    /// * `manager` - 数据库模式管理器
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 迁移成功
    /// * `Err(DbErr)` - 迁移失败
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. upload_tasks
        let mut table = Table::create();
        table
            .table(UploadTasks::Table)
            .if_not_exists()
            .col(ColumnDef::new(UploadTasks::Id).uuid().not_null().primary_key())
            .col(
                ColumnDef::new(UploadTasks::TaskId)
                    .string()
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(UploadTasks::OriginalName).string().not_null())
            .col(ColumnDef::new(UploadTasks::FileSize).big_integer().not_null())
            .col(ColumnDef::new(UploadTasks::MimeType).string().not_null())
            .col(ColumnDef::new(UploadTasks::UploadType).string().not_null())
            .col(ColumnDef::new(UploadTasks::Status).string().not_null())
            .col(
                ColumnDef::new(UploadTasks::Progress)
                    .double()
                    .not_null()
                    .default(0.0),
            )
            .col(
                ColumnDef::new(UploadTasks::UploadedSize)
                    .big_integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(UploadTasks::TotalChunks).integer().null())
            .col(
                ColumnDef::new(UploadTasks::UploadedChunks)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(UploadTasks::ChunkSize).big_integer().null())
            .col(ColumnDef::new(UploadTasks::FileMd5).string().null())
            .col(ColumnDef::new(UploadTasks::UploaderId).string().not_null())
            .col(ColumnDef::new(UploadTasks::FileId).uuid().null())
            .col(ColumnDef::new(UploadTasks::StoragePath).string().null())
            .col(ColumnDef::new(UploadTasks::TempPath).string().null())
            .col(ColumnDef::new(UploadTasks::StartedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadTasks::CompletedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadTasks::FailedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadTasks::DurationMs).big_integer().null())
            .col(ColumnDef::new(UploadTasks::Error).json().null())
            .col(
                ColumnDef::new(UploadTasks::RetryCount)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(UploadTasks::MaxRetries)
                    .integer()
                    .not_null()
                    .default(3),
            )
            .col(ColumnDef::new(UploadTasks::NextRetryAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadTasks::UploadConfig).json().null())
            .col(ColumnDef::new(UploadTasks::Metadata).json().not_null());
        record_columns(&mut table);
        manager.create_table(table.to_owned()).await?;

        // 2. upload_chunks (Depends on upload_tasks)
        let mut table = Table::create();
        table
            .table(UploadChunks::Table)
            .if_not_exists()
            .col(ColumnDef::new(UploadChunks::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(UploadChunks::TaskId).uuid().not_null())
            .col(ColumnDef::new(UploadChunks::ChunkIndex).integer().not_null())
            .col(ColumnDef::new(UploadChunks::ChunkSize).big_integer().not_null())
            .col(ColumnDef::new(UploadChunks::ChunkMd5).string().not_null())
            .col(ColumnDef::new(UploadChunks::Status).string().not_null())
            .col(ColumnDef::new(UploadChunks::StoragePath).string().null())
            .col(ColumnDef::new(UploadChunks::TempPath).string().null())
            .col(ColumnDef::new(UploadChunks::Etag).string().null())
            .col(ColumnDef::new(UploadChunks::StartedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadChunks::UploadedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadChunks::FailedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UploadChunks::DurationMs).big_integer().null())
            .col(ColumnDef::new(UploadChunks::Error).json().null())
            .col(
                ColumnDef::new(UploadChunks::RetryCount)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(UploadChunks::MaxRetries)
                    .integer()
                    .not_null()
                    .default(3),
            )
            .col(ColumnDef::new(UploadChunks::Metadata).json().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_upload_chunks_task")
                    .from(UploadChunks::Table, UploadChunks::TaskId)
                    .to(UploadTasks::Table, UploadTasks::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        record_columns(&mut table);
        manager.create_table(table.to_owned()).await?;

        // 3. workflows
        let mut table = Table::create();
        table
            .table(Workflows::Table)
            .if_not_exists()
            .col(ColumnDef::new(Workflows::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Workflows::Name).string().not_null())
            .col(ColumnDef::new(Workflows::Description).text().null())
            .col(ColumnDef::new(Workflows::WorkflowType).string().not_null())
            .col(ColumnDef::new(Workflows::Category).string().not_null())
            .col(ColumnDef::new(Workflows::Status).string().not_null())
            .col(
                ColumnDef::new(Workflows::IsTemplate)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(Workflows::Revision).string().not_null())
            .col(ColumnDef::new(Workflows::CreatorId).string().not_null())
            .col(ColumnDef::new(Workflows::ProjectId).uuid().null())
            .col(ColumnDef::new(Workflows::Definition).json().null())
            .col(ColumnDef::new(Workflows::Tags).json().not_null())
            .col(ColumnDef::new(Workflows::Statistics).json().not_null());
        record_columns(&mut table);
        manager.create_table(table.to_owned()).await?;

        // 4. workflow_executions (Depends on workflows)
        let mut table = Table::create();
        table
            .table(WorkflowExecutions::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(WorkflowExecutions::Id)
                    .uuid()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(WorkflowExecutions::WorkflowId).uuid().not_null())
            .col(ColumnDef::new(WorkflowExecutions::ExecutorId).string().not_null())
            .col(ColumnDef::new(WorkflowExecutions::Status).string().not_null())
            .col(ColumnDef::new(WorkflowExecutions::Priority).string().not_null())
            .col(ColumnDef::new(WorkflowExecutions::TriggerType).string().not_null())
            .col(ColumnDef::new(WorkflowExecutions::Trigger).json().not_null())
            .col(ColumnDef::new(WorkflowExecutions::InputData).json().null())
            .col(ColumnDef::new(WorkflowExecutions::OutputData).json().null())
            .col(ColumnDef::new(WorkflowExecutions::CurrentNodeId).string().null())
            .col(ColumnDef::new(WorkflowExecutions::NodeHistory).json().not_null())
            .col(ColumnDef::new(WorkflowExecutions::Progress).json().not_null())
            .col(ColumnDef::new(WorkflowExecutions::StartedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(WorkflowExecutions::CompletedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(WorkflowExecutions::PausedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(WorkflowExecutions::ResumedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(WorkflowExecutions::FailedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(WorkflowExecutions::DurationMs).big_integer().null())
            .col(ColumnDef::new(WorkflowExecutions::Error).json().null())
            .col(ColumnDef::new(WorkflowExecutions::RetryInfo).json().not_null())
            .col(
                ColumnDef::new(WorkflowExecutions::NextRetryAt)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(ColumnDef::new(WorkflowExecutions::Logs).json().not_null())
            .col(ColumnDef::new(WorkflowExecutions::Approvals).json().not_null())
            .col(ColumnDef::new(WorkflowExecutions::Notifications).json().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_workflow_executions_workflow")
                    .from(WorkflowExecutions::Table, WorkflowExecutions::WorkflowId)
                    .to(Workflows::Table, Workflows::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        record_columns(&mut table);
        manager.create_table(table.to_owned()).await?;

        // Indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_upload_chunks_task_index")
                    .table(UploadChunks::Table)
                    .col(UploadChunks::TaskId)
                    .col(UploadChunks::ChunkIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_upload_tasks_status_retry")
                    .table(UploadTasks::Table)
                    .col(UploadTasks::Status)
                    .col(UploadTasks::NextRetryAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_upload_tasks_uploader")
                    .table(UploadTasks::Table)
                    .col(UploadTasks::UploaderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflows_status")
                    .table(Workflows::Table)
                    .col(Workflows::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_executions_workflow_status")
                    .table(WorkflowExecutions::Table)
                    .col(WorkflowExecutions::WorkflowId)
                    .col(WorkflowExecutions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_executions_status_retry")
                    .table(WorkflowExecutions::Table)
                    .col(WorkflowExecutions::Status)
                    .col(WorkflowExecutions::NextRetryAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkflowExecutions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workflows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UploadChunks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UploadTasks::Table).to_owned())
            .await
    }
}

/// 所有表共有的记录字段：时间戳、软删除、操作人、乐观锁版本号
fn record_columns(table: &mut TableCreateStatement) {
    table
        .col(
            ColumnDef::new(Record::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Record::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(Record::DeletedAt).timestamp_with_time_zone().null())
        .col(ColumnDef::new(Record::CreatedBy).string().null())
        .col(ColumnDef::new(Record::UpdatedBy).string().null())
        .col(ColumnDef::new(Record::Version).integer().not_null().default(1))
        .col(
            ColumnDef::new(Record::IsActive)
                .boolean()
                .not_null()
                .default(true),
        )
        .col(ColumnDef::new(Record::SortOrder).integer().not_null().default(0))
        .col(ColumnDef::new(Record::Remark).text().null());
}

#[derive(DeriveIden)]
enum Record {
    CreatedAt,
    UpdatedAt,
    DeletedAt,
    CreatedBy,
    UpdatedBy,
    Version,
    IsActive,
    SortOrder,
    Remark,
}

#[derive(DeriveIden)]
enum UploadTasks {
    Table,
    Id,
    TaskId,
    OriginalName,
    FileSize,
    MimeType,
    UploadType,
    Status,
    Progress,
    UploadedSize,
    TotalChunks,
    UploadedChunks,
    ChunkSize,
    FileMd5,
    UploaderId,
    FileId,
    StoragePath,
    TempPath,
    StartedAt,
    CompletedAt,
    FailedAt,
    DurationMs,
    Error,
    RetryCount,
    MaxRetries,
    NextRetryAt,
    UploadConfig,
    Metadata,
}

#[derive(DeriveIden)]
enum UploadChunks {
    Table,
    Id,
    TaskId,
    ChunkIndex,
    ChunkSize,
    ChunkMd5,
    Status,
    StoragePath,
    TempPath,
    Etag,
    StartedAt,
    UploadedAt,
    FailedAt,
    DurationMs,
    Error,
    RetryCount,
    MaxRetries,
    Metadata,
}

#[derive(DeriveIden)]
enum Workflows {
    Table,
    Id,
    Name,
    Description,
    WorkflowType,
    Category,
    Status,
    IsTemplate,
    Revision,
    CreatorId,
    ProjectId,
    Definition,
    Tags,
    Statistics,
}

#[derive(DeriveIden)]
enum WorkflowExecutions {
    Table,
    Id,
    WorkflowId,
    ExecutorId,
    Status,
    Priority,
    TriggerType,
    Trigger,
    InputData,
    OutputData,
    CurrentNodeId,
    NodeHistory,
    Progress,
    StartedAt,
    CompletedAt,
    PausedAt,
    ResumedAt,
    FailedAt,
    DurationMs,
    Error,
    RetryInfo,
    NextRetryAt,
    Logs,
    Approvals,
    Notifications,
}
