// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::PageQuery;
use crate::domain::models::workflow::{Workflow, WorkflowStatistics, WorkflowStatus, WorkflowType};
use crate::domain::repositories::workflow_repository::WorkflowQuery;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 工作流概要，不含完整定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub workflow_type: WorkflowType,
    pub status: WorkflowStatus,
    pub revision: String,
    pub version: i32,
    pub node_count: usize,
    pub tags: Vec<String>,
    pub statistics: WorkflowStatistics,
    pub updated_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowSummaryDto {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.meta.id,
            name: workflow.name.clone(),
            workflow_type: workflow.workflow_type,
            status: workflow.status,
            revision: workflow.revision.clone(),
            version: workflow.meta.version,
            node_count: workflow
                .definition
                .as_ref()
                .map(|definition| definition.nodes.len())
                .unwrap_or_default(),
            tags: workflow.tags.clone(),
            statistics: workflow.statistics.clone(),
            updated_at: workflow.meta.updated_at,
        }
    }
}

/// 工作流列表查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct WorkflowListQuery {
    pub status: Option<WorkflowStatus>,
    pub workflow_type: Option<WorkflowType>,
    #[validate(length(min = 1, max = 128))]
    pub creator_id: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl WorkflowListQuery {
    pub fn to_query(&self) -> WorkflowQuery {
        WorkflowQuery {
            status: self.status,
            workflow_type: self.workflow_type,
            creator_id: self.creator_id.clone(),
            page: PageQuery {
                limit: self.limit,
                offset: self.offset,
            }
            .page(),
        }
    }
}
