//! Action items — back-office tasks persisted as JSON files.
//!
//! Each processed request becomes one `<id>.json` file in the output
//! directory, carrying the request, a context snapshot, and the assignee.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::{MaintenanceTicket, TenantContext};
use crate::error::WorkflowError;
use crate::pipeline::types::{RequestRecord, RequestType};

/// Status of a freshly created action item.
pub const PENDING: &str = "pending";

/// Context snapshot embedded in an action item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub rent_balance: String,
    pub lease_end_date: NaiveDate,
    pub maintenance_history: Vec<MaintenanceTicket>,
}

/// A persisted back-office task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub created_at: String,
    pub action_type: String,
    pub tenant_name: String,
    pub address: Option<String>,
    pub subject: String,
    pub summary: String,
    pub request_type: RequestType,
    pub context: ActionContext,
    pub status: String,
    pub assignee: String,
}

/// Action type for a request type.
pub fn action_type_for(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::Maintenance => "maintenance_ticket",
        RequestType::Payment => "payment_reminder",
        RequestType::Lease => "lease_info_request",
        RequestType::General => "general_inquiry",
    }
}

/// 10 lowercase hex characters.
pub fn generate_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(10);
    id
}

/// Creates action items and writes them to disk.
pub struct ActionItemWriter {
    output_dir: PathBuf,
}

impl ActionItemWriter {
    /// Creates `output_dir` (and parents) if missing.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, WorkflowError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn create_action_item(
        &self,
        request: &RequestRecord,
        subject: &str,
        context: &TenantContext,
    ) -> ActionItem {
        ActionItem {
            id: generate_id(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            action_type: action_type_for(request.request_type).to_string(),
            tenant_name: request.tenant_name.clone(),
            address: request.address.clone(),
            subject: subject.to_string(),
            summary: request.summary.clone(),
            request_type: request.request_type,
            context: ActionContext {
                rent_balance: context.rent_balance.clone(),
                lease_end_date: context.lease_end_date,
                maintenance_history: context.maintenance_history.clone(),
            },
            status: PENDING.to_string(),
            assignee: context.property_manager.clone(),
        }
    }

    /// Write the item as pretty JSON to `<output_dir>/<id>.json`.
    pub fn save_action_item(&self, item: &ActionItem) -> Result<PathBuf, WorkflowError> {
        let path = self.output_dir.join(format!("{}.json", item.id));
        let json = serde_json::to_string_pretty(item)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Create and save an action item. Returns its id.
    pub fn process(
        &self,
        request: &RequestRecord,
        subject: &str,
        context: &TenantContext,
    ) -> Result<String, WorkflowError> {
        let item = self.create_action_item(request, subject, context);
        let path = self.save_action_item(&item)?;
        info!(
            id = %item.id,
            action_type = %item.action_type,
            path = %path.display(),
            "Action item saved"
        );
        Ok(item.id)
    }
}
