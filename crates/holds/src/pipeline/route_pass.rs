use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::Result,
    io::history::RouteHistoryRecord,
    route::{RouteAssembler, RouteRequest},
    traits::{HistoryStore, ImageStore},
    types::RouteOutcome,
};

/// Content type of stored route photographs.
pub const ROUTE_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub outcome: RouteOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RouteHistoryRecord>,
}

/// Route grading followed by the history write.
#[derive(Clone)]
pub struct RouteGradingService {
    assembler: RouteAssembler,
    images: Arc<dyn ImageStore>,
    history: Arc<dyn HistoryStore>,
}

impl RouteGradingService {
    pub fn new(assembler: RouteAssembler, images: Arc<dyn ImageStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            assembler,
            images,
            history,
        }
    }

    pub fn assembler(&self) -> &RouteAssembler {
        &self.assembler
    }

    /// Grade the route and, when it is gradable, store the JPEG photograph
    /// (if any) and a history record for it.
    pub fn grade_and_record(
        &self,
        request: &RouteRequest,
        photo_jpeg: Option<&[u8]>,
        user: Option<&str>,
    ) -> Result<RouteReport> {
        let outcome = self.assembler.assemble(request);
        let grade = outcome.score().map(|score| score.grade.clone());
        let Some(grade) = grade else {
            return Ok(RouteReport { outcome, record: None });
        };

        let storage_key = RouteHistoryRecord::new_storage_key();
        if let Some(bytes) = photo_jpeg {
            self.images.put_image(&storage_key, bytes, ROUTE_IMAGE_CONTENT_TYPE)?;
        }
        let record = RouteHistoryRecord::new(grade, storage_key, user);
        self.history.put_record(&record)?;
        info!(id = %record.id, grade = %record.grade, user = %record.user_identifier, "Recorded route");

        Ok(RouteReport {
            outcome,
            record: Some(record),
        })
    }
}
