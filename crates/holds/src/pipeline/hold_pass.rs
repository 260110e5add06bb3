//! Hold grading pass: every exported crop is measured, classified and
//! graded on its own, from the crop and its metadata only.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    algorithms::HoldAnalyzer,
    error::{HoldError, Result},
    io::{decode::decode_image, export::{ExportBundle, GradedBundle}},
    types::{GradedHold, HoldMetadata},
};

/// Worker count used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Grade one encoded crop. `None` when the crop cannot be decoded or shows
/// no hold; the rest of the batch is unaffected.
pub fn grade_crop(
    analyzer: &HoldAnalyzer,
    id: &str,
    metadata: &HoldMetadata,
    bytes: &[u8],
) -> Option<GradedHold> {
    let crop = match decode_image(bytes) {
        Ok(crop) => crop,
        Err(e) => {
            warn!(id, error = %e, "Skipping undecodable crop");
            return None;
        }
    };
    let Some(assessment) = analyzer.analyze(&crop) else {
        debug!(id, "Skipping crop without contour");
        return None;
    };
    Some(GradedHold {
        metadata: metadata.clone(),
        hold_type: assessment.classification.hold_type,
        hold_grade: assessment.classification.grade,
        features: Some(assessment.features),
    })
}

fn crop_bytes(bundle: &ExportBundle, id: &str) -> Option<Vec<u8>> {
    match bundle.image_bytes(id) {
        None => {
            debug!(id, "Skipping hold without image");
            None
        }
        Some(Err(e)) => {
            warn!(id, error = %e, "Skipping hold with malformed image data");
            None
        }
        Some(Ok(bytes)) => Some(bytes),
    }
}

/// Grade every crop of the bundle on the calling thread.
pub fn grade_bundle(analyzer: &HoldAnalyzer, bundle: &ExportBundle) -> GradedBundle {
    let graded: GradedBundle = bundle
        .metadata
        .iter()
        .filter_map(|(id, metadata)| {
            let bytes = crop_bytes(bundle, id)?;
            grade_crop(analyzer, id, metadata, &bytes).map(|hold| (id.clone(), hold))
        })
        .collect();
    info!(received = bundle.len(), graded = graded.len(), "Graded holds");
    graded
}

/// Grade crops on blocking worker threads, at most `workers` at a time.
pub async fn grade_bundle_concurrent(
    analyzer: Arc<HoldAnalyzer>,
    bundle: &ExportBundle,
    workers: usize,
) -> Result<GradedBundle> {
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = Vec::with_capacity(bundle.len());

    for (id, metadata) in &bundle.metadata {
        let Some(bytes) = crop_bytes(bundle, id) else {
            continue;
        };
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| HoldError::Worker(e.to_string()))?;
        let analyzer = analyzer.clone();
        let id = id.clone();
        let metadata = metadata.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let graded = grade_crop(&analyzer, &id, &metadata, &bytes);
            drop(permit);
            graded.map(|hold| (id, hold))
        }));
    }

    let mut graded = GradedBundle::default();
    for task in tasks {
        let result = task.await.map_err(|e| HoldError::Worker(e.to_string()))?;
        if let Some((id, hold)) = result {
            graded.0.insert(id, hold);
        }
    }
    info!(received = bundle.len(), graded = graded.len(), workers, "Graded holds");
    Ok(graded)
}
