use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{
    config::SimilarityConfig,
    error::{AppError, AppResult},
    model::{SimilarityRecord, UploadedDocument},
    service::staging::{StagedBatch, StagingArea},
    util::{
        digest::DigestSet,
        extract::{DocumentFormat, TextExtractor},
    },
};

/// Runs one upload batch through staging, extraction, shingling and pairwise
/// scoring. Holds no per-request state, so one instance serves all requests.
pub struct PlagiarismChecker {
    staging: StagingArea,
    extractor: Arc<dyn TextExtractor>,
    window_sizes: Arc<[usize]>,
    concurrency: usize,
}

impl PlagiarismChecker {
    pub fn new(
        staging: StagingArea,
        extractor: Arc<dyn TextExtractor>,
        config: &SimilarityConfig,
    ) -> Self {
        Self {
            staging,
            extractor,
            window_sizes: Arc::from(config.window_sizes.as_slice()),
            concurrency: config.extraction_concurrency.max(1),
        }
    }

    pub fn storage_root(&self) -> &Path {
        self.staging.root()
    }

    pub async fn check(&self, documents: Vec<UploadedDocument>) -> AppResult<Vec<SimilarityRecord>> {
        if documents.len() < 2 {
            return Err(AppError::InsufficientInput(documents.len()));
        }
        ensure_unique_names(&documents)?;

        let mut batch = self.staging.begin().await?;
        info!(
            batch = %batch.id(),
            dir = %batch.dir().display(),
            documents = documents.len(),
            "checking batch"
        );

        let outcome = self.run(&mut batch, &documents).await;
        batch.cleanup().await;
        outcome
    }

    async fn run(
        &self,
        batch: &mut StagedBatch,
        documents: &[UploadedDocument],
    ) -> AppResult<Vec<SimilarityRecord>> {
        let mut paths = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            paths.push(batch.stage(index, &document.name, &document.bytes).await?);
        }

        let digests = self.fingerprint_all(documents, paths).await?;
        let named: Vec<(&str, DigestSet)> = documents
            .iter()
            .map(|document| document.name.as_str())
            .zip(digests)
            .collect();

        let records = pairwise_similarities(&named);
        info!(batch = %batch.id(), pairs = records.len(), "batch scored");
        Ok(records)
    }

    /// Extracts and hashes every staged document, at most `concurrency` at a
    /// time. Returns only once all started documents are done, in input order.
    ///
    /// After a failure nothing new is started. Extractions already running
    /// cannot be interrupted, so they finish and are drained; the error
    /// reported is the one with the lowest input index.
    async fn fingerprint_all(
        &self,
        documents: &[UploadedDocument],
        paths: Vec<PathBuf>,
    ) -> AppResult<Vec<DigestSet>> {
        let mut slots: Vec<Option<DigestSet>> = documents.iter().map(|_| None).collect();
        let mut failure: Option<(usize, AppError)> = None;
        let mut pending = documents.iter().zip(paths).enumerate();
        let mut tasks = JoinSet::new();

        loop {
            while failure.is_none() && tasks.len() < self.concurrency {
                let Some((index, (document, path))) = pending.next() else {
                    break;
                };
                let name = document.name.clone();
                let extractor = Arc::clone(&self.extractor);
                let window_sizes = Arc::clone(&self.window_sizes);

                tasks.spawn_blocking(move || {
                    let result =
                        fingerprint_document(extractor.as_ref(), &name, &path, &window_sizes);
                    (index, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((index, Ok(digests))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(digests);
                    }
                }
                Ok((index, Err(err))) => keep_lowest(&mut failure, index, err),
                Err(err) => keep_lowest(
                    &mut failure,
                    usize::MAX,
                    AppError::Internal(anyhow!("fingerprint task failed: {err}")),
                ),
            }
        }

        if let Some((_, err)) = failure {
            return Err(err);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| AppError::Internal(anyhow!("document fingerprint missing")))
            })
            .collect()
    }
}

fn ensure_unique_names(documents: &[UploadedDocument]) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(documents.len());
    for document in documents {
        if !seen.insert(document.name.as_str()) {
            return Err(AppError::DuplicateName(document.name.clone()));
        }
    }
    Ok(())
}

fn keep_lowest(failure: &mut Option<(usize, AppError)>, index: usize, err: AppError) {
    match failure {
        Some((current, _)) if *current <= index => {
            debug!(index, error = %err, "further document failure ignored");
        }
        _ => *failure = Some((index, err)),
    }
}

fn fingerprint_document(
    extractor: &dyn TextExtractor,
    name: &str,
    path: &Path,
    window_sizes: &[usize],
) -> AppResult<DigestSet> {
    let format = DocumentFormat::from_file_name(name).ok_or_else(|| AppError::UnsupportedFormat {
        name: name.to_string(),
    })?;

    // pdf parsing can panic on malformed input
    let text = match panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(path, format))) {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            return Err(AppError::Extraction {
                name: name.to_string(),
                reason: format!("{err:#}"),
            })
        }
        Err(_) => {
            return Err(AppError::Extraction {
                name: name.to_string(),
                reason: "extractor panicked".to_string(),
            })
        }
    };

    let digests = DigestSet::from_text(&text, window_sizes);
    if digests.is_empty() {
        debug!(file = name, "document shorter than every shingle window");
    }
    debug!(
        file = name,
        %format,
        chars = text.len(),
        digests = digests.len(),
        "document fingerprinted"
    );
    Ok(digests)
}

/// Scores every unordered pair once, outer index ascending then inner index
/// ascending. No self pairs; no sorting by score.
pub fn pairwise_similarities(documents: &[(&str, DigestSet)]) -> Vec<SimilarityRecord> {
    let n = documents.len();
    let mut records = Vec::with_capacity(n * n.saturating_sub(1) / 2);

    for (i, (left_name, left)) in documents.iter().enumerate() {
        for (right_name, right) in documents.iter().skip(i + 1) {
            records.push(SimilarityRecord {
                file1: (*left_name).to_string(),
                file2: (*right_name).to_string(),
                similarity: left.similarity(right) * 100.0,
            });
        }
    }

    records
}
