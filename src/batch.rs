use std::num::NonZeroUsize;
use std::time::Instant;

use camino::Utf8Path;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::chunk::{self, DEFAULT_BATCH_SIZE};
use crate::domain::{GeneId, GeneRecord};
use crate::ensembl::EnsemblClient;
use crate::error::HarvestError;
use crate::fetcher::GeneFetcher;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: NonZeroUsize,
    pub start_batch: usize,
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            start_batch: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub path: String,
    pub rows: usize,
    pub degraded_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_genes: usize,
    pub total_batches: usize,
    pub start_batch: usize,
    pub genes_fetched: usize,
    pub batches: Vec<BatchSummary>,
}

pub struct BatchRunner<'a, C: EnsemblClient> {
    fetcher: &'a GeneFetcher<C>,
    store: &'a Store,
}

impl<'a, C: EnsemblClient> BatchRunner<'a, C> {
    pub fn new(fetcher: &'a GeneFetcher<C>, store: &'a Store) -> Self {
        Self { fetcher, store }
    }

    pub fn run(
        &self,
        genes: &[GeneId],
        plan: BatchPlan,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, HarvestError> {
        let total_batches = chunk::batch_count(genes.len(), plan.batch_size);
        let mut summary = RunSummary {
            total_genes: genes.len(),
            total_batches,
            start_batch: plan.start_batch,
            genes_fetched: 0,
            batches: Vec::new(),
        };
        if plan.start_batch >= total_batches {
            tracing::warn!(
                start_batch = plan.start_batch,
                total_batches,
                "start batch is past the last batch, nothing to fetch"
            );
            return Ok(summary);
        }

        self.store.ensure_output_dir()?;
        for batch in chunk::batches(genes, plan.batch_size).skip(plan.start_batch) {
            let mut gene_count = batch.offset(plan.batch_size);
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Batch; batch {}/{}: fetching {} genes",
                    batch.index + 1,
                    total_batches,
                    batch.items.len()
                ),
                elapsed: None,
            });
            let started = Instant::now();
            let mut records = Vec::with_capacity(batch.items.len());
            let mut degraded_rows = 0;
            for gene_id in batch.items {
                gene_count += 1;
                tracing::info!(gene = %gene_id, gene_count, total = genes.len(), "fetching");
                let fetched = self.fetcher.fetch(gene_id);
                if fetched.is_degraded() {
                    degraded_rows += 1;
                }
                records.push(fetched.record);
            }

            let path = self.store.batch_path(batch.index);
            write_batch_file(&path, &records)?;
            summary.genes_fetched += records.len();
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Store; wrote {} rows to {path} ({degraded_rows} degraded)",
                    records.len()
                ),
                elapsed: Some(started.elapsed()),
            });
            summary.batches.push(BatchSummary {
                index: batch.index,
                path: path.to_string(),
                rows: records.len(),
                degraded_rows,
            });
        }
        Ok(summary)
    }
}

pub fn write_batch_file(path: &Utf8Path, records: &[GeneRecord]) -> Result<(), HarvestError> {
    Store::write_atomic(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(GeneRecord::COLUMNS)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()
    })
}
