use std::time::{Duration, Instant};

use serde::Serialize;

use crate::batch::{BatchPlan, BatchRunner, RunSummary};
use crate::combine::{CombineSummary, combine_batch_files};
use crate::domain::{GeneId, ReleaseSpec};
use crate::ensembl::EnsemblClient;
use crate::error::HarvestError;
use crate::fetcher::{GeneFetch, GeneFetcher};
use crate::release::{Preparation, ReleaseIndex};
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub plan: BatchPlan,
    pub combine: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResult {
    pub release: u32,
    pub species: String,
    pub assembly: String,
    pub download: Preparation,
    pub index: Preparation,
    pub genes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub release: ReleaseResult,
    pub run: RunSummary,
    pub combined: Option<CombineSummary>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: EnsemblClient, R: ReleaseIndex> {
    store: Store,
    fetcher: GeneFetcher<C>,
    release: R,
}

impl<C: EnsemblClient, R: ReleaseIndex> App<C, R> {
    pub fn new(store: Store, client: C, release: R) -> Self {
        Self {
            store,
            fetcher: GeneFetcher::new(client),
            release,
        }
    }

    pub fn prepare_release(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<(ReleaseResult, Vec<GeneId>), HarvestError> {
        let spec = self.release.spec().clone();
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {spec}"),
            elapsed: None,
        });

        let start = Instant::now();
        let download = self.release.download()?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Prepare; annotation {}",
                match download {
                    Preparation::Cached => "cached",
                    Preparation::Built => "downloaded",
                }
            ),
            elapsed: Some(start.elapsed()),
        });

        let start = Instant::now();
        let index = self.release.index()?;
        let gene_ids = self.release.gene_ids()?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Prepare; gene index {} ({} genes)",
                match index {
                    Preparation::Cached => "cached",
                    Preparation::Built => "built",
                },
                gene_ids.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok((release_result(spec, download, index, gene_ids.len()), gene_ids))
    }

    pub fn fetch(
        &self,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, HarvestError> {
        let (release, gene_ids) = self.prepare_release(sink)?;

        let runner = BatchRunner::new(&self.fetcher, &self.store);
        let run = runner.run(&gene_ids, options.plan, sink)?;

        let combined = if options.combine {
            Some(self.combine(sink)?)
        } else {
            None
        };

        Ok(FetchResult {
            release,
            run,
            combined,
        })
    }

    pub fn fetch_gene(&self, id: &GeneId) -> GeneFetch {
        self.fetcher.fetch(id)
    }

    pub fn combine(&self, sink: &dyn ProgressSink) -> Result<CombineSummary, HarvestError> {
        sink.event(ProgressEvent {
            message: format!("phase=Combine; scanning {}", self.store.output_dir()),
            elapsed: None,
        });
        let start = Instant::now();
        let summary = combine_batch_files(self.store.output_dir())?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; wrote {} rows from {} files to {}",
                summary.rows,
                summary.files.len(),
                summary.path
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(summary)
    }
}

fn release_result(
    spec: ReleaseSpec,
    download: Preparation,
    index: Preparation,
    genes: usize,
) -> ReleaseResult {
    ReleaseResult {
        release: spec.release,
        species: spec.species,
        assembly: spec.assembly,
        download,
        index,
        genes,
    }
}
