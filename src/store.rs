use std::fs;
use std::io::Write;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::domain::ReleaseSpec;
use crate::error::HarvestError;

pub const DEFAULT_OUTPUT_DIR: &str = "sequence";
pub const COMBINED_FILE_NAME: &str = "combined_sequences.csv";

const BATCH_FILE_SUFFIX: &str = "_gene_transcript_protein_sequences.csv";

static BATCH_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Chunk(\d+)_gene_transcript_protein_sequences\.csv$")
        .expect("batch file pattern is valid")
});

#[derive(Debug, Clone)]
pub struct Store {
    output_dir: Utf8PathBuf,
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new(output_dir: Utf8PathBuf) -> Result<Self, HarvestError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir().join(".cache").join("kira-gene-harvester"),
                )
                .ok()
            })
            .ok_or_else(|| {
                HarvestError::Filesystem("unable to resolve cache directory".to_string())
            })?;

        Ok(Self {
            output_dir,
            cache_root,
        })
    }

    pub fn new_with_paths(output_dir: Utf8PathBuf, cache_root: Utf8PathBuf) -> Self {
        Self {
            output_dir,
            cache_root,
        }
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    pub fn batch_path(&self, index: usize) -> Utf8PathBuf {
        self.output_dir
            .join(format!("Chunk{index}{BATCH_FILE_SUFFIX}"))
    }

    pub fn combined_path(&self) -> Utf8PathBuf {
        self.output_dir.join(COMBINED_FILE_NAME)
    }

    pub fn release_dir(&self, spec: &ReleaseSpec) -> Utf8PathBuf {
        self.cache_root
            .join("ensembl")
            .join(format!("release-{}", spec.release))
            .join(&spec.species)
    }

    pub fn release_gtf_path(&self, spec: &ReleaseSpec) -> Utf8PathBuf {
        self.release_dir(spec).join(spec.gtf_file_name())
    }

    pub fn release_index_path(&self, spec: &ReleaseSpec) -> Utf8PathBuf {
        self.release_dir(spec).join("genes.csv")
    }

    pub fn release_metadata_path(&self, spec: &ReleaseSpec) -> Utf8PathBuf {
        self.release_dir(spec).join("metadata.json")
    }

    pub fn ensure_output_dir(&self) -> Result<(), HarvestError> {
        fs::create_dir_all(self.output_dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))
    }

    pub fn list_batch_files(dir: &Utf8Path) -> Result<Vec<(usize, Utf8PathBuf)>, HarvestError> {
        let entries = match fs::read_dir(dir.as_std_path()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(HarvestError::Filesystem(format!("read {dir}: {err}"))),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| HarvestError::Filesystem(err.to_string()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(index) = batch_index_of(&name) else {
                continue;
            };
            if entry.path().is_file() {
                files.push((index, dir.join(name)));
            }
        }
        files.sort_by_key(|(index, _)| *index);
        Ok(files)
    }

    pub fn write_metadata(path: &Utf8Path, metadata: &Metadata) -> Result<(), HarvestError> {
        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Self::write_atomic(path, |file| file.write_all(&content))
    }

    pub fn read_metadata(path: &Utf8Path) -> Result<Option<Metadata>, HarvestError> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| HarvestError::Filesystem(format!("parse {path}: {err}")))
    }

    pub fn write_atomic<F>(path: &Utf8Path, write: F) -> Result<(), HarvestError>
    where
        F: FnOnce(&mut fs::File) -> std::io::Result<()>,
    {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".kira-gh")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        write(temp.as_file_mut())
            .and_then(|_| temp.as_file_mut().sync_all())
            .map_err(|err| HarvestError::Filesystem(format!("write {path}: {err}")))?;
        temp.persist(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("persist {path}: {}", err.error)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub release: u32,
    pub species: String,
    pub assembly: String,
    pub source_url: String,
    pub downloaded_at: String,
    pub tool: String,
}

pub fn batch_index_of(file_name: &str) -> Option<usize> {
    BATCH_FILE_RE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}
