use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::domain::{GeneId, ReleaseSpec, Strand};
use crate::error::HarvestError;
use crate::store::{Metadata, Store};

pub const DEFAULT_FTP_BASE: &str = "https://ftp.ensembl.org/pub";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedGene {
    pub gene_id: GeneId,
    pub gene_name: String,
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub biotype: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preparation {
    Cached,
    Built,
}

pub trait ReleaseIndex {
    fn spec(&self) -> &ReleaseSpec;
    fn download(&self) -> Result<Preparation, HarvestError>;
    fn index(&self) -> Result<Preparation, HarvestError>;
    fn genes(&self) -> Result<Vec<IndexedGene>, HarvestError>;

    fn gene_ids(&self) -> Result<Vec<GeneId>, HarvestError> {
        Ok(self.genes()?.into_iter().map(|gene| gene.gene_id).collect())
    }
}

pub struct EnsemblRelease {
    spec: ReleaseSpec,
    store: Store,
    client: Client,
    ftp_base: String,
}

impl EnsemblRelease {
    pub fn new(spec: ReleaseSpec, store: Store, ftp_base: &str) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gh/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::ReleaseHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| HarvestError::ReleaseHttp(err.to_string()))?;
        Ok(Self {
            spec,
            store,
            client,
            ftp_base: ftp_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn gtf_url(&self) -> String {
        format!("{}/{}", self.ftp_base, self.spec.gtf_remote_path())
    }
}

impl ReleaseIndex for EnsemblRelease {
    fn spec(&self) -> &ReleaseSpec {
        &self.spec
    }

    fn download(&self) -> Result<Preparation, HarvestError> {
        let gtf_path = self.store.release_gtf_path(&self.spec);
        if gtf_path.as_std_path().exists() {
            tracing::debug!(path = %gtf_path, "release annotation already cached");
            return Ok(Preparation::Cached);
        }

        let url = self.gtf_url();
        tracing::info!(%url, "downloading release annotation");
        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| HarvestError::ReleaseHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "release download failed".to_string());
            return Err(HarvestError::ReleaseStatus { status, message });
        }
        Store::write_atomic(&gtf_path, |file| {
            std::io::copy(&mut response, file).map(|_| ())
        })?;

        let metadata = Metadata {
            source: "ensembl".to_string(),
            release: self.spec.release,
            species: self.spec.species.clone(),
            assembly: self.spec.assembly.clone(),
            source_url: url,
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("kira-gh/{}", env!("CARGO_PKG_VERSION")),
        };
        Store::write_metadata(&self.store.release_metadata_path(&self.spec), &metadata)?;
        Ok(Preparation::Built)
    }

    fn index(&self) -> Result<Preparation, HarvestError> {
        let index_path = self.store.release_index_path(&self.spec);
        if index_path.as_std_path().exists() {
            return Ok(Preparation::Cached);
        }
        let gtf_path = self.store.release_gtf_path(&self.spec);
        let file = File::open(gtf_path.as_std_path()).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                HarvestError::IndexMissing(self.spec.to_string())
            } else {
                HarvestError::Filesystem(format!("open {gtf_path}: {err}"))
            }
        })?;
        let genes = parse_gtf_genes(MultiGzDecoder::new(file))?;
        tracing::info!(genes = genes.len(), release = %self.spec, "indexed release");
        write_gene_index(&index_path, &genes)?;
        Ok(Preparation::Built)
    }

    fn genes(&self) -> Result<Vec<IndexedGene>, HarvestError> {
        let index_path = self.store.release_index_path(&self.spec);
        if !index_path.as_std_path().exists() {
            return Err(HarvestError::IndexMissing(self.spec.to_string()));
        }
        let mut reader = csv::Reader::from_path(index_path.as_std_path())
            .map_err(|err| HarvestError::Csv(err.to_string()))?;
        reader
            .deserialize()
            .collect::<Result<Vec<IndexedGene>, _>>()
            .map_err(|err| HarvestError::Csv(format!("{index_path}: {err}")))
    }
}

fn write_gene_index(path: &camino::Utf8Path, genes: &[IndexedGene]) -> Result<(), HarvestError> {
    Store::write_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        for gene in genes {
            writer.serialize(gene)?;
        }
        writer.flush()
    })
}

/// Collects every `gene` feature in file order. A gene id seen twice keeps
/// its first occurrence.
pub fn parse_gtf_genes<R: Read>(reader: R) -> Result<Vec<IndexedGene>, HarvestError> {
    let mut genes = Vec::new();
    let mut seen = HashSet::new();
    for (offset, line) in BufReader::new(reader).lines().enumerate() {
        let line_no = offset + 1;
        let line = line.map_err(|err| HarvestError::GtfParse {
            line: line_no,
            message: err.to_string(),
        })?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(HarvestError::GtfParse {
                line: line_no,
                message: format!("expected 9 columns, found {}", fields.len()),
            });
        }
        if fields[2] != "gene" {
            continue;
        }

        let parse_err = |message: String| HarvestError::GtfParse {
            line: line_no,
            message,
        };
        let attributes = parse_attributes(fields[8]);
        let gene_id = attribute(&attributes, "gene_id")
            .ok_or_else(|| parse_err("gene feature without gene_id".to_string()))?
            .parse::<GeneId>()
            .map_err(|err| parse_err(err.to_string()))?;
        if !seen.insert(gene_id.clone()) {
            continue;
        }
        let start = fields[3]
            .parse()
            .map_err(|_| parse_err(format!("invalid start {:?}", fields[3])))?;
        let end = fields[4]
            .parse()
            .map_err(|_| parse_err(format!("invalid end {:?}", fields[4])))?;
        let strand = fields[6]
            .parse()
            .map_err(|err: HarvestError| parse_err(err.to_string()))?;

        genes.push(IndexedGene {
            gene_id,
            gene_name: attribute(&attributes, "gene_name").unwrap_or_default().to_string(),
            contig: fields[0].to_string(),
            start,
            end,
            strand,
            biotype: attribute(&attributes, "gene_biotype")
                .or_else(|| attribute(&attributes, "gene_type"))
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(genes)
}

fn parse_attributes(raw: &str) -> Vec<(&str, &str)> {
    raw.split(';')
        .filter_map(|item| item.trim().split_once(' '))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
        .collect()
}

fn attribute<'a>(attributes: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}
