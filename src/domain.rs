use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HarvestError;

pub const DEFAULT_RELEASE: u32 = 108;
pub const DEFAULT_SPECIES: &str = "homo_sapiens";
pub const DEFAULT_ASSEMBLY: &str = "GRCh38";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeneId(String);

impl GeneId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeneId {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !is_stable_id(trimmed) {
            return Err(HarvestError::InvalidGeneId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for GeneId {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GeneId> for String {
    fn from(value: GeneId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranscriptId(String);

impl TranscriptId {
    /// Drops the version suffix: everything from the first `.` on.
    pub fn from_versioned(value: &str) -> Result<Self, HarvestError> {
        let bare = value.trim().split('.').next().unwrap_or_default();
        if !is_stable_id(bare) {
            return Err(HarvestError::InvalidTranscriptId(value.to_string()));
        }
        Ok(Self(bare.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_stable_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub release: u32,
    pub species: String,
    pub assembly: String,
}

impl ReleaseSpec {
    pub fn new(release: u32) -> Result<Self, HarvestError> {
        if release == 0 {
            return Err(HarvestError::InvalidRelease(release.to_string()));
        }
        Ok(Self {
            release,
            species: DEFAULT_SPECIES.to_string(),
            assembly: DEFAULT_ASSEMBLY.to_string(),
        })
    }

    pub fn with_species(mut self, species: &str, assembly: &str) -> Self {
        self.species = species.trim().to_lowercase();
        self.assembly = assembly.trim().to_string();
        self
    }

    pub fn gtf_file_name(&self) -> String {
        format!(
            "{}.{}.{}.gtf.gz",
            capitalize(&self.species),
            self.assembly,
            self.release
        )
    }

    pub fn gtf_remote_path(&self) -> String {
        format!(
            "release-{}/gtf/{}/{}",
            self.release,
            self.species,
            self.gtf_file_name()
        )
    }
}

impl fmt::Display for ReleaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} release {}", self.species, self.assembly, self.release)
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strand {
    Forward,
    Reverse,
    #[default]
    Unknown,
}

impl Strand {
    pub fn from_ensembl(value: i64) -> Self {
        match value {
            1 => Strand::Forward,
            -1 => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
            Strand::Unknown => "",
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strand {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "+" | "1" => Ok(Strand::Forward),
            "-" | "-1" => Ok(Strand::Reverse),
            "" | "." => Ok(Strand::Unknown),
            other => Err(HarvestError::InvalidStrand(other.to_string())),
        }
    }
}

impl Serialize for Strand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Strand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub gene_id: GeneId,
    pub gene_name: String,
    pub contig: String,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub strand: Strand,
    pub dna_sequence: String,
    pub transcript_sequence: String,
    pub protein_sequence: String,
}

impl GeneRecord {
    pub const COLUMNS: [&'static str; 9] = [
        "gene_id",
        "gene_name",
        "contig",
        "start",
        "end",
        "strand",
        "dna_sequence",
        "transcript_sequence",
        "protein_sequence",
    ];

    pub fn empty(gene_id: GeneId) -> Self {
        Self {
            gene_id,
            gene_name: String::new(),
            contig: String::new(),
            start: None,
            end: None,
            strand: Strand::Unknown,
            dna_sequence: String::new(),
            transcript_sequence: String::new(),
            protein_sequence: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_gene_id_trims() {
        let id: GeneId = " ENSG00000139618 ".parse().unwrap();
        assert_eq!(id.as_str(), "ENSG00000139618");
    }

    #[test]
    fn parse_gene_id_rejects_path_characters() {
        let err = "ENSG0/../x".parse::<GeneId>().unwrap_err();
        assert_matches!(err, HarvestError::InvalidGeneId(_));
        assert_matches!("".parse::<GeneId>(), Err(HarvestError::InvalidGeneId(_)));
    }

    #[test]
    fn strand_accepts_gtf_and_rest_encodings() {
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("-1".parse::<Strand>().unwrap(), Strand::Reverse);
        assert_eq!(".".parse::<Strand>().unwrap(), Strand::Unknown);
        assert_matches!("?".parse::<Strand>(), Err(HarvestError::InvalidStrand(s)) if s == "?");
    }

    #[test]
    fn transcript_version_is_cut_at_first_dot() {
        let id = TranscriptId::from_versioned("ENST00000380152.8").unwrap();
        assert_eq!(id.as_str(), "ENST00000380152");
        let id = TranscriptId::from_versioned("ENST1.2.3").unwrap();
        assert_eq!(id.as_str(), "ENST1");
        let id = TranscriptId::from_versioned("ENST00000380152").unwrap();
        assert_eq!(id.as_str(), "ENST00000380152");
    }

    #[test]
    fn transcript_without_stem_is_rejected() {
        let err = TranscriptId::from_versioned(".8").unwrap_err();
        assert_matches!(err, HarvestError::InvalidTranscriptId(_));
    }

    #[test]
    fn release_gtf_path() {
        let spec = ReleaseSpec::new(108).unwrap();
        assert_eq!(
            spec.gtf_remote_path(),
            "release-108/gtf/homo_sapiens/Homo_sapiens.GRCh38.108.gtf.gz"
        );
        let mouse = ReleaseSpec::new(102)
            .unwrap()
            .with_species("Mus_Musculus", "GRCm38");
        assert_eq!(mouse.gtf_file_name(), "Mus_musculus.GRCm38.102.gtf.gz");
    }

    #[test]
    fn release_zero_is_invalid() {
        assert_matches!(ReleaseSpec::new(0), Err(HarvestError::InvalidRelease(_)));
    }

    #[test]
    fn strand_mapping() {
        assert_eq!(Strand::from_ensembl(1), Strand::Forward);
        assert_eq!(Strand::from_ensembl(-1), Strand::Reverse);
        assert_eq!(Strand::from_ensembl(0), Strand::Unknown);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert_eq!("".parse::<Strand>().unwrap(), Strand::Unknown);
    }
}
