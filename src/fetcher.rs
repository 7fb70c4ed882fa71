use std::fmt;

use serde::Serialize;

use crate::domain::{GeneId, GeneRecord, Strand, TranscriptId};
use crate::ensembl::{EnsemblClient, GeneLookup};
use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Metadata,
    DnaSequence,
    TranscriptSequence,
    ProteinSequence,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Metadata => "gene metadata",
            Field::DnaSequence => "DNA sequence",
            Field::TranscriptSequence => "transcript sequence",
            Field::ProteinSequence => "protein sequence",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldFailure {
    pub field: Field,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneFetch {
    pub record: GeneRecord,
    pub failures: Vec<FieldFailure>,
}

impl GeneFetch {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct GeneFetcher<C: EnsemblClient> {
    client: C,
}

impl<C: EnsemblClient> GeneFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Never fails: every remote call is isolated and degrades to an empty field.
    pub fn fetch(&self, id: &GeneId) -> GeneFetch {
        let mut failures = Vec::new();

        let lookup = recover(
            id,
            Field::Metadata,
            self.client.lookup_gene(id),
            &mut failures,
        );
        let dna_sequence = recover(
            id,
            Field::DnaSequence,
            self.client.genomic_sequence(id),
            &mut failures,
        );

        let mut transcript_sequence = String::new();
        let mut protein_sequence = String::new();
        if let Some(canonical) = canonical_transcript(&lookup) {
            transcript_sequence = recover(
                id,
                Field::TranscriptSequence,
                TranscriptId::from_versioned(canonical)
                    .and_then(|transcript| self.client.transcript_sequence(&transcript)),
                &mut failures,
            );
            if let Some(protein_id) = lookup.first_translation_id() {
                protein_sequence = recover(
                    id,
                    Field::ProteinSequence,
                    self.client.protein_sequence(protein_id),
                    &mut failures,
                );
            }
        }

        GeneFetch {
            record: build_record(id, lookup, dna_sequence, transcript_sequence, protein_sequence),
            failures,
        }
    }
}

fn canonical_transcript(lookup: &GeneLookup) -> Option<&str> {
    lookup
        .canonical_transcript
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}

fn recover<T: Default>(
    id: &GeneId,
    field: Field,
    outcome: Result<T, HarvestError>,
    failures: &mut Vec<FieldFailure>,
) -> T {
    match outcome {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(gene = %id, "error fetching {field}: {err}");
            failures.push(FieldFailure {
                field,
                reason: err.to_string(),
            });
            T::default()
        }
    }
}

fn build_record(
    id: &GeneId,
    lookup: GeneLookup,
    dna_sequence: String,
    transcript_sequence: String,
    protein_sequence: String,
) -> GeneRecord {
    GeneRecord {
        gene_id: id.clone(),
        gene_name: lookup.display_name.unwrap_or_default(),
        contig: lookup.seq_region_name.unwrap_or_default(),
        start: lookup.start,
        end: lookup.end,
        strand: lookup
            .strand
            .map(Strand::from_ensembl)
            .unwrap_or_default(),
        dna_sequence,
        transcript_sequence,
        protein_sequence,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct ScriptedClient {
        lookup: Option<GeneLookup>,
        fail_dna: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl EnsemblClient for ScriptedClient {
        fn lookup_gene(&self, id: &GeneId) -> Result<GeneLookup, HarvestError> {
            self.record(format!("lookup:{id}"));
            self.lookup
                .clone()
                .ok_or_else(|| HarvestError::EnsemblStatus {
                    status: 400,
                    message: "not found".to_string(),
                })
        }

        fn genomic_sequence(&self, id: &GeneId) -> Result<String, HarvestError> {
            self.record(format!("dna:{id}"));
            if self.fail_dna {
                return Err(HarvestError::EnsemblHttp("connection reset".to_string()));
            }
            Ok("ACGT".to_string())
        }

        fn transcript_sequence(&self, id: &TranscriptId) -> Result<String, HarvestError> {
            self.record(format!("transcript:{id}"));
            Ok("AUG".to_string())
        }

        fn protein_sequence(&self, protein_id: &str) -> Result<String, HarvestError> {
            self.record(format!("protein:{protein_id}"));
            Ok("M".to_string())
        }
    }

    fn gene() -> GeneId {
        "ENSG00000139618".parse().unwrap()
    }

    #[test]
    fn metadata_failure_skips_dependent_calls() {
        let fetcher = GeneFetcher::new(ScriptedClient::default());
        let fetched = fetcher.fetch(&gene());

        assert_eq!(fetched.record.dna_sequence, "ACGT");
        assert!(fetched.record.transcript_sequence.is_empty());
        assert!(fetched.record.protein_sequence.is_empty());
        assert_eq!(fetched.failures.len(), 1);
        assert_eq!(fetched.failures[0].field, Field::Metadata);
        let calls = fetcher.client().calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["lookup:ENSG00000139618", "dna:ENSG00000139618"]);
    }

    #[test]
    fn dna_failure_does_not_stop_other_fields() {
        let lookup: GeneLookup = serde_json::from_str(
            r#"{"display_name": "BRCA2", "canonical_transcript": "ENST00000380152.8",
                "Transcript": [{"id": "ENST00000380152", "Translation": {"id": "ENSP00000369497"}}]}"#,
        )
        .unwrap();
        let client = ScriptedClient {
            lookup: Some(lookup),
            fail_dna: true,
            ..Default::default()
        };
        let fetched = GeneFetcher::new(client).fetch(&gene());

        assert_eq!(fetched.record.gene_name, "BRCA2");
        assert!(fetched.record.dna_sequence.is_empty());
        assert_eq!(fetched.record.transcript_sequence, "AUG");
        assert_eq!(fetched.record.protein_sequence, "M");
        assert!(fetched.is_degraded());
    }

    #[test]
    fn canonical_without_bare_id_fails_only_the_transcript() {
        let lookup: GeneLookup = serde_json::from_str(
            r#"{"display_name": "BRCA2", "canonical_transcript": ".8",
                "Transcript": [{"id": "ENST00000380152", "Translation": {"id": "ENSP00000369497"}}]}"#,
        )
        .unwrap();
        let client = ScriptedClient {
            lookup: Some(lookup),
            ..Default::default()
        };
        let fetcher = GeneFetcher::new(client);
        let fetched = fetcher.fetch(&gene());

        assert!(fetched.record.transcript_sequence.is_empty());
        assert_eq!(fetched.record.protein_sequence, "M");
        assert_eq!(fetched.failures.len(), 1);
        assert_eq!(fetched.failures[0].field, Field::TranscriptSequence);
        let calls = fetcher.client().calls.lock().unwrap().clone();
        assert!(!calls.iter().any(|call| call.starts_with("transcript:")));
        assert!(calls.contains(&"protein:ENSP00000369497".to_string()));
    }

    #[test]
    fn blank_canonical_transcript_counts_as_absent() {
        let lookup = GeneLookup {
            canonical_transcript: Some("  ".to_string()),
            ..Default::default()
        };
        let client = ScriptedClient {
            lookup: Some(lookup),
            ..Default::default()
        };
        let fetcher = GeneFetcher::new(client);
        let fetched = fetcher.fetch(&gene());

        assert!(fetched.record.transcript_sequence.is_empty());
        assert!(!fetched.is_degraded());
        assert_eq!(fetcher.client().calls.lock().unwrap().len(), 2);
    }
}
