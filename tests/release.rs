use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use httpmock::prelude::*;

use kira_gene_harvester::domain::{ReleaseSpec, Strand};
use kira_gene_harvester::error::HarvestError;
use kira_gene_harvester::release::{EnsemblRelease, Preparation, ReleaseIndex};
use kira_gene_harvester::store::Store;

const GTF: &str = "#!genome-build GRCh38.p13\n\
#!genome-version GRCh38\n\
1\thavana\tgene\t11869\t14409\t.\t+\t.\tgene_id \"ENSG00000223972\"; gene_version \"5\"; gene_name \"DDX11L1\"; gene_biotype \"transcribed_unprocessed_pseudogene\";\n\
1\thavana\ttranscript\t11869\t14409\t.\t+\t.\tgene_id \"ENSG00000223972\"; transcript_id \"ENST00000456328\";\n\
1\thavana\texon\t11869\t12227\t.\t+\t.\tgene_id \"ENSG00000223972\"; transcript_id \"ENST00000456328\"; exon_number \"1\";\n\
13\tensembl_havana\tgene\t32315508\t32400268\t.\t+\t.\tgene_id \"ENSG00000139618\"; gene_name \"BRCA2\"; gene_biotype \"protein_coding\";\n\
17\tensembl_havana\tgene\t43044295\t43170245\t.\t-\t.\tgene_id \"ENSG00000012048\"; gene_name \"BRCA1\"; gene_biotype \"protein_coding\";\n";

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn temp_store(temp: &tempfile::TempDir) -> Store {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    Store::new_with_paths(root.join("sequence"), root.join("cache"))
}

#[test]
fn download_index_and_enumerate() {
    let server = MockServer::start();
    let gtf = server.mock(|when, then| {
        when.method(GET)
            .path("/release-108/gtf/homo_sapiens/Homo_sapiens.GRCh38.108.gtf.gz");
        then.status(200).body(gzip(GTF));
    });
    let temp = tempfile::tempdir().unwrap();
    let store = temp_store(&temp);
    let spec = ReleaseSpec::new(108).unwrap();
    let release = EnsemblRelease::new(spec.clone(), store.clone(), &server.base_url()).unwrap();

    assert_eq!(release.download().unwrap(), Preparation::Built);
    assert_eq!(release.download().unwrap(), Preparation::Cached);
    gtf.assert_hits(1);

    assert_eq!(release.index().unwrap(), Preparation::Built);
    assert_eq!(release.index().unwrap(), Preparation::Cached);

    let genes = release.genes().unwrap();
    let ids: Vec<&str> = genes.iter().map(|g| g.gene_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["ENSG00000223972", "ENSG00000139618", "ENSG00000012048"]
    );
    assert_eq!(genes[2].gene_name, "BRCA1");
    assert_eq!(genes[2].strand, Strand::Reverse);
    assert_eq!(genes[1].biotype, "protein_coding");
    assert_eq!(release.gene_ids().unwrap().len(), 3);

    let metadata = Store::read_metadata(&store.release_metadata_path(&spec))
        .unwrap()
        .unwrap();
    assert_eq!(metadata.release, 108);
    assert!(metadata.source_url.ends_with("Homo_sapiens.GRCh38.108.gtf.gz"));
}

#[test]
fn failed_download_leaves_no_cached_file() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(404).body("not found");
    });
    let temp = tempfile::tempdir().unwrap();
    let store = temp_store(&temp);
    let spec = ReleaseSpec::new(999).unwrap();
    let release = EnsemblRelease::new(spec.clone(), store.clone(), &server.base_url()).unwrap();

    let err = release.download().unwrap_err();
    assert_matches!(err, HarvestError::ReleaseStatus { status: 404, .. });
    assert!(!store.release_gtf_path(&spec).as_std_path().exists());
}

#[test]
fn genes_before_index_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let store = temp_store(&temp);
    let release = EnsemblRelease::new(
        ReleaseSpec::new(108).unwrap(),
        store,
        "http://127.0.0.1:1",
    )
    .unwrap();

    assert_matches!(release.genes(), Err(HarvestError::IndexMissing(_)));
    assert_matches!(release.index(), Err(HarvestError::IndexMissing(_)));
}
