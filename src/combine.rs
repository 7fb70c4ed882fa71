use camino::{Utf8Path, Utf8PathBuf};
use csv::StringRecord;
use serde::Serialize;

use crate::error::HarvestError;
use crate::store::{COMBINED_FILE_NAME, Store};

#[derive(Debug, Clone, Serialize)]
pub struct CombineSummary {
    pub path: String,
    pub files: Vec<String>,
    pub rows: usize,
}

struct BatchTable {
    path: Utf8PathBuf,
    header: StringRecord,
    rows: Vec<StringRecord>,
}

pub fn combine_batch_files(dir: &Utf8Path) -> Result<CombineSummary, HarvestError> {
    let files = Store::list_batch_files(dir)?;
    if files.is_empty() {
        return Err(HarvestError::NoBatchFiles(dir.to_string()));
    }

    let mut tables: Vec<BatchTable> = Vec::with_capacity(files.len());
    for (_, path) in files {
        let table = read_batch_table(path)?;
        if let Some(first) = tables.first() {
            if first.header != table.header {
                return Err(HarvestError::ColumnMismatch {
                    path: table.path.to_string(),
                    expected_from: first.path.to_string(),
                });
            }
        }
        tables.push(table);
    }

    let output = dir.join(COMBINED_FILE_NAME);
    let header = tables[0].header.clone();
    let rows: usize = tables.iter().map(|table| table.rows.len()).sum();
    Store::write_atomic(&output, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(&header)?;
        for table in &tables {
            for row in &table.rows {
                writer.write_record(row)?;
            }
        }
        writer.flush()
    })?;
    tracing::info!(files = tables.len(), rows, path = %output, "combined batch files");

    Ok(CombineSummary {
        path: output.to_string(),
        files: tables.into_iter().map(|table| table.path.to_string()).collect(),
        rows,
    })
}

fn read_batch_table(path: Utf8PathBuf) -> Result<BatchTable, HarvestError> {
    let read_err = |message: String| HarvestError::BatchFileRead {
        path: path.to_string(),
        message,
    };
    let mut reader =
        csv::Reader::from_path(path.as_std_path()).map_err(|err| read_err(err.to_string()))?;
    let header = reader
        .headers()
        .map_err(|err| read_err(err.to_string()))?
        .clone();
    if header.is_empty() {
        return Err(read_err("missing header row".to_string()));
    }
    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| read_err(err.to_string()))?;
    Ok(BatchTable { path, header, rows })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_directory_is_reported_as_no_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("absent")).unwrap();
        let err = combine_batch_files(&dir).unwrap_err();
        assert_matches!(err, HarvestError::NoBatchFiles(_));
    }

    #[test]
    fn empty_file_is_malformed() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::write(
            dir.join("Chunk0_gene_transcript_protein_sequences.csv").as_std_path(),
            "",
        )
        .unwrap();

        let err = combine_batch_files(&dir).unwrap_err();
        assert_matches!(err, HarvestError::BatchFileRead { .. });
        assert!(!dir.join(COMBINED_FILE_NAME).as_std_path().exists());
    }
}
