use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::batch::BatchPlan;
use crate::chunk::DEFAULT_BATCH_SIZE;
use crate::domain::{DEFAULT_ASSEMBLY, DEFAULT_RELEASE, DEFAULT_SPECIES, ReleaseSpec};
use crate::ensembl::DEFAULT_SERVER;
use crate::error::HarvestError;
use crate::release::DEFAULT_FTP_BASE;
use crate::store::DEFAULT_OUTPUT_DIR;

pub const CONFIG_FILE_NAME: &str = "kira-gh.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub release: Option<u32>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub assembly: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub start_batch: Option<usize>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub ftp_base: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            release: overrides.release.or(self.release),
            species: overrides.species.or(self.species),
            assembly: overrides.assembly.or(self.assembly),
            batch_size: overrides.batch_size.or(self.batch_size),
            start_batch: overrides.start_batch.or(self.start_batch),
            output_dir: overrides.output_dir.or(self.output_dir),
            server: overrides.server.or(self.server),
            ftp_base: overrides.ftp_base.or(self.ftp_base),
            request_timeout_secs: overrides.request_timeout_secs.or(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub release: ReleaseSpec,
    pub plan: BatchPlan,
    pub output_dir: Utf8PathBuf,
    pub server: String,
    pub ftp_base: String,
    pub request_timeout: Option<Duration>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&str>) -> Result<Config, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| HarvestError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>, overrides: Config) -> Result<ResolvedConfig, HarvestError> {
        let config = Self::load(path)?.merge(overrides);
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let release = ReleaseSpec::new(config.release.unwrap_or(DEFAULT_RELEASE))?.with_species(
            config.species.as_deref().unwrap_or(DEFAULT_SPECIES),
            config.assembly.as_deref().unwrap_or(DEFAULT_ASSEMBLY),
        );

        let batch_size = match config.batch_size {
            Some(size) => NonZeroUsize::new(size).ok_or(HarvestError::InvalidBatchSize)?,
            None => DEFAULT_BATCH_SIZE,
        };

        Ok(ResolvedConfig {
            release,
            plan: BatchPlan {
                batch_size,
                start_batch: config.start_batch.unwrap_or(0),
            },
            output_dir: Utf8PathBuf::from(
                config.output_dir.unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            server: config.server.unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            ftp_base: config.ftp_base.unwrap_or_else(|| DEFAULT_FTP_BASE.to_string()),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.release.release, 108);
        assert_eq!(resolved.release.species, "homo_sapiens");
        assert_eq!(resolved.plan.batch_size.get(), 1000);
        assert_eq!(resolved.plan.start_batch, 0);
        assert_eq!(resolved.output_dir, "sequence");
        assert_eq!(resolved.server, "https://rest.ensembl.org");
        assert!(resolved.request_timeout.is_none());
    }

    #[test]
    fn command_line_overrides_file() {
        let file = Config {
            release: Some(110),
            batch_size: Some(500),
            start_batch: Some(3),
            ..Config::default()
        };
        let cli = Config {
            start_batch: Some(38),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(file.merge(cli)).unwrap();
        assert_eq!(resolved.release.release, 110);
        assert_eq!(resolved.plan.batch_size.get(), 500);
        assert_eq!(resolved.plan.start_batch, 38);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = Config {
            batch_size: Some(0),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(HarvestError::InvalidBatchSize)
        );
    }
}
