use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use warren_deleter::config::{
    DEFAULT_FAN_IN_CAPACITY, DEFAULT_MAX_BATCH_SIZE, DEFAULT_SHARDS, DEFAULT_SHARD_CAPACITY,
};
use warren_deleter::PipelineConfig;

pub const STORAGE_BACKEND_ENV: &str = "WARREN_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "WARREN_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "WARREN_DATABASE_DSN";
pub const BASE_URL_ENV: &str = "WARREN_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "WARREN_LOG_FORMAT";
pub const GENERATOR_ENV: &str = "WARREN_GENERATOR";
pub const GENERATOR_PREFIX_ENV: &str = "WARREN_GENERATOR_PREFIX";
pub const GENERATOR_OFFSET_ENV: &str = "WARREN_GENERATOR_OFFSET";
pub const DELETE_SHARDS_ENV: &str = "WARREN_DELETE_SHARDS";
pub const DELETE_SHARD_CAPACITY_ENV: &str = "WARREN_DELETE_SHARD_CAPACITY";
pub const DELETE_FAN_IN_CAPACITY_ENV: &str = "WARREN_DELETE_FAN_IN_CAPACITY";
pub const DELETE_BATCH_SIZE_ENV: &str = "WARREN_DELETE_BATCH_SIZE";
pub const DELETE_BATCH_TIMEOUT_MS_ENV: &str = "WARREN_DELETE_BATCH_TIMEOUT_MS";
pub const OWNER_ENV: &str = "WARREN_OWNER";

pub const DEFAULT_FILE_STORAGE_PATH: &str = "./warren-urls.jsonl";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_GENERATOR_PREFIX: &str = "wr";
pub const DEFAULT_DELETE_BATCH_TIMEOUT_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Memory => write!(f, "memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorArg {
    #[value(name = "random")]
    Random,
    #[value(name = "seq")]
    Seq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "pretty")]
    Pretty,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "warren", about = "Shorten, resolve and delete URLs")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Memory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_STORAGE_PATH_ENV, default_value = DEFAULT_FILE_STORAGE_PATH)]
    pub file_storage_path: PathBuf,

    #[arg(long, env = DATABASE_DSN_ENV, required_if_eq("storage", "postgres"))]
    pub database_dsn: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[arg(long, env = GENERATOR_ENV, value_enum, default_value_t = GeneratorArg::Random)]
    pub generator: GeneratorArg,

    /// Only used by the `seq` generator.
    #[arg(long, env = GENERATOR_PREFIX_ENV, default_value = DEFAULT_GENERATOR_PREFIX)]
    pub generator_prefix: String,

    /// First counter value of the `seq` generator. Required with a
    /// persistent backend, since the counter itself is not stored.
    #[arg(long, env = GENERATOR_OFFSET_ENV)]
    pub generator_offset: Option<u64>,

    #[arg(long, env = DELETE_SHARDS_ENV, default_value_t = DEFAULT_SHARDS)]
    pub delete_shards: usize,

    #[arg(long, env = DELETE_SHARD_CAPACITY_ENV, default_value_t = DEFAULT_SHARD_CAPACITY)]
    pub delete_shard_capacity: usize,

    #[arg(long, env = DELETE_FAN_IN_CAPACITY_ENV, default_value_t = DEFAULT_FAN_IN_CAPACITY)]
    pub delete_fan_in_capacity: usize,

    #[arg(long, env = DELETE_BATCH_SIZE_ENV, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub delete_batch_size: usize,

    #[arg(
        long,
        env = DELETE_BATCH_TIMEOUT_MS_ENV,
        default_value_t = DEFAULT_DELETE_BATCH_TIMEOUT_MS
    )]
    pub delete_batch_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl CLI {
    /// Rejects flag combinations clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.generator == GeneratorArg::Seq
            && self.storage != StorageBackendArg::Memory
            && self.generator_offset.is_none()
        {
            anyhow::bail!(
                "--generator seq with --storage {} needs --generator-offset past the ids already stored",
                self.storage
            );
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .shards(self.delete_shards)
            .shard_capacity(self.delete_shard_capacity)
            .fan_in_capacity(self.delete_fan_in_capacity)
            .max_batch_size(self.delete_batch_size)
            .batch_timeout(Duration::from_millis(self.delete_batch_timeout_ms))
            .build()
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one or more URLs.
    Shorten {
        #[arg(long, env = OWNER_ENV)]
        owner: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the URL behind a short id.
    Resolve { short_id: String },
    /// List every URL an owner has shortened.
    List {
        #[arg(long, env = OWNER_ENV)]
        owner: String,
    },
    /// Soft-delete short ids owned by `--owner`.
    Delete {
        #[arg(long, env = OWNER_ENV)]
        owner: String,
        #[arg(required = true)]
        short_ids: Vec<String>,
    },
    /// Check that the storage backend is reachable.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_requires_dsn() {
        let result = CLI::try_parse_from(["warren", "--storage", "postgres", "ping"]);
        assert!(result.is_err());

        let cli = CLI::try_parse_from([
            "warren",
            "--storage",
            "postgres",
            "--database-dsn",
            "postgres://localhost/warren",
            "ping",
        ])
        .unwrap();
        assert_eq!(cli.storage, StorageBackendArg::Postgres);
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let cli = CLI::try_parse_from(["warren", "resolve", "abc"]).unwrap();

        assert_eq!(cli.storage, StorageBackendArg::Memory);
        assert_eq!(cli.pipeline_config(), PipelineConfig::default());
        assert!(matches!(cli.command, Command::Resolve { ref short_id } if short_id == "abc"));
    }

    #[test]
    fn seq_with_persistent_storage_needs_an_offset() {
        let parse = |args: &[&str]| {
            let mut argv = vec!["warren"];
            argv.extend_from_slice(args);
            argv.push("ping");
            CLI::try_parse_from(argv).unwrap()
        };

        assert!(parse(&["--generator", "seq"]).validate().is_ok());
        assert!(parse(&["--storage", "file", "--generator", "seq"])
            .validate()
            .is_err());
        assert!(parse(&["--storage", "file"]).validate().is_ok());

        let cli = parse(&[
            "--storage",
            "file",
            "--generator",
            "seq",
            "--generator-offset",
            "1000",
        ]);
        assert!(cli.validate().is_ok());
        assert_eq!(cli.generator_offset, Some(1000));
    }

    #[test]
    fn shorten_takes_many_urls() {
        let cli = CLI::try_parse_from([
            "warren",
            "shorten",
            "--owner",
            "alice",
            "https://a.com",
            "https://b.com",
        ])
        .unwrap();

        match cli.command {
            Command::Shorten { owner, urls } => {
                assert_eq!(owner, "alice");
                assert_eq!(urls.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
