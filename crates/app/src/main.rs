use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use services::{CoachConfig, OpenAiCompatibleClient, StudyContext};
use storage::content::discover;
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

mod session;

const DEFAULT_CONTENT_DIR: &str = "learning-materials";
const DEFAULT_DB_URL: &str = "sqlite://.coach-data/progress.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    ConflictingStores,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::ConflictingStores => write!(f, "--db and --data-dir cannot be combined"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ArgsError::MissingValue { flag })
}

/// Where progress records live.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreTarget {
    Sqlite(String),
    Files(PathBuf),
}

#[derive(Debug)]
struct Args {
    content_dir: PathBuf,
    store: StoreTarget,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--content <dir>] [--db <sqlite_url> | --data-dir <dir>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --content {DEFAULT_CONTENT_DIR}");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COACH_CONTENT_DIR, COACH_DB_URL, COACH_DATA_DIR");
    eprintln!("  COACH_AI_API_KEY (or ZHIPUAI_API_KEY), COACH_AI_BASE_URL, COACH_AI_MODEL");
    eprintln!("  RUST_LOG (default: warn)");
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let env = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut content_dir = env("COACH_CONTENT_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR), PathBuf::from);
        let mut db_url = env("COACH_DB_URL").map(normalize_sqlite_url);
        let mut data_dir = env("COACH_DATA_DIR").map(PathBuf::from);
        let mut explicit_db = false;
        let mut explicit_dir = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--content" => {
                    content_dir = PathBuf::from(require_value(args, "--content")?);
                }
                "--db" => {
                    let value = args
                        .next()
                        .ok_or(ArgsError::MissingValue { flag: "--db" })?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(value));
                    explicit_db = true;
                }
                "--data-dir" => {
                    data_dir = Some(PathBuf::from(require_value(args, "--data-dir")?));
                    explicit_dir = true;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if explicit_db && explicit_dir {
            return Err(ArgsError::ConflictingStores);
        }
        // A flag beats the environment; between two environment values the file store wins.
        let store = match (db_url, data_dir) {
            (Some(url), _) if explicit_db => StoreTarget::Sqlite(url),
            (_, Some(dir)) => StoreTarget::Files(dir),
            (Some(url), None) => StoreTarget::Sqlite(url),
            (None, None) => StoreTarget::Sqlite(normalize_sqlite_url(DEFAULT_DB_URL.into())),
        };

        Ok(Self { content_dir, store })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        // In-memory and shared-cache URLs have no file to create.
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_storage(target: &StoreTarget) -> Result<Storage, Box<dyn std::error::Error>> {
    match target {
        StoreTarget::Sqlite(url) => {
            prepare_sqlite_file(url)?;
            Ok(Storage::sqlite(url).await?)
        }
        StoreTarget::Files(dir) => Ok(Storage::files(dir.clone()).await?),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv, |name| std::env::var(name).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let report = discover(&args.content_dir)?;
    if !report.skipped.is_empty() {
        eprintln!(
            "{} problem(s) skipped; run with RUST_LOG=warn for details.",
            report.skipped.len()
        );
    }
    let catalog = report.into_catalog();
    tracing::debug!(problems = catalog.len(), groups = catalog.groups().len(), "catalog loaded");

    let storage = open_storage(&args.store).await?;

    let coach = CoachConfig::from_env();
    if !coach.has_credential() {
        tracing::warn!("no coaching credential configured; chat turns will fail");
    }
    let provider = Arc::new(OpenAiCompatibleClient::new(&coach)?);
    let context = StudyContext::from_storage(catalog, &storage, provider, coach.settings);

    session::run(&context).await
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(argv: &[&str], vars: &[(&str, &str)]) -> Result<Args, ArgsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut argv = argv.iter().map(|arg| (*arg).to_string());
        Args::parse(&mut argv, |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_sqlite_store() {
        let args = parse(&[], &[]).unwrap();
        assert_eq!(args.content_dir, PathBuf::from(DEFAULT_CONTENT_DIR));
        let StoreTarget::Sqlite(url) = args.store else {
            panic!("expected sqlite store");
        };
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with(".coach-data/progress.sqlite3"));
    }

    #[test]
    fn data_dir_selects_file_store() {
        let args = parse(&["--content", "materials", "--data-dir", "progress"], &[]).unwrap();
        assert_eq!(args.content_dir, PathBuf::from("materials"));
        assert_eq!(args.store, StoreTarget::Files(PathBuf::from("progress")));
    }

    #[test]
    fn db_flag_beats_data_dir_from_environment() {
        let args = parse(&["--db", "sqlite::memory:"], &[("COACH_DATA_DIR", "progress")]).unwrap();
        assert_eq!(args.store, StoreTarget::Sqlite("sqlite::memory:".into()));
    }

    #[test]
    fn rejects_conflicting_and_unknown_flags() {
        assert!(matches!(
            parse(&["--db", "sqlite::memory:", "--data-dir", "x"], &[]),
            Err(ArgsError::ConflictingStores)
        ));
        assert!(matches!(
            parse(&["--verbose"], &[]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(&["--content"], &[]),
            Err(ArgsError::MissingValue { flag: "--content" })
        ));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/progress.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/progress.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
    }
}
