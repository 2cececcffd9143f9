use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use devtools::Result;
use devtools::config::Config;
use devtools::connection::{self, DatabaseParameters, DatabaseType};
use devtools::env::{self, EnvFormat, Environment, templates};
use devtools::model::{FilterInput, MongoQuery};
use devtools::render::{self, Language, SqlDialect};
use devtools::store::{Category, Collection, ExportOptions, FileStore, Tool};
use devtools::{compile, schema, validate};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devtools")]
#[command(about = "MongoDB query builder, SQL and connection helpers, env-var checker and tool storage", long_about = None)]
struct Cli {
    /// trace, debug, info, warn or error. Falls back to RUST_LOG, then the
    /// config file.
    #[arg(short, long, global = true, value_parser = parse_level)]
    log_level: Option<Level>,

    /// TOML settings file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter conditions (flat or nested JSON) into a MongoDB query document.
    Compile {
        /// JSON file, or `-` for stdin.
        filter: String,
    },

    /// Generate source code for a saved query.
    Query {
        /// Query JSON file, or `-` for stdin.
        query: String,

        /// shell, nodejs or python.
        #[arg(long)]
        lang: Option<Language>,
    },

    /// Translate a saved find query into a SQL `SELECT`.
    Sql {
        /// Query JSON file, or `-` for stdin.
        query: String,

        #[arg(long, default_value = "sql")]
        dialect: SqlDialect,
    },

    /// Check a saved query; exits non-zero when it has errors.
    Validate { query: String },

    /// Infer field types from a sample document.
    Schema {
        document: String,

        #[arg(long)]
        collection: String,
    },

    /// Persisted tool data.
    Store {
        /// Overrides `data_dir` from the config file.
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,

        #[command(subcommand)]
        cmd: StoreCommands,
    },

    /// Environment-variable sets (`.env` or JSON files).
    Env {
        #[command(subcommand)]
        cmd: EnvCommands,
    },

    /// Database connection strings and parameters.
    Conn {
        #[arg(long = "type", short = 't')]
        db_type: DatabaseType,

        #[command(subcommand)]
        cmd: ConnCommands,
    },
}

#[derive(Subcommand)]
enum ConnCommands {
    /// Parameters JSON (inline, file, or `-`) to a connection string.
    Build { params: String },
    /// Connection string to parameters JSON.
    Parse { connection_string: String },
    /// Validation and security advice for parameters JSON.
    Check { params: String },
    Defaults,
    /// Hide passwords in a connection string.
    Mask { connection_string: String },
}

#[derive(Subcommand)]
enum StoreCommands {
    Export {
        /// Only these tools' records (comma separated tool ids).
        #[arg(long, value_delimiter = ',')]
        tools: Vec<Tool>,

        /// Wrap the data in `{ metadata, data }`.
        #[arg(long)]
        metadata: bool,

        /// Keep credentials and sensitive values.
        #[arg(long)]
        include_personal: bool,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Merge an export into the current data.
    Import { file: String },
    /// Add a record to a collection: inline JSON object, file, or `-`.
    Add { collection: Collection, record: String },
    Remove { collection: Collection, id: String },
    /// Clear everything, one tool, or one category.
    Clear {
        #[arg(long, conflicts_with = "category")]
        tool: Option<Tool>,

        #[arg(long)]
        category: Option<Category>,
    },
    Backup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_delimiter = ',')]
        tools: Vec<Tool>,
    },
    Restore { id: String },
    DeleteBackup { id: String },
    Backups,
    Usage,
    /// Trim history when storage is above 80% of its budget.
    Cleanup,
}

#[derive(Subcommand)]
enum EnvCommands {
    Validate { file: PathBuf },
    Export {
        file: PathBuf,

        #[arg(long, default_value = ".env")]
        format: EnvFormat,
    },
    Diff { a: PathBuf, b: PathBuf },
    /// Preview `${VAR}` / `$VAR` expansion.
    Substitute { file: PathBuf },
    /// List starter templates.
    Templates {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        framework: Option<String>,

        /// Free-text search over names, tags and variables.
        #[arg(long)]
        search: Option<String>,
    },
    /// Start an environment from a template.
    New {
        template: String,

        #[arg(long, default_value = "development")]
        name: String,

        #[arg(long, default_value = ".env")]
        format: EnvFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logging(cli.log_level, config.log_level()?);

    match cli.cmd {
        Commands::Compile { filter } => {
            let input: FilterInput = serde_json::from_str(&read_input(&filter)?)
                .context("filter must be a condition list or a nested expression")?;
            let tree = compile::compile(&input)?;
            print_json(&render::filter_to_value(&tree), &config)?;
        }
        Commands::Query { query, lang } => {
            let query = read_query(&query)?;
            let lang = match lang {
                Some(l) => l,
                None => config.language()?,
            };
            println!("{}", render::render_code(&query, lang)?);
        }
        Commands::Sql { query, dialect } => {
            println!("{}", render::select_statement(&read_query(&query)?, dialect)?);
        }
        Commands::Validate { query } => {
            let report = validate::validate_query(&read_query(&query)?);
            print_json(&report, &config)?;
            if !report.valid {
                bail!("query has {} error(s)", report.errors.len());
            }
        }
        Commands::Schema {
            document,
            collection,
        } => {
            let doc: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&read_input(&document)?)
                    .context("sample document must be a JSON object")?;
            print_json(&schema::infer_schema(&doc, &collection), &config)?;
        }
        Commands::Store { data_dir, cmd } => {
            let store = FileStore::new(data_dir.unwrap_or_else(|| config.data_dir.clone()));
            run_store(&store, cmd, &config)?;
        }
        Commands::Env { cmd } => run_env(cmd, &config)?,
        Commands::Conn { db_type, cmd } => run_conn(db_type, cmd, &config)?,
    }

    Ok(())
}

fn run_store(store: &FileStore, cmd: StoreCommands, config: &Config) -> Result<()> {
    match cmd {
        StoreCommands::Export {
            tools,
            metadata,
            include_personal,
            out,
        } => {
            let text = store.export_document(&ExportOptions {
                tools: (!tools.is_empty()).then_some(tools),
                include_metadata: metadata,
                include_personal_data: include_personal,
            })?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", text),
            }
        }
        StoreCommands::Import { file } => {
            let summary = store.import_document(&read_input(&file)?)?;
            for (key, n) in &summary.merge.added {
                println!("{}: +{}", key, n);
            }
            println!(
                "Imported {} record(s), skipped {} duplicate(s)",
                summary.merge.total_added(),
                summary.merge.skipped_duplicates
            );
        }
        StoreCommands::Add { collection, record } => {
            let text = if record.trim_start().starts_with('{') {
                record
            } else {
                read_input(&record)?
            };
            let record: serde_json::Value =
                serde_json::from_str(&text).context("record must be JSON")?;
            println!("{}", store.add_record(collection, record)?);
        }
        StoreCommands::Remove { collection, id } => {
            if !store.remove_record(collection, &id)? {
                bail!("no record '{}' in {}", id, collection);
            }
        }
        StoreCommands::Clear { tool, category } => match (tool, category) {
            (Some(tool), _) => store.clear_tool(tool)?,
            (None, Some(category)) => store.clear_category(category)?,
            (None, None) => store.clear_all()?,
        },
        StoreCommands::Backup {
            name,
            description,
            tools,
        } => {
            let tools = (!tools.is_empty()).then_some(tools.as_slice());
            println!("{}", store.create_backup(&name, description.as_deref(), tools)?);
        }
        StoreCommands::Restore { id } => store.restore_backup(&id)?,
        StoreCommands::DeleteBackup { id } => {
            if !store.delete_backup(&id)? {
                bail!("no backup '{}'", id);
            }
        }
        StoreCommands::Backups => print_json(&store.list_backups(), config)?,
        StoreCommands::Usage => print_json(&store.storage_usage(), config)?,
        StoreCommands::Cleanup => match store.cleanup_old_data()? {
            Some(summary) => println!(
                "Removed {} api response(s), {} recent tool(s), {} backup(s)",
                summary.api_responses_removed,
                summary.recent_tools_removed,
                summary.backups_removed
            ),
            None => println!("Storage below cleanup threshold; nothing to do"),
        },
    }
    Ok(())
}

fn run_env(cmd: EnvCommands, config: &Config) -> Result<()> {
    match cmd {
        EnvCommands::Validate { file } => {
            let report = env::validate_environment(&read_environment(&file)?);
            print_json(&report, config)?;
            if !report.valid {
                bail!("environment has {} error(s)", report.errors.len());
            }
        }
        EnvCommands::Export { file, format } => {
            let text = env::export_environment(&read_environment(&file)?, format);
            println!("{}", text.trim_end());
        }
        EnvCommands::Diff { a, b } => {
            let diff = env::compare_environments(&read_environment(&a)?, &read_environment(&b)?);
            print_json(&diff, config)?;
        }
        EnvCommands::Substitute { file } => {
            print!("{}", env::substitute_variables(&read_environment(&file)?.variables));
        }
        EnvCommands::Templates {
            category,
            framework,
            search,
        } => {
            let found: Vec<&env::EnvTemplate> = match search {
                Some(q) => templates::search(&q),
                None => templates::by_category(category.as_deref()),
            }
            .into_iter()
            .filter(|t| {
                framework
                    .as_deref()
                    .is_none_or(|f| t.framework.as_deref() == Some(f))
            })
            .collect();
            for t in found {
                println!("{:<22} {:<14} {}", t.id, t.category, t.description);
            }
        }
        EnvCommands::New {
            template,
            name,
            format,
        } => {
            let Some(t) = templates::find_template(&template) else {
                bail!(
                    "no template '{}' (see `devtools env templates`)",
                    template
                );
            };
            let text = env::export_environment(&t.instantiate(&name), format);
            println!("{}", text.trim_end());
        }
    }
    Ok(())
}

fn run_conn(ty: DatabaseType, cmd: ConnCommands, config: &Config) -> Result<()> {
    match cmd {
        ConnCommands::Build { params } => {
            println!("{}", connection::build_connection_string(&read_params(&params)?, ty)?);
        }
        ConnCommands::Parse { connection_string } => {
            print_json(&connection::parse_connection_string(&connection_string, ty)?, config)?;
        }
        ConnCommands::Check { params } => {
            let params = read_params(&params)?;
            let report = connection::validate_parameters(&params, ty);
            print_json(
                &serde_json::json!({
                    "validation": report,
                    "recommendations": connection::security_recommendations(&params, ty),
                }),
                config,
            )?;
            if !report.valid {
                bail!("connection has {} error(s)", report.errors.len());
            }
        }
        ConnCommands::Defaults => print_json(&connection::defaults(ty), config)?,
        ConnCommands::Mask { connection_string } => {
            println!("{}", connection::mask_sensitive_data(&connection_string));
        }
    }
    Ok(())
}

fn setup_logging(flag: Option<Level>, configured: Option<Level>) {
    let filter = match flag {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(Level::WARN).to_string())),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn parse_level(level: &str) -> std::result::Result<Level, String> {
    level.parse().map_err(|_| {
        format!(
            "unknown log level '{}' (expected trace, debug, info, warn or error)",
            level
        )
    })
}

/// Contents of `path`, or stdin for `-`.
fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path))
}

/// Inline JSON object, or a file / `-` holding one.
fn read_params(arg: &str) -> Result<DatabaseParameters> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        read_input(arg)?
    };
    serde_json::from_str(&text).context("connection parameters must be a JSON object")
}

fn read_query(path: &str) -> Result<MongoQuery> {
    serde_json::from_str(&read_input(path)?).with_context(|| format!("parsing query {}", path))
}

/// `.json` files hold an environment object; anything else is `.env` text
/// named after the file.
fn read_environment(path: &Path) -> Result<Environment> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().is_some_and(|e| e == "json") {
        return serde_json::from_str(&text)
            .with_context(|| format!("parsing environment {}", path.display()));
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().trim_start_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "env".to_string());
    let env = Environment::from_dotenv(&name, &text);
    info!(path = %path.display(), variables = env.variables.len(), "loaded .env file");
    Ok(env)
}

fn print_json<T: Serialize>(value: &T, config: &Config) -> Result<()> {
    let text = if config.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_level_flag_is_validated() {
        let cli = Cli::try_parse_from(["devtools", "--log-level", "DEBUG", "store", "usage"]).unwrap();
        assert_eq!(cli.log_level, Some(Level::DEBUG));

        assert!(Cli::try_parse_from(["devtools", "--log-level", "loud", "store", "usage"]).is_err());
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn conn_and_sql_arguments() {
        let cli = Cli::try_parse_from(["devtools", "conn", "-t", "postgres", "mask", "x"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::Conn {
                db_type: DatabaseType::Postgresql,
                cmd: ConnCommands::Mask { .. }
            }
        ));

        let cli = Cli::try_parse_from(["devtools", "sql", "q.json", "--dialect", "tsql"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::Sql {
                dialect: SqlDialect::Mssql,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["devtools", "conn", "-t", "access", "defaults"]).is_err());
    }
}
