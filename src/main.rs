use anyhow::{bail, Result};
use autobook::config::{default_config_path, load_config, Config, LogFormat, LoggingConfig};
use autobook::models::{Record, Topic};
use autobook::pipeline::{
    Acquirer, AuthorMatch, DownloadOutcome, Downloader, ErrorKind, MatchEngine, MirrorResolver,
    PipelineError, ProbeStatus, SearchRequest, SearchSession,
};
use autobook::sources::{LibgenSource, Source};
use autobook::ui::{self, Spinner};
use autobook::utils::HttpClient;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// autobook - Search Library Genesis and fetch a book from the first working mirror
#[derive(Parser, Debug)]
#[command(name = "autobook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search a book index, match by author and title, and download from a working mirror", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the index and list the records found
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Catalogue to search (fiction, sci-tech)
        #[arg(long, short, default_value = "fiction")]
        topic: Topic,

        /// Only show records by this author ("First Last")
        #[arg(long, short)]
        author: Option<String>,

        /// Only show records whose title matches this pattern
        #[arg(long)]
        title: Option<String>,

        /// Require an exact author name instead of a substring
        #[arg(long)]
        exact_author: bool,

        /// Keep titles as the index returns them (no ISBN stripping)
        #[arg(long)]
        raw_titles: bool,

        /// File format filter (e.g. epub, pdf)
        #[arg(long, short)]
        format: Option<String>,
    },

    /// Search, pick the first matching record that downloads, and save it
    #[command(alias = "f")]
    Fetch {
        /// Search query string
        query: String,

        /// Catalogue to search (fiction, sci-tech)
        #[arg(long, short, default_value = "fiction")]
        topic: Topic,

        /// Author to match ("First Last")
        #[arg(long, short)]
        author: Option<String>,

        /// Title pattern to match
        #[arg(long)]
        title: Option<String>,

        /// Require an exact author name instead of a substring
        #[arg(long)]
        exact_author: bool,

        /// Destination directory
        #[arg(long, short)]
        dest: Option<PathBuf>,

        /// Staging directory for in-progress downloads
        #[arg(long)]
        staging: Option<PathBuf>,
    },

    /// List the download mirrors for a content hash
    Mirrors {
        /// MD5 content hash
        md5: String,

        /// Catalogue the book belongs to
        #[arg(long, short, default_value = "fiction")]
        topic: Topic,

        /// Probe each mirror and show whether it is available
        #[arg(long)]
        probe: bool,
    },

    /// Download a URL directly
    #[command(alias = "dl")]
    Download {
        /// URL to download
        url: String,

        /// Destination directory or file
        #[arg(long, short)]
        dest: Option<PathBuf>,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// Where to write it (default: user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&cli, &config.logging);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Search {
            query,
            topic,
            author,
            title,
            exact_author,
            raw_titles,
            format,
        } => {
            let index: Arc<dyn Source> = Arc::new(LibgenSource::from_config(&config)?);
            let request = search_request(&config, query, topic, format, !raw_titles);
            let session = SearchSession::search(index, request).await?;

            let records: Vec<Record> = if author.is_some() || title.is_some() {
                let engine = MatchEngine::new(author_policy(exact_author, &config));
                let session = session.apply_match(&engine, author.as_deref(), title.as_deref())?;
                session.matched().unwrap_or_default().to_vec()
            } else {
                session.results().to_vec()
            };

            if !cli.quiet {
                eprintln!("Found {} record(s)", records.len());
            }
            output_records(&records, cli.output)?;
        }

        Commands::Fetch {
            query,
            topic,
            author,
            title,
            exact_author,
            dest,
            staging,
        } => {
            let mut config = config;
            if let Some(dest) = dest {
                config.downloads.staging = staging.unwrap_or_else(|| dest.join(".staging"));
                config.downloads.destination = dest;
            } else if let Some(staging) = staging {
                config.downloads.staging = staging;
            }
            config.matching.author_policy = author_policy(exact_author, &config);

            let spinner = if cli.quiet || !ui::is_terminal() {
                Spinner::hidden()
            } else {
                Spinner::new(&format!("Searching for '{}'...", query))
            };

            let index: Arc<dyn Source> = Arc::new(LibgenSource::from_config(&config)?);
            let request =
                search_request(&config, query, topic, None, config.search.normalize_titles);
            let acquirer = Acquirer::from_config(Arc::clone(&index), &config)?;

            let result = match SearchSession::search(index, request).await {
                Ok(session) => {
                    spinner.set_message(&format!(
                        "Acquiring from {} record(s)...",
                        session.results().len()
                    ));
                    acquirer
                        .acquire(&session, author.as_deref(), title.as_deref())
                        .await
                }
                Err(err) => Err(err),
            };
            spinner.finish();

            match result {
                Ok(report) => println!("Download successful: {}", report.path.display()),
                Err(err) => {
                    tracing::error!("Fetch failed: {}", err);
                    println!("{}", err);
                    std::process::exit(exit_code(&err));
                }
            }
        }

        Commands::Mirrors { md5, topic, probe } => {
            let index: Arc<dyn Source> = Arc::new(LibgenSource::from_config(&config)?);
            let client = HttpClient::with_timeouts(
                config.mirrors.connect_timeout(),
                config.mirrors.probe_timeout(),
            )?;
            let resolver = MirrorResolver::new(index, client)
                .timeouts(config.mirrors.timeouts())
                .probe_timeout(config.mirrors.probe_timeout());

            let urls = resolver.resolve(&md5, topic).await?;
            let mut rows: Vec<(String, Option<ProbeStatus>)> = Vec::with_capacity(urls.len());
            for url in urls {
                let status = if probe {
                    Some(resolver.probe_status(&url, config.mirrors.probe_timeout()).await)
                } else {
                    None
                };
                rows.push((url, status));
            }
            output_mirrors(&rows, cli.output)?;
        }

        Commands::Download { url, dest } => {
            let dest = dest.unwrap_or_else(|| config.downloads.destination.clone());
            if !dest.exists() && dest.extension().is_none() {
                std::fs::create_dir_all(&dest)?;
            }

            let client = HttpClient::with_timeouts(
                config.mirrors.connect_timeout(),
                config.downloads.timeout(),
            )?;
            match Downloader::new(client).download(&url, &dest).await? {
                DownloadOutcome::Success { path, bytes } => {
                    if !cli.quiet {
                        eprintln!("Wrote {} bytes", bytes);
                    }
                    println!("Download successful: {}", path.display());
                }
                DownloadOutcome::Failure { reason } => {
                    bail!("Download failed: {}", reason);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Init { path, force } => {
                let Some(path) = path.or_else(default_config_path) else {
                    bail!("Cannot determine a config directory; pass --path");
                };
                write_default_config(&path, force)?;
                println!("Wrote {}", path.display());
            }
        },
    }

    Ok(())
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("autobook={}", level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn search_request(
    config: &Config,
    query: String,
    topic: Topic,
    format: Option<String>,
    normalize: bool,
) -> SearchRequest {
    let mut request = SearchRequest::new(query, topic)
        .normalize(normalize)
        .language(config.search.language.clone());
    if let Some(format) = format.or_else(|| config.search.format.clone()) {
        request = request.format(format);
    }
    request
}

fn author_policy(exact: bool, config: &Config) -> AuthorMatch {
    if exact {
        AuthorMatch::Exact
    } else {
        config.matching.author_policy
    }
}

fn exit_code(err: &PipelineError) -> i32 {
    match err.kind() {
        ErrorKind::Usage => 2,
        _ => 1,
    }
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; use --force to overwrite", path.display());
    }
    Config::default().save(path)?;
    Ok(())
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if ui::is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn output_records(records: &[Record], format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Plain => print!("{}", ui::records_plain(records)),
        OutputFormat::Table => println!("{}", ui::records_table(records)),
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

fn output_mirrors(rows: &[(String, Option<ProbeStatus>)], format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|(url, status)| {
                    serde_json::json!({
                        "url": url,
                        "status": status.as_ref().map(|s| s.to_string()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Plain => {
            for (url, status) in rows {
                match status {
                    Some(status) => println!("{}\t{}", url, status),
                    None => println!("{}", url),
                }
            }
        }
        OutputFormat::Table => println!("{}", ui::mirrors_table(rows)),
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["autobook"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_and_quiet() {
        let cli = Cli::parse_from(["autobook", "-vv"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["autobook", "--quiet"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_output_format() {
        let cli = Cli::parse_from(["autobook", "-o", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);

        let cli = Cli::parse_from(["autobook", "--output", "plain"]);
        assert_eq!(cli.output, OutputFormat::Plain);
    }

    #[test]
    fn test_cli_config_flag() {
        let cli = Cli::parse_from(["autobook", "--config", "/path/to/autobook.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/autobook.toml")));
    }

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from(["autobook", "search", "cloud cuckoo land"]);
        match &cli.command {
            Some(Commands::Search {
                query,
                topic,
                author,
                raw_titles,
                ..
            }) => {
                assert_eq!(query, "cloud cuckoo land");
                assert_eq!(*topic, Topic::Fiction);
                assert!(author.is_none());
                assert!(!raw_titles);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_with_options() {
        let cli = Cli::parse_from([
            "autobook",
            "search",
            "art of programming",
            "--topic",
            "sci-tech",
            "--author",
            "Donald Knuth",
            "--title",
            "art.*",
            "--exact-author",
            "--raw-titles",
            "-f",
            "pdf",
        ]);
        match &cli.command {
            Some(Commands::Search {
                topic,
                author,
                title,
                exact_author,
                raw_titles,
                format,
                ..
            }) => {
                assert_eq!(*topic, Topic::SciTech);
                assert_eq!(author.as_deref(), Some("Donald Knuth"));
                assert_eq!(title.as_deref(), Some("art.*"));
                assert!(exact_author);
                assert!(raw_titles);
                assert_eq!(format.as_deref(), Some("pdf"));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_fetch_command() {
        let cli = Cli::parse_from([
            "autobook",
            "fetch",
            "cloud cuckoo land",
            "-a",
            "Anthony Doerr",
            "--dest",
            "/tmp/books",
        ]);
        match &cli.command {
            Some(Commands::Fetch {
                query,
                author,
                dest,
                staging,
                ..
            }) => {
                assert_eq!(query, "cloud cuckoo land");
                assert_eq!(author.as_deref(), Some("Anthony Doerr"));
                assert_eq!(dest.as_deref(), Some(Path::new("/tmp/books")));
                assert!(staging.is_none());
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_mirrors_and_download_commands() {
        let cli = Cli::parse_from(["autobook", "mirrors", "abc123", "--topic", "sci-tech", "--probe"]);
        match &cli.command {
            Some(Commands::Mirrors { md5, topic, probe }) => {
                assert_eq!(md5, "abc123");
                assert_eq!(*topic, Topic::SciTech);
                assert!(probe);
            }
            _ => panic!("Expected Mirrors command"),
        }

        let cli = Cli::parse_from(["autobook", "dl", "http://example.com/book.epub"]);
        assert!(matches!(cli.command, Some(Commands::Download { ref url, dest: None }) if url == "http://example.com/book.epub"));
    }

    #[test]
    fn test_cli_config_commands() {
        let cli = Cli::parse_from(["autobook", "config", "show"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));

        let cli = Cli::parse_from(["autobook", "config", "init", "--path", "/tmp/a.toml", "--force"]);
        match cli.command {
            Some(Commands::Config {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, Some(PathBuf::from("/tmp/a.toml")));
                assert!(force);
            }
            _ => panic!("Expected Config init"),
        }
    }

    #[test]
    fn test_invalid_topic_is_rejected() {
        let result = Cli::try_parse_from(["autobook", "search", "x", "--topic", "poetry"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_request_uses_config_filters() {
        let mut config = Config::default();
        config.search.format = Some("epub".to_string());

        let request = search_request(&config, "q".to_string(), Topic::Fiction, None, true);
        assert_eq!(request.language.as_deref(), Some("English"));
        assert_eq!(request.format.as_deref(), Some("epub"));

        let request = search_request(&config, "q".to_string(), Topic::Fiction, Some("pdf".into()), false);
        assert_eq!(request.format.as_deref(), Some("pdf"));
        assert!(!request.normalize);
    }

    #[test]
    fn test_author_policy_override() {
        let config = Config::default();
        assert_eq!(author_policy(false, &config), AuthorMatch::Substring);
        assert_eq!(author_policy(true, &config), AuthorMatch::Exact);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&PipelineError::Query("".into())), 2);
        assert_eq!(exit_code(&PipelineError::NoMirrors), 1);
    }

    #[test]
    fn test_write_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autobook.toml");

        write_default_config(&path, false).unwrap();
        assert!(path.exists());
        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();
    }
}
