// ABOUTME: CLI binary for the regwatch harvest engine.
// ABOUTME: Scrapes URLs, catalog sources or a saved HTML file and prints the records as JSON.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use regwatch_harvest::resource::DEFAULT_USER_AGENT;
use regwatch_harvest::{
    find_regulation_links, ScrapedRecord, Scraper, SelectorConfig, SourceCatalog, SummaryLimits,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(about = "Extract compliance content from regulatory web pages")]
struct Args {
    /// Scrape the catalog sources for this jurisdiction (name or two-letter code)
    #[arg(long = "jurisdiction", requires = "topic")]
    jurisdiction: Option<String>,

    /// Topic to look up in the catalog (with --jurisdiction)
    #[arg(long = "topic", requires = "jurisdiction")]
    topic: Option<String>,

    /// HTML file to parse instead of fetching (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL context for HTML file parsing (required with --html)
    #[arg(long = "url")]
    url: Option<String>,

    /// JSON file with field selectors replacing the builtin ones
    #[arg(long = "selectors")]
    selectors: Option<PathBuf>,

    /// Print full records instead of summaries
    #[arg(long = "full")]
    full: bool,

    /// Skip link collection
    #[arg(long = "no-links")]
    no_links: bool,

    /// Print only links that look like regulatory material
    #[arg(long = "regulation-links")]
    regulation_links: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Delay after each successful request, and the retry backoff unit
    #[arg(long = "rate-limit-ms", env = "HARVEST_RATE_LIMIT_MS", default_value_t = 1000)]
    rate_limit_ms: u64,

    /// Attempts per URL
    #[arg(long = "max-retries", env = "HARVEST_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt timeout in seconds
    #[arg(long = "timeout-secs", env = "HARVEST_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long = "user-agent", env = "HARVEST_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Maximum concurrent requests
    #[arg(long = "concurrency", env = "HARVEST_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// URLs to scrape (fetch mode)
    #[arg()]
    urls: Vec<String>,
}

enum Mode {
    Offline { html: PathBuf, url: String },
    Catalog { jurisdiction: String, topic: String },
    Fetch(Vec<String>),
}

impl Mode {
    fn from_args(args: &Args) -> anyhow::Result<Self> {
        let sources = [
            args.html.is_some(),
            args.jurisdiction.is_some(),
            !args.urls.is_empty(),
        ];
        if sources.iter().filter(|set| **set).count() > 1 {
            bail!("use only one of positional URLs, --jurisdiction/--topic or --html");
        }

        if let Some(html) = &args.html {
            let Some(url) = &args.url else {
                bail!("--url is required when using --html");
            };
            return Ok(Mode::Offline {
                html: html.clone(),
                url: url.clone(),
            });
        }

        if let (Some(jurisdiction), Some(topic)) = (&args.jurisdiction, &args.topic) {
            return Ok(Mode::Catalog {
                jurisdiction: jurisdiction.clone(),
                topic: topic.clone(),
            });
        }

        if args.urls.is_empty() {
            bail!("at least one URL is required, or use --jurisdiction/--topic or --html with --url");
        }
        Ok(Mode::Fetch(args.urls.clone()))
    }

    /// A lone page prints as an object; everything else prints as an array.
    fn single(&self) -> bool {
        match self {
            Mode::Offline { .. } => true,
            Mode::Fetch(urls) => urls.len() == 1,
            Mode::Catalog { .. } => false,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    }
}

fn load_selectors(path: &Path) -> anyhow::Result<SelectorConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading selectors file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing selectors file {}", path.display()))
}

fn build_scraper(args: &Args) -> anyhow::Result<Scraper> {
    let mut builder = Scraper::builder()
        .rate_limit_delay(Duration::from_millis(args.rate_limit_ms))
        .max_retries(args.max_retries)
        .timeout(Duration::from_secs(args.timeout_secs))
        .user_agent(args.user_agent.as_str())
        .max_concurrency(args.concurrency);

    if let Some(path) = &args.selectors {
        builder = builder.selectors(load_selectors(path)?);
    }
    Ok(builder.build())
}

async fn collect(
    mode: &Mode,
    scraper: &mut Scraper,
    extract_links: bool,
) -> anyhow::Result<Vec<ScrapedRecord>> {
    let urls = match mode {
        Mode::Offline { html, url } => {
            let markup = fs::read_to_string(html)
                .with_context(|| format!("reading file {}", html.display()))?;
            return Ok(vec![scraper.parse_html(&markup, url, None, extract_links)]);
        }
        Mode::Catalog { jurisdiction, topic } => {
            let urls = SourceCatalog::builtin().urls_for(jurisdiction, topic);
            if urls.is_empty() {
                bail!("no known URLs for {jurisdiction}/{topic}");
            }
            urls
        }
        Mode::Fetch(urls) => urls.clone(),
    };

    let session = scraper.open()?;
    let report = session
        .scrape_many_report(&urls, None, extract_links)
        .await?;
    drop(session);

    for err in &report.failures {
        eprintln!("error scraping {}: {}", err.url, err);
    }
    let mut records = report.records;

    // keep input order for stable output
    records.sort_by_key(|record| urls.iter().position(|url| *url == record.url));
    Ok(records)
}

fn render(records: &[ScrapedRecord], args: &Args, single: bool) -> anyhow::Result<String> {
    if args.regulation_links {
        let links: BTreeSet<String> = records.iter().flat_map(find_regulation_links).collect();
        return Ok(serde_json::to_string_pretty(&links)?);
    }

    let values = records
        .iter()
        .map(|record| {
            if args.full {
                serde_json::to_value(record)
            } else {
                serde_json::to_value(record.summary(SummaryLimits::default()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rendered = match values.as_slice() {
        [only] if single => serde_json::to_string_pretty(only)?,
        _ => serde_json::to_string_pretty(&values)?,
    };
    Ok(rendered)
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let mode = Mode::from_args(args)?;
    let mut scraper = build_scraper(args)?;

    let records = collect(&mode, &mut scraper, !args.no_links).await?;
    if records.is_empty() {
        bail!("nothing could be scraped");
    }

    let output = render(&records, args, mode.single())?;
    match &args.output {
        Some(path) => fs::write(path, &output)
            .with_context(|| format!("writing to {}", path.display()))?,
        None => println!("{}", output),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let start = Instant::now();
    let result = run(&args).await;

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", start.elapsed().as_millis());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
