use crate::common_scraper::{run_scraper_with_options, Delays, ScrapingOptions};
use crate::fetcher::HttpFetcher;
use crate::proxy::ProxyRotation;
use crate::scrapers::AgentDirectory;
use crate::utils::{self, CsvSink, OutputMode};
use crate::{input, logger, tui};
use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Options shared by every scraper binary.
#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Spreadsheet, CSV or text file with the postal codes to scrape
    #[clap(short = 'z', long, default_value = "zipcodes.xlsx")]
    pub postal_codes: PathBuf,

    /// Proxy list (host:port:user:pass per line); requests go direct when omitted
    #[clap(short, long)]
    pub proxies: Option<PathBuf>,

    /// Output CSV file with Name, Phone and Zip Code columns [default: <site>_output_data.csv]
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Append to the output file after every page instead of writing once at the end
    #[clap(long)]
    pub incremental: bool,

    /// Maximum number of pages to scrape per postal code
    #[clap(short, long)]
    pub max_pages: Option<usize>,

    /// Seconds to wait after each page when going direct
    #[clap(long, default_value = "10")]
    pub page_delay: u64,

    /// Upper bound in seconds of random extra delay per page
    #[clap(long, default_value = "0")]
    pub jitter: u64,

    /// Seconds to pause every --cooldown-every proxied pages
    #[clap(long, default_value = "30")]
    pub cooldown: u64,

    #[clap(long, default_value = "10")]
    pub cooldown_every: usize,

    /// Seconds to wait before retrying a forbidden direct request
    #[clap(long, default_value = "60")]
    pub forbidden_wait: u64,

    /// Retries of a forbidden direct request before skipping the postal code
    #[clap(long, default_value = "5")]
    pub max_forbidden_retries: usize,

    /// HTTP request timeout in seconds
    #[clap(long, default_value = "30")]
    pub timeout: u64,

    /// Enable debug output
    #[clap(short, long)]
    pub debug: bool,
}

impl ScrapeArgs {
    pub fn scraping_options(&self) -> ScrapingOptions {
        ScrapingOptions {
            max_pages: self.max_pages,
            delays: Delays {
                page: Duration::from_secs(self.page_delay),
                jitter: Duration::from_secs(self.jitter),
                cooldown: Duration::from_secs(self.cooldown),
                cooldown_every: self.cooldown_every,
                forbidden_wait: Duration::from_secs(self.forbidden_wait),
            },
            max_forbidden_retries: self.max_forbidden_retries,
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.incremental {
            OutputMode::Incremental
        } else {
            OutputMode::Batch
        }
    }
}

pub fn run<D: AgentDirectory>(directory: &D, args: &ScrapeArgs) -> Result<()> {
    logger::init(args.debug);

    info!("Reading file for zipcodes....");
    let postal_codes = input::load_postal_codes(&args.postal_codes)?;
    let total_postal_codes = postal_codes.len();

    let mut rotation = match &args.proxies {
        Some(path) => {
            let proxies = input::load_proxies(path)?;
            let rotation = ProxyRotation::new(proxies)
                .with_context(|| format!("No usable proxies in {}", path.display()))?;
            info!("Rotating through {} proxies", rotation.len());
            Some(rotation)
        }
        None => None,
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(directory.default_output()));
    let mut sink = CsvSink::new(&output, args.output_mode());
    let mut fetcher = HttpFetcher::new(directory.referer(), Duration::from_secs(args.timeout));

    let result = run_scraper_with_options(
        directory,
        &mut fetcher,
        rotation.as_mut(),
        postal_codes,
        &mut sink,
        &args.scraping_options(),
    )?;

    let rows_in_file = rows_in_output(&sink);
    tui::show_final_summary(&result, total_postal_codes, sink.path(), rows_in_file)?;

    Ok(())
}

/// Counts the rows now in the output file. Falls back to the rows written
/// by this run when the file holds rows that do not parse.
fn rows_in_output(sink: &CsvSink) -> usize {
    match utils::load_agents_from_csv(sink.path()) {
        Ok(agents) => agents.len(),
        Err(e) => {
            warn!("Could not re-read {}: {:#}", sink.path().display(), e);
            sink.written()
        }
    }
}
