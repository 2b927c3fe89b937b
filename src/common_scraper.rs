use crate::fetcher::{FetchOutcome, PageFetcher};
use crate::models::AgentRecord;
use crate::proxy::ProxyRotation;
use crate::scrapers::AgentDirectory;
use crate::utils::RecordSink;
use anyhow::Result;
use log::{error, info, warn};
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Delays {
    /// Pause after every successful direct request.
    pub page: Duration,
    /// Upper bound of random extra time added to the page delay.
    pub jitter: Duration,
    /// Pause every `cooldown_every` proxied requests.
    pub cooldown: Duration,
    pub cooldown_every: usize,
    /// Wait before retrying a direct request that came back 403.
    pub forbidden_wait: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            page: Duration::from_secs(10),
            jitter: Duration::ZERO,
            cooldown: Duration::from_secs(30),
            cooldown_every: 10,
            forbidden_wait: Duration::from_secs(60),
        }
    }
}

impl Delays {
    pub fn none() -> Self {
        Self {
            page: Duration::ZERO,
            jitter: Duration::ZERO,
            cooldown: Duration::ZERO,
            cooldown_every: 10,
            forbidden_wait: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapingOptions {
    pub max_pages: Option<usize>,
    pub delays: Delays,
    pub max_forbidden_retries: usize,
}

impl Default for ScrapingOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            delays: Delays::default(),
            max_forbidden_retries: 5,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScrapingResult {
    pub records: Vec<AgentRecord>,
    pub pages_fetched: usize,
    pub last_postal_code: Option<String>,
    /// Set when the run stopped because every proxy host was blocked.
    pub halted: bool,
    /// Postal codes not (completely) processed when the run halted.
    pub remaining: Vec<String>,
    pub blocked_hosts: Vec<String>,
    pub cooldowns: usize,
    /// Pages whose records could not be written to the sink.
    pub sink_failures: usize,
}

enum PageResult {
    Records(Vec<AgentRecord>, Option<usize>),
    Unavailable,
    /// Still forbidden after every direct retry; the postal code is abandoned.
    GaveUp,
    Halted,
}

enum PostalCodeResult {
    Done,
    Halted,
}

fn sleep_with_jitter(base: Duration, jitter: Duration, reason: &str) {
    let extra = if jitter.is_zero() {
        Duration::ZERO
    } else {
        let millis = rand::thread_rng().gen_range(0..=jitter.as_millis() as u64);
        Duration::from_millis(millis)
    };
    let total = base + extra;
    if total.is_zero() {
        return;
    }
    info!("Waiting for {:.1} seconds ({})...", total.as_secs_f64(), reason);
    std::thread::sleep(total);
}

struct Driver<'a, D: AgentDirectory, F: PageFetcher> {
    directory: &'a D,
    fetcher: &'a mut F,
    rotation: Option<&'a mut ProxyRotation>,
    sink: &'a mut dyn RecordSink,
    options: &'a ScrapingOptions,
    result: ScrapingResult,
}

impl<'a, D: AgentDirectory, F: PageFetcher> Driver<'a, D, F> {
    fn pool_exhausted(&self) -> bool {
        self.rotation.as_ref().map_or(false, |r| r.is_exhausted())
    }

    /// Fetches one page, retrying through other proxies (or after a wait
    /// when going direct) while the server answers 403.
    fn fetch_page(&mut self, url: &str, postal_code: &str) -> PageResult {
        let mut forbidden_retries = 0;

        loop {
            if self.pool_exhausted() {
                error!("All IP addresses are blocked. Stopping the process.");
                return PageResult::Halted;
            }

            let proxy = match self.rotation.as_deref_mut() {
                Some(rotation) => match rotation.next_available() {
                    Some(proxy) => Some(proxy),
                    None => return PageResult::Halted,
                },
                None => None,
            };

            match self.fetcher.fetch(url, proxy.as_ref()) {
                FetchOutcome::Page(html) => {
                    self.result.pages_fetched += 1;
                    let total_pages = self.directory.total_pages(&html);
                    return match self.directory.extract_agents(&html, postal_code) {
                        Ok(records) => PageResult::Records(records, total_pages),
                        Err(e) => {
                            error!("Error parsing HTML from {}: {:#}", url, e);
                            PageResult::Unavailable
                        }
                    };
                }
                FetchOutcome::Forbidden => match (self.rotation.as_deref_mut(), proxy) {
                    (Some(rotation), Some(proxy)) => {
                        rotation.mark_blocked(&proxy.host);
                        rotation.advance();
                    }
                    _ => {
                        if forbidden_retries >= self.options.max_forbidden_retries {
                            warn!(
                                "Access still forbidden for zip code {} after {} retries. Skipping...",
                                postal_code, forbidden_retries
                            );
                            return PageResult::GaveUp;
                        }
                        forbidden_retries += 1;
                        warn!(
                            "Access forbidden for zip code {}. Retrying ({}/{})...",
                            postal_code, forbidden_retries, self.options.max_forbidden_retries
                        );
                        sleep_with_jitter(self.options.delays.forbidden_wait, Duration::ZERO, "forbidden");
                    }
                },
                FetchOutcome::NotFound => {
                    warn!("Page not found for zip code {}. Skipping...", postal_code);
                    return PageResult::Unavailable;
                }
                FetchOutcome::Failed(reason) => {
                    error!("Request for {} failed: {}", url, reason);
                    self.advance_proxy();
                    return PageResult::Unavailable;
                }
            }
        }
    }

    fn advance_proxy(&mut self) {
        if let Some(rotation) = self.rotation.as_deref_mut() {
            rotation.advance();
        }
    }

    /// Paces requests after a page came back with data.
    fn after_page(&mut self) {
        let delays = &self.options.delays;
        match self.rotation.as_deref_mut() {
            Some(rotation) => {
                rotation.advance();
                if rotation.cooldown_due(delays.cooldown_every) {
                    info!("Changing proxy after {} pages...", delays.cooldown_every);
                    self.result.cooldowns += 1;
                    sleep_with_jitter(delays.cooldown, Duration::ZERO, "cooldown");
                }
            }
            None => sleep_with_jitter(delays.page, delays.jitter, "page delay"),
        }
    }

    fn scrape_postal_code(&mut self, postal_code: &str) -> PostalCodeResult {
        info!("Fetching data for zip code: {}", postal_code);
        let mut page = 1;
        let mut known_total: Option<usize> = None;

        loop {
            if let Some(max) = self.options.max_pages {
                if page > max {
                    info!("Reached maximum number of pages ({}) for zip code {}", max, postal_code);
                    break;
                }
            }
            if let Some(total) = known_total {
                if page > total {
                    break;
                }
            }

            let url = self.directory.page_url(postal_code, page);
            info!("Fetching URL: {}", url);
            info!("Scraping data from page {} for zip code {}...", page, postal_code);

            match self.fetch_page(&url, postal_code) {
                PageResult::Halted => return PostalCodeResult::Halted,
                PageResult::GaveUp => break,
                PageResult::Unavailable => {
                    if known_total.is_none() {
                        break;
                    }
                }
                PageResult::Records(records, total_pages) => {
                    if page == 1 && total_pages.is_some() {
                        known_total = total_pages;
                        info!(
                            "Found {} pages for zip code {}",
                            total_pages.unwrap_or(1),
                            postal_code
                        );
                    }

                    if records.is_empty() && known_total.is_none() {
                        info!(
                            "No data found for zip code {} on page {}. Moving to next zip code...",
                            postal_code, page
                        );
                        break;
                    }

                    if !records.is_empty() {
                        if let Err(e) = self.sink.accept(&records) {
                            error!("Error saving data for zip code {}: {:#}", postal_code, e);
                            self.result.sink_failures += 1;
                        }
                        self.result.records.extend(records);
                    }
                    self.after_page();
                }
            }

            page += 1;
        }

        PostalCodeResult::Done
    }
}

/// Walks every postal code page by page, rotating through the proxy pool
/// when one is given, and hands extracted agents to the sink.
///
/// The sink is finished even when the run halts on an exhausted pool.
pub fn run_scraper_with_options<D: AgentDirectory, F: PageFetcher>(
    directory: &D,
    fetcher: &mut F,
    rotation: Option<&mut ProxyRotation>,
    postal_codes: Vec<String>,
    sink: &mut dyn RecordSink,
    options: &ScrapingOptions,
) -> Result<ScrapingResult> {
    info!("{} agent scraper: {} zip codes", directory.name(), postal_codes.len());

    let mut queue: VecDeque<String> = postal_codes.into();
    let mut driver = Driver {
        directory,
        fetcher,
        rotation,
        sink,
        options,
        result: ScrapingResult::default(),
    };

    while let Some(postal_code) = queue.pop_front() {
        if driver.pool_exhausted() {
            error!("All IP addresses are blocked. Stopping the process.");
            queue.push_front(postal_code);
            driver.result.halted = true;
            break;
        }

        driver.result.last_postal_code = Some(postal_code.clone());
        if let PostalCodeResult::Halted = driver.scrape_postal_code(&postal_code) {
            queue.push_front(postal_code);
            driver.result.halted = true;
            break;
        }
    }

    driver.sink.finish()?;

    let mut result = driver.result;
    result.remaining = queue.into_iter().collect();
    if let Some(rotation) = driver.rotation {
        result.blocked_hosts = rotation.blocked_hosts();
    }

    if let Some(last) = &result.last_postal_code {
        info!("Process stopped at zip code: {}", last);
    }
    Ok(result)
}
