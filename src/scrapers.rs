use crate::models::AgentRecord;
use crate::{realtor_scraper, zillow_scraper};
use anyhow::Result;

/// An agent directory site that lists agents page by page per postal code.
pub trait AgentDirectory {
    fn name(&self) -> &str;
    fn page_url(&self, postal_code: &str, page: usize) -> String;
    fn extract_agents(&self, html: &str, postal_code: &str) -> Result<Vec<AgentRecord>>;

    /// Page count announced on the first page. `None` means walk until an
    /// empty page.
    fn total_pages(&self, _html: &str) -> Option<usize> {
        None
    }

    fn referer(&self) -> Option<&str> {
        None
    }

    fn default_output(&self) -> &str;
}

pub struct RealtorDirectory;

impl AgentDirectory for RealtorDirectory {
    fn name(&self) -> &str {
        "Realtor.com"
    }

    fn page_url(&self, postal_code: &str, page: usize) -> String {
        realtor_scraper::page_url(postal_code, page)
    }

    fn extract_agents(&self, html: &str, postal_code: &str) -> Result<Vec<AgentRecord>> {
        realtor_scraper::extract_agents(html, postal_code)
    }

    fn default_output(&self) -> &str {
        "realtor_output_data.csv"
    }
}

pub struct ZillowDirectory;

impl AgentDirectory for ZillowDirectory {
    fn name(&self) -> &str {
        "Zillow"
    }

    fn page_url(&self, postal_code: &str, page: usize) -> String {
        zillow_scraper::page_url(postal_code, page)
    }

    fn extract_agents(&self, html: &str, postal_code: &str) -> Result<Vec<AgentRecord>> {
        zillow_scraper::extract_agents(html, postal_code)
    }

    fn total_pages(&self, html: &str) -> Option<usize> {
        Some(zillow_scraper::total_pages(html).unwrap_or(1))
    }

    fn referer(&self) -> Option<&str> {
        Some(zillow_scraper::REFERER)
    }

    fn default_output(&self) -> &str {
        "zillow_output_data.csv"
    }
}
