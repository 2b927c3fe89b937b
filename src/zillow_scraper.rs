use crate::models::AgentRecord;
use anyhow::Result;
use log::debug;
use regex::Regex;
use scraper::{Html, Selector};

pub const BASE_URL: &str = "https://www.zillow.com/professionals/real-estate-agent-reviews";
pub const REFERER: &str = "https://www.zillow.com/homes/Missoula,-MT_rb/";

pub fn page_url(postal_code: &str, page: usize) -> String {
    format!(
        "{}/{}/?page={}",
        BASE_URL,
        urlencoding::encode(postal_code),
        page
    )
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Failed to parse selector {}: {:?}", css, e))
}

fn clean_phone(raw: &str) -> String {
    let without_label = raw.replace("phone number", "");
    let whitespace = Regex::new(r"\s+").unwrap();
    whitespace.replace_all(without_label.trim(), " ").to_string()
}

/// Rows lacking a name link or a phone number are dropped.
pub fn extract_agents(html: &str, postal_code: &str) -> Result<Vec<AgentRecord>> {
    let document = Html::parse_document(html);

    let row_selector = selector("tr.StyledTableRow-c11n-8-99-1__sc-65t1u6-0.hfWgOM")?;
    let name_selector = selector("a")?;
    let phone_selector = selector("div.Text-c11n-8-99-1__sc-aiai24-0.bwCmyj")?;

    let mut agents = Vec::new();

    for row in document.select(&row_selector) {
        let name = row
            .select(&name_selector)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string());
        let phone = row
            .select(&phone_selector)
            .next()
            .map(|div| clean_phone(&div.text().collect::<String>()));

        match (name, phone) {
            (Some(name), Some(phone)) => {
                agents.push(AgentRecord::new(name, Some(phone), postal_code));
            }
            _ => debug!("Dropping row without name or phone for zip code {}", postal_code),
        }
    }

    Ok(agents)
}

/// Reads the page count from the pagination bar; the last entry is the
/// "next" arrow, so the count sits in the entry before it.
pub fn total_pages(html: &str) -> Option<usize> {
    let document = Html::parse_document(html);
    let nav_selector = selector("nav.StyledPagination-c11n-8-99-1__sc-4uav85-0").ok()?;
    let item_selector = selector("li").ok()?;

    let nav = document.select(&nav_selector).next()?;
    let items: Vec<String> = nav
        .select(&item_selector)
        .map(|li| li.text().collect::<String>().trim().to_string())
        .collect();

    if items.len() < 2 {
        return Some(1);
    }
    items[items.len() - 2].parse::<usize>().ok()
}
