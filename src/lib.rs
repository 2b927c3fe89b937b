pub mod cli;
pub mod common_scraper;
pub mod fetcher;
pub mod input;
pub mod logger;
pub mod models;
pub mod proxy;
pub mod realtor_scraper;
pub mod scrapers;
pub mod tui;
pub mod utils;
pub mod zillow_scraper;
