use agentfinder::cli::{self, ScrapeArgs};
use agentfinder::scrapers::{RealtorDirectory, ZillowDirectory};
use anyhow::Result;
use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Site {
    Realtor,
    Zillow,
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Agentfinder - Real Estate Agent Directory Scraper")]
struct Args {
    /// Agent directory to scrape
    #[clap(short, long, value_enum, default_value = "realtor")]
    site: Site,

    #[clap(flatten)]
    scrape: ScrapeArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Agentfinder - Real Estate Agent Directory Scraper");
    println!("=================================================");

    match args.site {
        Site::Realtor => cli::run(&RealtorDirectory, &args.scrape),
        Site::Zillow => cli::run(&ZillowDirectory, &args.scrape),
    }
}
