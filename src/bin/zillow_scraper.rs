use agentfinder::cli::{self, ScrapeArgs};
use agentfinder::scrapers::ZillowDirectory;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Zillow Agent Scraper")]
struct Args {
    #[clap(flatten)]
    scrape: ScrapeArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli::run(&ZillowDirectory, &args.scrape)
}
