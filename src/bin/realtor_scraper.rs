use agentfinder::cli::{self, ScrapeArgs};
use agentfinder::scrapers::RealtorDirectory;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Realtor.com Agent Scraper")]
struct Args {
    #[clap(flatten)]
    scrape: ScrapeArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli::run(&RealtorDirectory, &args.scrape)
}
