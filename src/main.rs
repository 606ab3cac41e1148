use anyhow::Context;
use car_arbitrage::config::Settings;
use car_arbitrage::models::{FuelFilter, Locality, SearchCriteria, SearchResult};
use car_arbitrage::SearchCoordinator;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "car-arbitrage", version, about = "Find cars cheaper to import from Germany than to buy in France")]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search both markets and list profitable imports
    Search(SearchArgs),
}

#[derive(clap::Args)]
struct SearchArgs {
    #[arg(long)]
    brand: String,

    #[arg(long, default_value = "")]
    model: String,

    #[arg(long)]
    year_min: Option<i32>,

    #[arg(long)]
    year_max: Option<i32>,

    #[arg(long)]
    km_max: Option<i64>,

    #[arg(long)]
    price_max: Option<i64>,

    #[arg(long, value_enum, default_value_t = FuelFilter::All)]
    fuel: FuelFilter,

    /// City to search around on leboncoin
    #[arg(long)]
    city: Option<String>,

    /// Radius around the city in km, 0 for the city only
    #[arg(long, default_value_t = 0)]
    radius_km: u32,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

impl SearchArgs {
    fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            brand: self.brand.clone(),
            model: self.model.clone(),
            year_min: self.year_min,
            year_max: self.year_max,
            km_max: self.km_max,
            fuel: self.fuel,
            price_max: self.price_max,
            locality: self.city.as_ref().map(|city| Locality {
                city: city.clone(),
                radius_km: self.radius_km,
                coordinates: None,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    match cli.verbose {
        0 => {}
        1 => settings.logging.level = "info".into(),
        2 => settings.logging.level = "debug".into(),
        _ => settings.logging.level = "trace".into(),
    }
    settings.logging.init();

    match cli.command {
        Command::Search(args) => search(&settings, &args).await,
    }
}

async fn search(settings: &Settings, args: &SearchArgs) -> anyhow::Result<()> {
    let client = settings.apify_client().context("Failed to create provider client")?;
    let coordinator = SearchCoordinator::new(Arc::new(client), settings.search_settings())
        .with_matcher(settings.matcher());

    let criteria = args.criteria();
    info!("🚗 Searching {} on mobile.de and leboncoin", criteria.query_text());

    let result = coordinator.search(&criteria).await.context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_matches(&result);
    }

    Ok(())
}

fn print_matches(result: &SearchResult) {
    println!(
        "mobile.de: {} listings ({:?}), leboncoin: {} listings ({:?})",
        result.market_a.len(),
        result.reports.market_a.status,
        result.market_b.len(),
        result.reports.market_b.status,
    );
    println!();

    if result.matches.is_empty() {
        println!("No profitable imports found");
        return;
    }

    for (i, m) in result.matches.iter().enumerate() {
        let de = &m.market_a_listing;
        let fr = &m.market_b_listing;
        println!(
            "{}. {} ({}, {} km, {})",
            i + 1,
            de.title,
            de.year,
            de.km,
            de.fuel_type
        );
        println!("   Buy in {} for {} € + ~{} € import = {} €", de.city, de.price, m.import_cost, m.landed_cost());
        println!("   vs {} in {} for {} €", fr.title, fr.city, fr.price);
        println!("   Net savings: {} € ({}%)", m.savings_net, m.savings_percent);
        println!("   {}", de.url);
        println!("   {}", fr.url);
        println!();
    }
}
