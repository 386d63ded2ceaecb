use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use car_price::{
    artifacts::{save_bundle, ArtifactPaths},
    builder::{build, BuildOptions},
    dataset::load_listings,
    server, AppConfig, PredictionQuery, PricePredictor,
};

#[derive(Parser, Debug)]
#[command(name = "car_price", about = "Used-car price estimation")]
struct Cli {
    /// JSON configuration file; built-in defaults apply when it is absent
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on the raw listings CSV and write the artifact bundle
    Train {
        /// Overrides paths.raw_data
        #[arg(long)]
        input: Option<PathBuf>,
        /// Overrides paths.model_dir
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Serve predictions over HTTP
    Serve {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Predict one price and print its depreciation curve
    Predict {
        #[arg(long)]
        year: String,
        #[arg(long)]
        mileage: String,
        #[arg(long)]
        brand: String,
        #[arg(long, default_value = "Petrol")]
        fuel: String,
        #[arg(long, default_value = "Manual")]
        transmission: String,
        #[arg(long)]
        years: Option<u32>,
        #[arg(long)]
        rate: Option<f64>,
    },
    /// List brands known to the loaded model
    Brands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("car_price=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Train { input, out_dir } => {
            let input = input.unwrap_or_else(|| cfg.paths.raw_data.clone());
            if let Some(dir) = out_dir {
                cfg.paths.model_dir = dir;
            }
            let listings = load_listings(&input)
                .with_context(|| format!("failed to read listings {}", input.display()))?;
            let bundle = build(&listings, &BuildOptions::from_config(&cfg.model))?;
            save_bundle(&bundle, &ArtifactPaths::from_config(&cfg.paths))?;
            println!("{}", serde_json::to_string_pretty(&bundle.report)?);
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                cfg.server.port = port;
            }
            let predictor = PricePredictor::from_config(&cfg).context("failed to load model artifacts")?;
            let addr = std::net::SocketAddr::from((cfg.server.host, cfg.server.port));
            server::serve(Arc::new(predictor), addr).await?;
        }
        Commands::Predict { year, mileage, brand, fuel, transmission, years, rate } => {
            let predictor = PricePredictor::from_config(&cfg).context("failed to load model artifacts")?;
            let query = PredictionQuery::from_text(&year, &mileage, &brand, &fuel, &transmission)?;
            let estimate = predictor.estimate(&query, years, rate)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Commands::Brands => {
            let predictor = PricePredictor::from_config(&cfg).context("failed to load model artifacts")?;
            for brand in predictor.get_clean_brands() {
                println!("{}", brand);
            }
        }
    }
    Ok(())
}
