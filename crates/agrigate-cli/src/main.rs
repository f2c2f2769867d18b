mod display;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use agrigate_ai::{Catalog, Pipeline, Registry};
use agrigate_core::{ArtifactId, ArtifactSource, Domain, DomainRequest, GatewayConfig, classify};
use agrigate_fetch::{HubFetcher, LocalDirSource};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agrigate", version)]
#[command(about = "Resilient multi-model inference for agricultural predictions")]
#[command(long_about = r#"
Routes validated prediction requests to pre-trained models and falls back to
deterministic rule-based estimates whenever a model is missing or misbehaves.

Configuration is merged from (highest priority first):
  AGRIGATE_* environment variables   (nested keys split on "__")
  --config <path>                    explicit config file
  ./agrigate.toml                    project config
  built-in defaults

Example:
  agrigate predict --input flood.json
  echo '{"domain":"storm","state":"Odisha","month":10,"wind_speed":70,"pressure":995,"humidity":80}' | agrigate predict
"#)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serve artifacts from a local directory instead of the model hub
    #[arg(long, global = true, value_name = "DIR")]
    artifact_dir: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every configured artifact and list the resulting bundles
    Catalog {
        /// Print the load report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download one artifact into the cache
    Fetch {
        /// Artifact path within the repository, e.g. flood/flood_rf.json
        artifact: String,
    },
    /// Run one prediction request (JSON, tagged by "domain")
    Predict {
        /// Request file; reads stdin when omitted
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Print the prediction as JSON
        #[arg(long)]
        json: bool,

        /// Do not load models; answer with rule-based estimates only
        #[arg(long)]
        skip_models: bool,
    },
    /// Print the bucket a value falls into for a domain
    Classify {
        domain: Domain,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn artifact_source(cli: &Cli, config: &GatewayConfig) -> Result<Arc<dyn ArtifactSource>> {
    let source: Arc<dyn ArtifactSource> = match &cli.artifact_dir {
        Some(dir) => Arc::new(LocalDirSource::new(dir)),
        None => Arc::new(HubFetcher::new(config).context("building hub client")?),
    };
    Ok(source)
}

fn read_request(input: Option<&PathBuf>) -> Result<DomainRequest> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing prediction request")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!("agrigate v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match &cli.command {
        Command::Catalog { json } => {
            let registry = Registry::new(&config, artifact_source(&cli, &config)?)?;
            let report = registry.load_all().await.context("loading model catalog")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                print!("{}", display::render_catalog(&registry.summary(), report));
            }
        }

        Command::Fetch { artifact } => {
            let id = ArtifactId::new(artifact.as_str())?;
            let path = artifact_source(&cli, &config)?
                .fetch(&id)
                .await
                .with_context(|| format!("fetching {id}"))?;
            println!("{}", path.display());
        }

        Command::Predict {
            input,
            json,
            skip_models,
        } => {
            let request = read_request(input.as_ref())?;
            let registry = if *skip_models {
                warn!("model loading skipped, answering from rule-based estimates");
                Registry::from_catalog(Catalog::default())
            } else {
                let registry = Registry::new(&config, artifact_source(&cli, &config)?)?;
                registry.load_all().await.context("loading model catalog")?;
                registry
            };

            let pipeline = Pipeline::new(Arc::new(registry)).with_timeout(config.predict_timeout());
            let prediction = pipeline.infer(&request).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else {
                print!("{}", display::render_prediction(&prediction));
            }
        }

        Command::Classify { domain, value } => match classify(*domain, *value) {
            Some(bucket) => println!("{bucket}"),
            None => bail!("{domain} is categorical: its bucket is the predicted class label"),
        },

        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
