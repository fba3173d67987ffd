use basemapper::reader::catalog::Catalog;
use basemapper::utils::{logging::init_logging, status};
use basemapper::{Config, Source, ViewerServer};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Switch GeoTIFF basemaps and toggle GeoJSON overlays on one map.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Folder holding the layer files
    #[arg(long, default_value = "data")]
    data_folder: PathBuf,

    /// Fetch layer files from this base URL instead of the data folder
    #[arg(long)]
    base_url: Option<String>,

    /// CSV catalog replacing the built-in layer set
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Delay between readiness checks while a layer loads
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,

    /// Base layer shown at start-up, "none" to start empty
    #[arg(long, default_value = "layer1")]
    initial_layer: String,

    /// Probe every layer file and exit
    #[arg(long)]
    check: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let source = match self.base_url {
            Some(url) => Source::Http(url),
            None => Source::Local(self.data_folder),
        };
        Config {
            source,
            catalog: self.catalog,
            port: self.port,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            initial_layer: (self.initial_layer != "none").then_some(self.initial_layer),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let check = cli.check;
    let config = cli.into_config();

    let catalog = match &config.catalog {
        Some(path) => Catalog::from_csv(path)?,
        None => Catalog::builtin(),
    };
    status::print_catalog_summary(&catalog);

    if check {
        let probe = config.source.probe()?;
        let failures = status::check_resources(&catalog, &config.source, probe.as_ref()).await;
        if !failures.is_empty() {
            anyhow::bail!("{} layer file(s) missing", failures.len());
        }
        return Ok(());
    }

    let server = ViewerServer::new(config, catalog)?;
    server.start().await
}
