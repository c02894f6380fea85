use anyhow::Result;
use clap::Parser;
use eqrscraper::{
    extract,
    partition::{self, Partition, Quarter, WORKING_QUARTERS, WORKING_YEARS},
    store::EqrStore,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Load FERC EQR contracts and identities into a DuckDB database.
#[derive(Parser)]
#[command(name = "eqrscraper")]
struct Cli {
    /// Years of EQR data to process. Defaults to the working set.
    #[arg(short = 'y', long = "years", num_args = 1..)]
    years: Vec<i32>,

    /// Quarters to process. Defaults to all four.
    #[arg(short = 'q', long = "quarters", num_args = 1.., ignore_case = true)]
    quarters: Vec<Quarter>,

    /// Clobber an existing output database instead of aborting.
    #[arg(short = 'c', long)]
    clobber: bool,

    /// Directory holding the quarterly CSV_{year}_{quarter}.zip archives.
    #[arg(long, default_value = "eqr_data")]
    data_dir: PathBuf,

    /// Output database path.
    #[arg(long = "db", default_value = "eqr.duckdb")]
    db_path: PathBuf,

    /// Derive partitions from the archives present in the data directory
    /// instead of the years/quarters cross product.
    #[arg(long)]
    discover: bool,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    let cli = Cli::parse();

    // clobber check runs before any partition is touched
    let store = EqrStore::create(&cli.db_path, cli.clobber)?;

    let partitions: Vec<Partition> = if cli.discover {
        partition::discover(&cli.data_dir)?
    } else {
        let years = if cli.years.is_empty() {
            WORKING_YEARS.to_vec()
        } else {
            cli.years.clone()
        };
        let quarters = if cli.quarters.is_empty() {
            WORKING_QUARTERS.to_vec()
        } else {
            cli.quarters.clone()
        };
        partition::cross_product(&years, &quarters)
    };

    if partitions.is_empty() {
        info!("no partitions to process; exit");
        return Ok(());
    }
    info!("{} partitions to process", partitions.len());

    for p in partitions {
        info!("processing {}", p);
        extract::extract_partition(&store, &cli.data_dir, p)?;
    }

    info!("all done");
    Ok(())
}
