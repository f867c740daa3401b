use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use viromedash::catalogue::CatalogueService;
use viromedash::config::{ConfigLoader, ResolvedConfig};
use viromedash::datasets::DataStore;
use viromedash::domain::MoleculeType;
use viromedash::error::DashError;
use viromedash::fs_util;
use viromedash::ncbi::EntrezHttpClient;
use viromedash::output::{JsonOutput, OutputMode, TextOutput};
use viromedash::upload;
use viromedash::web::{self, AppState};

#[derive(Parser)]
#[command(name = "viromedash")]
#[command(about = "Dashboard for viral sequence metadata with a GenBank self catalogue")]
#[command(version, author)]
struct Cli {
    /// Path to viromedash.json
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print command results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Serve the dashboard (default)")]
    Serve(ServeArgs),
    #[command(about = "Catalogue the accessions of a list or FASTA file")]
    Catalogue(CatalogueArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    #[arg(long)]
    bind: Option<IpAddr>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    data_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct CatalogueArgs {
    file: Utf8PathBuf,

    #[arg(long, value_enum, default_value_t = MoleculeType::Protein)]
    molecule: MoleculeType,

    /// Also write the merged per-accession table here
    #[arg(long)]
    out: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DashError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DashError) -> u8 {
    match error {
        DashError::ConfigRead(_) | DashError::ConfigParse(_) | DashError::ConfigInvalid(_) => 2,
        error if error.is_input_error() => 2,
        error if error.is_remote_error() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve(args)) => run_serve(args, config),
        Some(Commands::Catalogue(args)) => run_catalogue(args, config, output_mode),
        None => run_serve(ServeArgs::default(), config),
    }
}

fn run_serve(args: ServeArgs, mut config: ResolvedConfig) -> miette::Result<()> {
    if let Some(bind) = args.bind {
        config.addr.set_ip(bind);
    }
    if let Some(port) = args.port {
        config.addr.set_port(port);
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    // The blocking client must be created and dropped outside the runtime.
    let client = Arc::new(EntrezHttpClient::new(config.ncbi.clone())?);
    let state = AppState::new(
        DataStore::new(config.data_dir.clone()),
        client.clone(),
        config.static_dir.clone(),
    );
    info!(
        data_dir = %config.data_dir,
        static_dir = %config.static_dir,
        schema_version = config.schema_version,
        "starting VIROMEdash"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    let served = runtime.block_on(web::serve(state, config.addr));
    drop(runtime);
    drop(client);
    served?;
    Ok(())
}

fn run_catalogue(
    args: CatalogueArgs,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let bytes = fs_util::read_file(&args.file)?;
    let file_name = args.file.file_name().unwrap_or(args.file.as_str());
    let accessions = upload::parse_upload(file_name, &bytes)?;

    let client = EntrezHttpClient::new(config.ncbi)?;
    let result = CatalogueService::new(client).run(&accessions, args.molecule)?;

    if let Some(out) = &args.out {
        let csv = result.merged.to_table().to_csv()?;
        fs_util::write_atomic(out, csv.as_bytes())?;
    }

    match output_mode {
        OutputMode::Json => JsonOutput::print_catalogue(&result).into_diagnostic()?,
        OutputMode::Human => {
            TextOutput::print_catalogue(&result, args.out.as_deref()).into_diagnostic()?
        }
    }
    Ok(())
}
