// One-shot extraction of a single RFP document.
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use rfp_extraction::config::AppConfig;
use rfp_extraction::db::sqlite::open_database;
use rfp_extraction::pipeline::extraction::{DocumentFormat, SqliteExtractionStore};
use rfp_extraction::storage::LocalFileSource;
use rfp_extraction::{DocumentDescriptor, ExtractionRecord, ExtractionService, TenantId};
use uuid::Uuid;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Extract text, tables and key-value pairs from one PDF, DOCX or XLSX file
/// and print the extraction record as JSON.
#[derive(Parser, Debug)]
#[command(name = "rfp-extract", version)]
struct Args {
    /// Document to extract. With --from-storage, a locator under the storage root.
    path: String,
    /// Declared content type. Inferred from the extension when omitted.
    content_type: Option<String>,
    /// Persist the record into the configured database.
    #[arg(long)]
    store: bool,
    /// Tenant the stored record belongs to.
    #[arg(long, default_value = "local")]
    tenant: String,
    /// Resolve PATH under RFP_EXTRACT_STORAGE_ROOT instead of the working directory.
    #[arg(long)]
    from_storage: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = AppConfig::from_env();
    rfp_extraction::init_tracing(&config);

    let (source, locator) = match locate(&args, &config) {
        Ok(located) => located,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(1);
        }
    };
    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| infer_content_type(&locator));

    tracing::info!(
        root = %source.root().display(),
        locator = %locator,
        content_type = %content_type,
        "Extracting document"
    );

    let service = ExtractionService::new(Box::new(source));
    let document = DocumentDescriptor::new(Uuid::new_v4(), content_type, locator);

    let record = if args.store {
        match extract_and_store(&service, &config, &args.tenant, &document) {
            Ok(record) => record,
            Err(message) => {
                eprintln!("{message}");
                return ExitCode::from(1);
            }
        }
    } else {
        service.extract(&document)
    };

    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to render record: {e}");
            return ExitCode::from(1);
        }
    }

    if record.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

/// The byte source and locator for `args.path`: the configured storage root,
/// or the file's own directory.
fn locate(args: &Args, config: &AppConfig) -> Result<(LocalFileSource, String), String> {
    if args.from_storage {
        return Ok((
            LocalFileSource::new(config.storage_root.clone()),
            args.path.clone(),
        ));
    }

    let path = Path::new(&args.path);
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let locator = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Not a file path: {}", args.path))?;
    Ok((LocalFileSource::new(root), locator.to_string()))
}

fn infer_content_type(locator: &str) -> String {
    Path::new(locator)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension)
        .map(|f| f.mime().to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

fn extract_and_store(
    service: &ExtractionService,
    config: &AppConfig,
    tenant: &str,
    document: &DocumentDescriptor,
) -> Result<ExtractionRecord, String> {
    let tenant = TenantId::new(tenant).map_err(|e| e.to_string())?;
    if let Some(dir) = config.database_path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Cannot create {}: {e}", dir.display()))?;
    }
    let conn = open_database(&config.database_path).map_err(|e| e.to_string())?;

    tracing::info!(
        database = %config.database_path.display(),
        tenant = %tenant,
        "Persisting extraction record"
    );
    service
        .extract_and_store(&conn, &SqliteExtractionStore::new(), &tenant, document)
        .map_err(|e| e.to_string())
}
