// src/main.rs
mod extractors;
mod llm;
mod pdf;
mod pipeline;
mod report;
mod storage;
mod utils;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use llm::OpenAiClient;
use pipeline::ExtractionPipeline;
use storage::{timestamp_now, ExportMetadata, StorageManager};
use utils::config::Settings;
use utils::error::StorageError;
use utils::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The record as pretty-printed JSON
    Json,
    /// One labelled line per field and scenario
    Summary,
}

/// Command Line Interface for Key Information Document extraction
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the PDF to extract from
    #[arg(short, long)]
    file: String,

    /// Directory to export the record and its metadata to (optional)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// How to print the record on stdout
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model identifier (overrides KID_MODEL, default gpt-4)
    #[arg(long)]
    model: Option<String>,

    /// Language extracted content is translated to (overrides KID_TARGET_LANGUAGE)
    #[arg(long)]
    language: Option<String>,

    /// Base URL of the completion API (overrides OPENAI_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds; no timeout when omitted
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Emit exactly the schema fields (missing ones as null) instead of the model's keys
    #[arg(long)]
    normalized: bool,

    /// Debug mode - save the extracted text and tables next to the export
    #[arg(short, long)]
    debug: bool,
}

/// Accepts only files with a `.pdf` extension (any case).
fn validate_pdf_path(path: &Path) -> Result<(), AppError> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(AppError::Config(format!("{} is not a .pdf file", path.display())));
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let path = Path::new(&args.file);
    validate_pdf_path(path)?;

    // 3. Resolve configuration (environment, .env, then CLI overrides)
    let settings = Settings::from_env()?.with_overrides(
        args.model.clone(),
        args.language.clone(),
        args.base_url.clone(),
        args.timeout_secs,
    );
    tracing::debug!(model = %settings.model, language = %settings.target_language, "Resolved settings");

    // 4. Build the pipeline around an injected completion client
    let client = OpenAiClient::new(&settings)?;
    let pipeline = ExtractionPipeline::new(Arc::new(client), &settings.model, &settings.target_language);

    // 5. Read the PDF
    let pdf_bytes = std::fs::read(path)?;
    tracing::info!("Read {} ({} bytes)", path.display(), pdf_bytes.len());

    let stem = file_stem(path);
    let storage = match (&args.output_dir, args.debug) {
        (Some(dir), _) => Some(StorageManager::new(dir)?),
        (None, true) => Some(StorageManager::new("./output")?),
        (None, false) => None,
    };

    // 6. Extract fields and scenarios. The read document is only kept when it is exported or dumped.
    let (result, document) = match &storage {
        Some(storage) => {
            let document = pipeline.read(&pdf_bytes)?;
            if args.debug {
                if let Err(e) = storage.save_debug(&stem, &document) {
                    tracing::warn!("Failed to save debug dump: {}", e);
                }
            }
            (pipeline.extract_from(&document).await?, Some(document))
        }
        None => (pipeline.extract_details(&pdf_bytes).await?, None),
    };

    // 7. Present the record
    let record = if args.normalized {
        result.normalized(pipeline.schema())
    } else {
        result.to_value()
    };
    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Summary => print!("{}", report::render_summary(&result, pipeline.schema())),
    }

    // 8. Export if asked to
    if let (Some(storage), Some(_), Some(document)) = (&storage, &args.output_dir, &document) {
        storage.save_result(&stem, &record)?;
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.file.clone());
        let metadata = ExportMetadata {
            source_file: &source_file,
            model: &settings.model,
            target_language: &settings.target_language,
            page_count: document.page_count,
            table_count: document.tables.len(),
            field_outcome: &result.field_outcome,
            scenario_outcome: &result.scenario_outcome,
            extraction_timestamp: timestamp_now(),
        };
        storage.save_metadata(&stem, &metadata)?;
    }

    tracing::info!("Processing finished. Degraded: {}", result.is_degraded());
    Ok(())
}
