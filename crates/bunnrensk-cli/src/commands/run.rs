use bunnrensk_core::classify::Tier;
use bunnrensk_core::config::{load_config, PipelineConfig};
use bunnrensk_core::error::BunnrenskError;
use bunnrensk_core::extraction::als::{parse_als_pages, SampleKeyMap};
use bunnrensk_core::extraction::pdftotext::PdftotextExtractor;
use bunnrensk_core::extraction::xlsx::{parse_wide_xlsx, SheetLayout};
use bunnrensk_core::extraction::TextExtractor;
use bunnrensk_core::model::{AnalysisType, Sample};
use bunnrensk_core::pipeline::{BatchInput, BatchOutput, Diagnostic, Pipeline};
use bunnrensk_core::records::{
    read_input_rows, read_reported_tiers, read_results, read_samples, write_csv_file,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::output;
use crate::InputFormat;

pub struct RunArgs {
    pub input_file: PathBuf,
    pub format: Option<InputFormat>,
    pub samples: Option<PathBuf>,
    pub tiers: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub project: Option<String>,
    pub analysis_type: String,
    pub out: Option<PathBuf>,
    pub output: String,
    pub show_all: bool,
    pub verbose: bool,
}

pub fn run(args: RunArgs) -> Result<(), BunnrenskError> {
    let mut config = load_optional_config(args.config.as_deref())?;
    if let Some(project) = args.project {
        config.project_code = Some(project);
    }

    let format = match args.format {
        Some(f) => f,
        None => detect_format(&args.input_file)?,
    };
    let analysis_type = AnalysisType::from_str_loose(&args.analysis_type).ok_or_else(|| {
        BunnrenskError::ParseError(format!("unknown analysis type '{}'", args.analysis_type))
    })?;

    let mut adapter_diagnostics = Vec::new();
    let (rows, adapter_samples) = match format {
        InputFormat::Csv => (read_input_rows(File::open(&args.input_file)?)?, None),
        InputFormat::Xlsx => {
            let bytes = std::fs::read(&args.input_file)?;
            let layout = SheetLayout {
                analysis_type: Some(analysis_type).filter(|t| *t != AnalysisType::Totalanalyse),
                ..SheetLayout::default()
            };
            let sheet = parse_wide_xlsx(&bytes, &layout)?;
            (sheet.rows, Some(sheet.samples))
        }
        InputFormat::AlsPdf => {
            let bytes = std::fs::read(&args.input_file)?;
            let extractor = PdftotextExtractor::new();
            let pages = extractor.extract_pages(&bytes)?;
            let keys = config
                .project_code
                .as_deref()
                .map(SampleKeyMap::for_project)
                .unwrap_or_default();
            let report = parse_als_pages(&pages, &keys, analysis_type)?;
            adapter_diagnostics.extend(report.skipped_lines.into_iter().map(Diagnostic::from));
            (report.rows, Some(report.samples))
        }
    };

    let samples = match args.samples.as_deref() {
        Some(path) => Some(read_samples(File::open(path)?)?),
        None => adapter_samples,
    };
    let reported_tiers = load_optional_tiers(args.tiers.as_deref())?;

    let pipeline = Pipeline::new(config)?;
    let mut input = BatchInput::from_rows(rows).with_reported_tiers(reported_tiers);
    if let Some(samples) = samples {
        input = input.with_samples(samples);
    }
    let mut result = pipeline.run(&input);
    result.extend_diagnostics(adapter_diagnostics);

    finish(&result, args.out.as_deref(), &args.output, args.show_all, args.verbose)
}

pub fn classify(
    results_file: PathBuf,
    samples: Option<PathBuf>,
    tiers: Option<PathBuf>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    output_format: &str,
    verbose: bool,
) -> Result<(), BunnrenskError> {
    let config = load_optional_config(config.as_deref())?;
    let results = read_results(File::open(&results_file)?)?;
    let samples: Option<Vec<Sample>> = match samples.as_deref() {
        Some(path) => Some(read_samples(File::open(path)?)?),
        None => None,
    };
    let reported_tiers = load_optional_tiers(tiers.as_deref())?;

    let pipeline = Pipeline::new(config)?;
    let result = pipeline.reclassify(samples, results, &reported_tiers);

    finish(&result, out.as_deref(), output_format, false, verbose)
}

fn finish(
    result: &BatchOutput,
    out: Option<&Path>,
    output_format: &str,
    show_all: bool,
    verbose: bool,
) -> Result<(), BunnrenskError> {
    if let Some(dir) = out {
        write_tables(dir, result)?;
    }
    match output_format {
        "json" => output::json::print(result)?,
        _ => output::table::print(result, show_all, verbose),
    }
    Ok(())
}

fn load_optional_config(path: Option<&Path>) -> Result<PipelineConfig, BunnrenskError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_optional_tiers(path: Option<&Path>) -> Result<BTreeMap<String, Tier>, BunnrenskError> {
    match path {
        Some(path) => read_reported_tiers(File::open(path)?),
        None => Ok(BTreeMap::new()),
    }
}

fn detect_format(path: &Path) -> Result<InputFormat, BunnrenskError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => Ok(InputFormat::Csv),
        "xlsx" | "xlsm" => Ok(InputFormat::Xlsx),
        "pdf" => Ok(InputFormat::AlsPdf),
        _ => Err(BunnrenskError::ParseError(format!(
            "cannot tell the input format of {}; pass --format",
            path.display()
        ))),
    }
}

fn write_tables(dir: &Path, result: &BatchOutput) -> Result<(), BunnrenskError> {
    std::fs::create_dir_all(dir)?;
    write_csv_file(&dir.join("samples.csv"), &result.samples)?;
    write_csv_file(&dir.join("results.csv"), &result.results)?;
    write_csv_file(&dir.join("classifications.csv"), &result.classification_rows())?;
    write_csv_file(&dir.join("decisions.csv"), &result.decisions)?;
    tracing::info!(
        dir = %dir.display(),
        samples = result.samples.len(),
        results = result.results.len(),
        "wrote output tables"
    );
    Ok(())
}
