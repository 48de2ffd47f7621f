pub mod classify;
pub mod config;
pub mod error;
pub mod extraction;
pub mod model;
pub mod parsing;
pub mod pipeline;
pub mod records;
pub mod reference;
pub mod units;

use config::PipelineConfig;
use error::BunnrenskError;
use extraction::als::{parse_als_pages, SampleKeyMap};
use extraction::xlsx::{parse_wide_xlsx, SheetLayout};
use extraction::TextExtractor;
use model::{AnalysisType, InputRow};
use pipeline::{BatchInput, BatchOutput, Diagnostic, Pipeline};

/// Normalize and classify delimited input rows. Samples are derived from the
/// rows' sample ids.
pub fn process_rows(
    rows: Vec<InputRow>,
    config: PipelineConfig,
) -> Result<BatchOutput, BunnrenskError> {
    let pipeline = Pipeline::new(config)?;
    Ok(pipeline.run(&BatchInput::from_rows(rows)))
}

/// Main entry point for ALS PDF reports: extract the text, split it into
/// sample sections and run the pipeline over the result lines.
///
/// Result lines the adapter could not read are reported as unparseable-value
/// diagnostics alongside the pipeline's own.
pub fn process_als_pdf(
    pdf_bytes: &[u8],
    extractor: &dyn TextExtractor,
    keys: &SampleKeyMap,
    analysis_type: AnalysisType,
    config: PipelineConfig,
) -> Result<BatchOutput, BunnrenskError> {
    let pages = extractor.extract_pages(pdf_bytes)?;
    tracing::debug!(
        backend = extractor.backend_name(),
        pages = pages.len(),
        "extracted report text"
    );
    let report = parse_als_pages(&pages, keys, analysis_type)?;

    let pipeline = Pipeline::new(config)?;
    let input = BatchInput::from_rows(report.rows).with_samples(report.samples);
    let mut output = pipeline.run(&input);
    output.extend_diagnostics(report.skipped_lines.into_iter().map(Diagnostic::from));
    Ok(output)
}

/// Run the pipeline over a wide results workbook (one row per sample).
pub fn process_workbook(
    xlsx_bytes: &[u8],
    layout: &SheetLayout,
    config: PipelineConfig,
) -> Result<BatchOutput, BunnrenskError> {
    let sheet = parse_wide_xlsx(xlsx_bytes, layout)?;
    let pipeline = Pipeline::new(config)?;
    Ok(pipeline.run(&BatchInput::from_rows(sheet.rows).with_samples(sheet.samples)))
}
