use crate::config::GenerationSettings;
use crate::extractor::{extract_document_text, ExtractionOptions, PdfExtractor};
use crate::models::Conversion;
use crate::retry::generate_with_retry;
use crate::text::has_content;
use crate::traits::{ConversionStage, StageContext, TextGenerator};
use crate::BatchError;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// PDF → plain text.
pub struct PdfStage<E> {
    extractor: E,
    options: ExtractionOptions,
}

impl<E: PdfExtractor> PdfStage<E> {
    pub fn new(extractor: E, options: ExtractionOptions) -> Self {
        Self { extractor, options }
    }
}

#[async_trait]
impl<E> ConversionStage for PdfStage<E>
where
    E: PdfExtractor + Send + Sync,
{
    fn input_extension(&self) -> &str {
        "pdf"
    }

    fn output_extension(&self) -> &str {
        "txt"
    }

    async fn convert(
        &self,
        path: &Path,
        _context: &StageContext<'_>,
    ) -> Result<Conversion, BatchError> {
        extract_document_text(&self.extractor, path, self.options)
    }
}

/// Text → markdown through a [`TextGenerator`].
pub struct GenerationStage<G> {
    generator: G,
    settings: GenerationSettings,
}

impl<G: TextGenerator> GenerationStage<G> {
    pub fn new(generator: G, settings: GenerationSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}

#[async_trait]
impl<G> ConversionStage for GenerationStage<G>
where
    G: TextGenerator,
{
    fn input_extension(&self) -> &str {
        "txt"
    }

    fn output_extension(&self) -> &str {
        "md"
    }

    fn pause_between_files(&self) -> Duration {
        self.settings.delay_between_calls
    }

    async fn convert(
        &self,
        path: &Path,
        context: &StageContext<'_>,
    ) -> Result<Conversion, BatchError> {
        let content = fs::read_to_string(path)?;
        if !has_content(&content) {
            return Ok(Conversion::Empty);
        }

        let input_chars = content.chars().count();
        context.reporter.input_size(input_chars);
        debug!(
            path = %path.display(),
            input_chars,
            provider = self.generator.name(),
            "sending document"
        );

        let generated = generate_with_retry(
            &self.generator,
            &self.settings.prompt,
            &content,
            self.settings.retry,
            context.sleeper,
        )
        .await?;

        debug!(attempts = generated.attempts, "generation finished");
        Ok(Conversion::Text {
            text: generated.text,
            pages: None,
            doi: None,
        })
    }
}
