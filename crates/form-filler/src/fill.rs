//! End-to-end fill service

use crate::catalog::{FieldValues, TemplateDescriptor};
use crate::config::{BackgroundMode, FillerConfig};
use crate::fillers::FillerRegistry;
use crate::output::OutputWriter;
use crate::position::PositionSet;
use crate::resolver::{PositionResolver, PositionSource};
use crate::store::PositionStore;
use crate::{FillError, Result};
use form_tools::{
    BackgroundRasterizer, CancellationToken, ExternalTool, FieldNameDump, PageBackground,
    SystemToolLocator, ToolLocator,
};
use pdf_core::{Backdrop, OverlayDocument, RasterImage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One fill request
#[derive(Debug, Clone)]
pub struct FillRequest<'a> {
    pub template: &'a TemplateDescriptor,
    pub values: FieldValues,
    pub source: PathBuf,
    /// Positions that sit on top of the stored overrides
    pub overrides: Option<PositionSet>,
    pub cancel: Option<CancellationToken>,
}

impl<'a> FillRequest<'a> {
    pub fn new(
        template: &'a TemplateDescriptor,
        values: FieldValues,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            template,
            values,
            source: source.into(),
            overrides: None,
            cancel: None,
        }
    }

    pub fn with_overrides(mut self, overrides: PositionSet) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A written, verified output document
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub path: PathBuf,
    pub byte_size: u64,
    pub page_count: usize,
    pub position_source: PositionSource,
    /// Pages drawn over a raster background
    pub raster_pages: usize,
}

/// Fills templates: resolves positions, composes pages, writes the result
pub struct FormFiller<L = SystemToolLocator> {
    config: FillerConfig,
    resolver: PositionResolver<L>,
    rasterizer: BackgroundRasterizer<L>,
    registry: FillerRegistry,
    writer: OutputWriter,
}

impl FormFiller<SystemToolLocator> {
    /// Filler that discovers external tools on this system
    pub fn new(config: FillerConfig) -> Result<Self> {
        let locator = config.tool_locator();
        Self::with_locator(config, locator)
    }
}

impl<L: ToolLocator + Clone> FormFiller<L> {
    pub fn with_locator(config: FillerConfig, locator: L) -> Result<Self> {
        Self::with_registry(config, locator, FillerRegistry::standard()?)
    }

    pub fn with_registry(
        config: FillerConfig,
        locator: L,
        registry: FillerRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let resolver = PositionResolver::new(
            PositionStore::new(&config.positions_dir),
            FieldNameDump::new(locator.clone(), config.tool_timeout()),
            config.override_mode,
        );
        let rasterizer =
            BackgroundRasterizer::new(locator, &config.background_dir, config.raster_options());
        let writer = OutputWriter::new(&config.output_dir);

        Ok(Self {
            config,
            resolver,
            rasterizer,
            registry,
            writer,
        })
    }
}

impl<L: ToolLocator> FormFiller<L> {
    pub fn config(&self) -> &FillerConfig {
        &self.config
    }

    pub fn registry(&self) -> &FillerRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &PositionResolver<L> {
        &self.resolver
    }

    /// Fill one request start to finish
    pub fn fill(&self, request: FillRequest<'_>) -> Result<RenderedOutput> {
        let start = Instant::now();
        let template = request.template;
        let source = request.source.as_path();
        info!(template = %template.id, source = %source.display(), "Fill started");

        if !source.is_file() {
            return Err(FillError::SourceNotFound(source.to_path_buf()));
        }

        let source_doc = match OverlayDocument::open(source) {
            Ok(doc) => Some(doc),
            Err(e) => {
                let err = FillError::ParseFailure(e.to_string());
                warn!(error = %err, "Source cannot be imported as a template");
                None
            }
        };
        let page_count = match &source_doc {
            Some(doc) => doc.page_count(),
            None => pdf_core::probe_page_count(source).unwrap_or(1),
        };

        let registry = self.registry.for_template(template, &request.values)?;
        let resolved = self
            .resolver
            .resolve(template, source, request.overrides.as_ref())?;
        report_undrawable(
            &registry,
            template,
            &request.values,
            &resolved.positions,
            page_count,
        );

        let wants_raster = match self.config.background_mode {
            BackgroundMode::Never => false,
            BackgroundMode::Always => true,
            BackgroundMode::Auto => source_doc.is_none(),
        };
        let backgrounds = if wants_raster {
            self.backgrounds(template, source, page_count, request.cancel.as_ref())?
        } else {
            BTreeMap::new()
        };

        let mut doc = match source_doc {
            Some(doc) => doc,
            None if !backgrounds.is_empty() => OverlayDocument::blank(page_count),
            None => {
                return Err(FillError::SourceUnusable(format!(
                    "{} cannot be imported and no page backgrounds are available",
                    source.display()
                )))
            }
        };

        let mut raster_pages = 0;
        for page in 1..=doc.page_count() {
            let backdrop = match backgrounds.get(&page).map(|b| RasterImage::from_path(&b.path)) {
                Some(Ok(image)) => {
                    raster_pages += 1;
                    Backdrop::Raster(image)
                }
                Some(Err(e)) => {
                    warn!(page, error = %e, "Unreadable page background, using source page");
                    Backdrop::SourcePage
                }
                None => Backdrop::SourcePage,
            };

            let imported = doc.import_page(page)?;
            let mut canvas = doc.stamp(imported, backdrop)?;
            let drawn = registry.draw_page(
                &mut canvas,
                &request.values,
                &resolved.positions,
                self.config.default_font_size,
            );
            doc.finish_page(canvas)?;
            debug!(page, fields = drawn, "Page composed");
        }

        let (path, byte_size) = self.writer.write(&mut doc, &template.id)?;
        let output = RenderedOutput {
            path,
            byte_size,
            page_count: doc.page_count(),
            position_source: resolved.source,
            raster_pages,
        };

        info!(
            template = %template.id,
            path = %output.path.display(),
            bytes = output.byte_size,
            pages = output.page_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fill finished"
        );
        Ok(output)
    }

    /// Cached backgrounds when complete, otherwise a fresh render, keyed by page
    fn backgrounds(
        &self,
        template: &TemplateDescriptor,
        source: &Path,
        page_count: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<BTreeMap<usize, PageBackground>> {
        let backgrounds = if self.rasterizer.has_all_backgrounds(&template.id, page_count) {
            debug!(template = %template.id, "Using cached page backgrounds");
            self.rasterizer.cached(&template.id, page_count)
        } else if !self.rasterizer.is_available() {
            let err = FillError::ToolNotFound(ExternalTool::Rasterizer);
            warn!(template = %template.id, "{err}, drawing over source pages");
            Vec::new()
        } else {
            self.rasterizer.render_all(source, &template.id, cancel)?
        };
        Ok(backgrounds.into_iter().map(|b| (b.page, b)).collect())
    }
}

/// Log fields that have a value but will not be drawn
fn report_undrawable(
    registry: &FillerRegistry,
    template: &TemplateDescriptor,
    values: &FieldValues,
    positions: &PositionSet,
    page_count: usize,
) {
    for key in registry.missing_positions(values, positions) {
        let err = FillError::PositionMissing(key.to_string());
        warn!(template = %template.id, field = key, "{err}, leaving it blank");
    }
    for position in positions.iter().filter(|p| p.page == 0 || p.page > page_count) {
        if values.contains_key(&position.field_key) {
            warn!(
                template = %template.id,
                field = %position.field_key,
                page = position.page,
                page_count,
                "Position is on a page the source does not have"
            );
        }
    }
}
