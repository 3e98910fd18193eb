//! Page template importer and overlay compositor
//!
//! Each source page is imported as a Form XObject, stamped as the backdrop
//! of a fresh output page of the same size and rotation, and then drawn on.
//! Pages move through a fixed sequence of stages:
//!
//! ```text
//! Imported -> BackgroundStamped -> FieldsDrawn -> Finalized
//! ```
//!
//! Drawing is only possible on a [`PageCanvas`], which only exists once the
//! backdrop is stamped, so text always lies above the background.

use crate::coords::{mm_to_points, points_to_mm, US_LETTER_HEIGHT_PT, US_LETTER_WIDTH_PT};
use crate::font::{encode_win_ansi, FontSpec, FontStyle};
use crate::image::{generate_image_operators, RasterImage};
use crate::text::{cell_text_origin, generate_text_operators, hex_operand};
use crate::{PdfError, Result, TextAlign};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Inheritance chains deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 32;

const LETTER_MEDIA_BOX: [f64; 4] = [0.0, 0.0, US_LETTER_WIDTH_PT, US_LETTER_HEIGHT_PT];

/// Lifecycle stage of an output page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageStage {
    Imported,
    BackgroundStamped,
    FieldsDrawn,
    Finalized,
}

/// What to put underneath a page's overlay
#[derive(Debug, Clone)]
pub enum Backdrop {
    /// The imported source page itself
    SourcePage,
    /// A rasterized snapshot stretched over the full page
    Raster(RasterImage),
}

/// Text placed on a page, recorded for inspection
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub page: usize,
    pub text: String,
    /// Cell origin in mm, top-left
    pub x: f64,
    pub y: f64,
    pub font: FontSpec,
}

/// Geometry of one source page
#[derive(Debug, Clone)]
struct SourcePage {
    id: Option<ObjectId>,
    media_box: [f64; 4],
    rotate: Option<i64>,
}

/// A source page captured as a reusable Form XObject
#[derive(Debug)]
pub struct ImportedPage {
    page: usize,
    media_box: [f64; 4],
    form_id: Option<ObjectId>,
}

impl ImportedPage {
    pub fn page_number(&self) -> usize {
        self.page
    }
}

/// Drawing surface for one output page
#[derive(Debug)]
pub struct PageCanvas {
    page: usize,
    media_box: [f64; 4],
    stage: PageStage,
    font: FontSpec,
    ops: Vec<u8>,
    xobjects: Vec<(String, ObjectId)>,
    fonts: Vec<FontStyle>,
    runs: Vec<TextRun>,
}

impl PageCanvas {
    pub fn page_number(&self) -> usize {
        self.page
    }

    pub fn stage(&self) -> PageStage {
        self.stage
    }

    /// Page width and height in mm
    pub fn page_size_mm(&self) -> (f64, f64) {
        media_box_size_mm(&self.media_box)
    }

    pub fn set_font(&mut self, font: FontSpec) {
        self.font = font;
    }

    pub fn font(&self) -> FontSpec {
        self.font
    }

    /// Draw `text` inside the cell at `(x, y)` sized `width` x `height` (mm)
    ///
    /// A non-positive height falls back to the default 5mm cell. Empty text
    /// draws nothing.
    pub fn cell(&mut self, x: f64, y: f64, width: f64, height: f64, text: &str, align: TextAlign) {
        if text.is_empty() {
            return;
        }

        let text_width = points_to_mm(self.font.text_width_points(text));
        let (text_x, baseline) =
            cell_text_origin(x, y, width, height, text_width, self.font.size, align);

        let mb = &self.media_box;
        let pdf_x = mb[0].min(mb[2]) + mm_to_points(text_x);
        let pdf_y = mb[1].max(mb[3]) - mm_to_points(baseline);
        let style = self.font.style;

        let hex = hex_operand(&encode_win_ansi(text));
        let ops =
            generate_text_operators(&hex, pdf_x, pdf_y, style.resource_name(), self.font.size);
        self.ops.extend_from_slice(&ops);

        if !self.fonts.contains(&style) {
            self.fonts.push(style);
        }
        self.runs.push(TextRun {
            page: self.page,
            text: text.to_string(),
            x,
            y,
            font: self.font,
        });
        self.stage = PageStage::FieldsDrawn;
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.runs
    }
}

/// A document being composed from a source document's pages
pub struct OverlayDocument {
    inner: Document,
    source_pages: Vec<SourcePage>,
    stages: BTreeMap<usize, PageStage>,
    output_pages: Vec<ObjectId>,
    font_ids: HashMap<FontStyle, ObjectId>,
    runs: BTreeMap<usize, Vec<TextRun>>,
    next_image: u32,
}

impl OverlayDocument {
    /// Open a source document from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Self::from_document(inner)
    }

    /// Open a source document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Self::from_document(inner)
    }

    /// A source-less document of `page_count` US Letter pages
    ///
    /// Used when the source cannot be parsed but raster backdrops exist.
    pub fn blank(page_count: usize) -> Self {
        let source_pages = (0..page_count)
            .map(|_| SourcePage {
                id: None,
                media_box: LETTER_MEDIA_BOX,
                rotate: None,
            })
            .collect();
        Self::with_pages(Document::with_version("1.5"), source_pages)
    }

    fn from_document(inner: Document) -> Result<Self> {
        if inner.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfError::Encrypted);
        }

        let mut source_pages = Vec::new();
        for page_id in inner.get_pages().into_values() {
            let media_box = inherited_media_box(&inner, page_id).unwrap_or(LETTER_MEDIA_BOX);
            let rotate = match inherited_attr(&inner, page_id, b"Rotate") {
                Some(Object::Integer(r)) => Some(*r),
                _ => None,
            };
            source_pages.push(SourcePage {
                id: Some(page_id),
                media_box,
                rotate,
            });
        }
        if source_pages.is_empty() {
            return Err(PdfError::ParseError("Document has no pages".to_string()));
        }

        Ok(Self::with_pages(inner, source_pages))
    }

    fn with_pages(inner: Document, source_pages: Vec<SourcePage>) -> Self {
        Self {
            inner,
            source_pages,
            stages: BTreeMap::new(),
            output_pages: Vec::new(),
            font_ids: HashMap::new(),
            runs: BTreeMap::new(),
            next_image: 1,
        }
    }

    /// Number of pages in the source
    pub fn page_count(&self) -> usize {
        self.source_pages.len()
    }

    /// Width and height of a source page in mm
    pub fn page_size_mm(&self, page: usize) -> Result<(f64, f64)> {
        Ok(media_box_size_mm(&self.source_page(page)?.media_box))
    }

    pub fn page_stage(&self, page: usize) -> Option<PageStage> {
        self.stages.get(&page).copied()
    }

    /// Text drawn on a finalized page
    pub fn text_runs(&self, page: usize) -> &[TextRun] {
        self.runs.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    fn source_page(&self, page: usize) -> Result<&SourcePage> {
        if page == 0 || page > self.source_pages.len() {
            return Err(PdfError::InvalidPage(page, self.source_pages.len()));
        }
        Ok(&self.source_pages[page - 1])
    }

    fn require_stage(
        &self,
        page: usize,
        allowed: &[PageStage],
        operation: &'static str,
    ) -> Result<()> {
        match self.stages.get(&page) {
            Some(stage) if allowed.contains(stage) => Ok(()),
            Some(stage) => Err(PdfError::StageViolation {
                page,
                stage: *stage,
                operation,
            }),
            None => Err(PdfError::ParseError(format!(
                "Page {page} must be imported before {operation}"
            ))),
        }
    }

    /// Capture source page `page` (1-indexed) as a Form XObject
    pub fn import_page(&mut self, page: usize) -> Result<ImportedPage> {
        let source = self.source_page(page)?.clone();
        if let Some(stage) = self.stages.get(&page) {
            return Err(PdfError::StageViolation {
                page,
                stage: *stage,
                operation: "import",
            });
        }

        let form_id = match source.id {
            Some(page_id) => {
                let content = page_content(&self.inner, page_id);
                let mut dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => source.media_box.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
                };
                if let Some(resources) = inherited_attr(&self.inner, page_id, b"Resources") {
                    dict.set("Resources", resources.clone());
                }
                let mut stream = Stream::new(dict, content);
                stream.compress()?;
                Some(self.inner.add_object(stream))
            }
            None => None,
        };

        self.stages.insert(page, PageStage::Imported);
        debug!(page, "Imported page");

        Ok(ImportedPage {
            page,
            media_box: source.media_box,
            form_id,
        })
    }

    /// Put the backdrop under an imported page and open it for drawing
    pub fn stamp(&mut self, imported: ImportedPage, backdrop: Backdrop) -> Result<PageCanvas> {
        let page = imported.page;
        self.require_stage(page, &[PageStage::Imported], "stamp")?;

        let mb = imported.media_box;
        let mut ops = Vec::new();
        let mut xobjects = Vec::new();

        match backdrop {
            Backdrop::SourcePage => {
                if let Some(form_id) = imported.form_id {
                    let name = format!("Tpl{page}");
                    ops.extend_from_slice(format!("q\n/{name} Do\nQ\n").as_bytes());
                    xobjects.push((name, form_id));
                }
            }
            Backdrop::Raster(image) => {
                let name = format!("Bg{}", self.next_image);
                self.next_image += 1;
                let image_id = self.inner.add_object(image.to_pdf_stream());
                ops.extend_from_slice(&generate_image_operators(
                    &name,
                    mb[0],
                    mb[1],
                    mb[2] - mb[0],
                    mb[3] - mb[1],
                ));
                xobjects.push((name, image_id));
            }
        }

        self.stages.insert(page, PageStage::BackgroundStamped);
        debug!(page, "Stamped backdrop");

        Ok(PageCanvas {
            page,
            media_box: mb,
            stage: PageStage::BackgroundStamped,
            font: FontSpec::default(),
            ops,
            xobjects,
            fonts: Vec::new(),
            runs: Vec::new(),
        })
    }

    /// Close a canvas into a finished output page
    pub fn finish_page(&mut self, canvas: PageCanvas) -> Result<()> {
        let page = canvas.page;
        self.require_stage(
            page,
            &[PageStage::BackgroundStamped, PageStage::FieldsDrawn],
            "finish",
        )?;
        let rotate = self.source_page(page)?.rotate;

        let mut xobject_dict = Dictionary::new();
        for (name, id) in &canvas.xobjects {
            xobject_dict.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        let mut font_dict = Dictionary::new();
        for style in &canvas.fonts {
            let font_id = self.font_object(*style);
            font_dict.set(style.resource_name(), Object::Reference(font_id));
        }

        let contents_id = self.inner.add_object(Stream::new(Dictionary::new(), canvas.ops));
        let mb = canvas.media_box;
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "MediaBox" => mb.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
            "Resources" => dictionary! {
                "XObject" => xobject_dict,
                "Font" => font_dict,
            },
            "Contents" => contents_id,
        };
        if let Some(rotate) = rotate {
            page_dict.set("Rotate", rotate);
        }

        let page_id = self.inner.add_object(page_dict);
        self.output_pages.push(page_id);
        self.runs.insert(page, canvas.runs);
        self.stages.insert(page, PageStage::Finalized);
        debug!(page, "Finalized page");

        Ok(())
    }

    fn font_object(&mut self, style: FontStyle) -> ObjectId {
        if let Some(id) = self.font_ids.get(&style) {
            return *id;
        }
        let id = self.inner.add_object(style.font_dictionary());
        self.font_ids.insert(style, id);
        id
    }

    /// Replace the source page tree with the finished output pages
    ///
    /// The source catalog (and with it any AcroForm and widget annotations)
    /// becomes unreachable and is pruned.
    fn assemble(&mut self) -> Result<()> {
        if let Some((page, stage)) = self
            .stages
            .iter()
            .find(|(_, stage)| **stage != PageStage::Finalized)
        {
            return Err(PdfError::StageViolation {
                page: *page,
                stage: *stage,
                operation: "save",
            });
        }
        if self.output_pages.is_empty() {
            return Err(PdfError::SaveError("No finished pages".to_string()));
        }

        let pages_id = self.inner.new_object_id();
        for page_id in &self.output_pages {
            if let Ok(Object::Dictionary(dict)) = self.inner.get_object_mut(*page_id) {
                dict.set("Parent", pages_id);
            }
        }
        let kids: Vec<Object> = self.output_pages.iter().map(|id| Object::Reference(*id)).collect();
        self.inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.output_pages.len() as i64,
            }),
        );

        let catalog_id = self.inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.inner.trailer.set("Root", catalog_id);
        self.inner.prune_objects();
        self.inner.compress();

        Ok(())
    }

    /// Save the composed document to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.assemble()?;
        self.inner
            .save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Save the composed document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.assemble()?;
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(buffer)
    }
}

/// Count the pages of a document on disk
///
/// Uses the page tree when the file parses, else the largest `/Count N` in
/// the raw bytes, else 1.
pub fn probe_page_count<P: AsRef<Path>>(path: P) -> Result<usize> {
    let data = std::fs::read(path)?;

    if let Ok(doc) = Document::load_mem(&data) {
        let count = doc.get_pages().len();
        if count > 0 {
            return Ok(count);
        }
    }

    Ok(scan_page_count(&data).unwrap_or(1))
}

fn scan_page_count(data: &[u8]) -> Option<usize> {
    const KEY: &[u8] = b"/Count";
    let mut best: Option<usize> = None;
    let mut i = 0;

    while i + KEY.len() <= data.len() {
        if &data[i..i + KEY.len()] != KEY {
            i += 1;
            continue;
        }
        let mut j = i + KEY.len();
        while j < data.len() && data[j].is_ascii_whitespace() {
            j += 1;
        }
        let start = j;
        while j < data.len() && data[j].is_ascii_digit() {
            j += 1;
        }
        if let Some(n) = std::str::from_utf8(&data[start..j])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            best = Some(best.map_or(n, |b| b.max(n)));
        }
        i = j.max(i + 1);
    }

    best.filter(|n| *n > 0)
}

fn media_box_size_mm(mb: &[f64; 4]) -> (f64, f64) {
    (
        points_to_mm((mb[2] - mb[0]).abs()),
        points_to_mm((mb[3] - mb[1]).abs()),
    )
}

/// Follow references until a direct object is reached
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Read a numeric object, following references
pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj)? {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Look up a page attribute, following the inheritable Parent chain
pub(crate) fn inherited_attr<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current_id = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current_id).ok()?.as_dict().ok()?;

        if let Some(value) = dict.get(key).ok().and_then(|o| resolve(doc, o)) {
            return Some(value);
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current_id = *parent_id,
            _ => return None,
        }
    }

    None
}

/// MediaBox of a page (CropBox when no MediaBox is present anywhere)
pub(crate) fn inherited_media_box(doc: &Document, page_id: ObjectId) -> Option<[f64; 4]> {
    let array = match inherited_attr(doc, page_id, b"MediaBox")
        .or_else(|| inherited_attr(doc, page_id, b"CropBox"))?
    {
        Object::Array(items) => items,
        _ => return None,
    };
    if array.len() < 4 {
        return None;
    }

    let mut mb = [0.0; 4];
    for (slot, item) in mb.iter_mut().zip(array.iter()) {
        *slot = number(doc, item)?;
    }
    Some(mb)
}

/// Decompressed page content, concatenating content arrays
fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let Some(page_dict) = doc.get_object(page_id).ok().and_then(|o| o.as_dict().ok()) else {
        return Vec::new();
    };

    let stream_bytes = |obj: &Object| -> Vec<u8> {
        match resolve(doc, obj) {
            Some(Object::Stream(stream)) => stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
            _ => Vec::new(),
        }
    };

    match page_dict.get(b"Contents").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Array(parts)) => {
            let mut combined = Vec::new();
            for part in parts {
                combined.extend_from_slice(&stream_bytes(part));
                combined.push(b'\n');
            }
            combined
        }
        Some(contents) => stream_bytes(contents),
        None => Vec::new(),
    }
}
