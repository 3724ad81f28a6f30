//! PDF output through `lopdf`.
//!
//! Text uses the two standard Type1 faces with WinAnsi encoding, so no font
//! program is embedded. Images are decoded, flattened onto white and stored
//! as Flate-compressed RGB XObjects.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::layout::font_metrics::{FontFace, PageConfig, TextMeasurer};
use crate::layout::markup::{StyledRun, SCRIPT_RISE, SCRIPT_SCALE};
use crate::render::{RenderError, Renderer};

const PRODUCER: &str = concat!("cheatsheet-api ", env!("CARGO_PKG_VERSION"));

/// Operations and image resources of the page being drawn.
#[derive(Default)]
struct PageBuffer {
    operations: Vec<Operation>,
    images: Dictionary,
}

pub struct PdfRenderer<'m> {
    doc: Document,
    pages_id: ObjectId,
    regular_font: ObjectId,
    bold_font: ObjectId,
    page: PageConfig,
    measurer: &'m dyn TextMeasurer,
    page_ids: Vec<ObjectId>,
    current: Option<PageBuffer>,
    image_count: usize,
}

impl<'m> PdfRenderer<'m> {
    /// `measurer` positions the pieces of combined script runs and must be
    /// the one the layout was computed with.
    pub fn new(page: PageConfig, measurer: &'m dyn TextMeasurer) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_font = doc.add_object(font_dictionary(FontFace::Helvetica));
        let bold_font = doc.add_object(font_dictionary(FontFace::HelveticaBold));
        Self {
            doc,
            pages_id,
            regular_font,
            bold_font,
            page,
            measurer,
            page_ids: Vec::new(),
            current: None,
            image_count: 0,
        }
    }

    fn buffer(&mut self) -> Result<&mut PageBuffer, RenderError> {
        self.current.as_mut().ok_or(RenderError::NoPage)
    }

    /// Converts a top-origin y to PDF user space.
    fn flip(&self, y: f32) -> f32 {
        self.page.height_pt - y
    }

    fn show_text(&mut self, text: &str, face: FontFace, size: f32, x: f32, y: f32) -> Result<(), RenderError> {
        if text.is_empty() {
            return Ok(());
        }
        let baseline = self.flip(y);
        let ops = &mut self.buffer()?.operations;
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font_resource(face).into(), size.into()]));
        ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
        Ok(())
    }

    fn flush_page(&mut self) -> Result<(), RenderError> {
        let Some(buffer) = self.current.take() else {
            return Ok(());
        };
        let encoded = Content {
            operations: buffer.operations,
        }
        .encode()
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    font_resource(FontFace::Helvetica) => self.regular_font,
                    font_resource(FontFace::HelveticaBold) => self.bold_font,
                },
                "XObject" => buffer.images,
            },
            "MediaBox" => vec![
                0.into(),
                0.into(),
                self.page.width_pt.into(),
                self.page.height_pt.into(),
            ],
        });
        self.page_ids.push(page_id);
        Ok(())
    }
}

impl Renderer for PdfRenderer<'_> {
    fn new_page(&mut self) -> Result<(), RenderError> {
        self.flush_page()?;
        self.current = Some(PageBuffer::default());
        Ok(())
    }

    fn draw_styled_run(
        &mut self,
        run: &StyledRun,
        x: f32,
        y: f32,
        face: FontFace,
        size: f32,
    ) -> Result<(), RenderError> {
        let script_size = size * SCRIPT_SCALE;
        let rise = size * SCRIPT_RISE;
        match run {
            StyledRun::Normal(text) => self.show_text(text, face, size, x, y),
            StyledRun::Superscript(text) => self.show_text(text, face, script_size, x, y - rise),
            StyledRun::Subscript(text) => self.show_text(text, face, script_size, x, y + rise),
            StyledRun::Combined {
                base,
                subscript,
                superscript,
            } => {
                self.show_text(base, face, size, x, y)?;
                let sub_x = x + self.measurer.width_of(base, face, size);
                self.show_text(subscript, face, script_size, sub_x, y + rise)?;
                let sup_x = sub_x + self.measurer.width_of(subscript, face, script_size);
                self.show_text(superscript, face, script_size, sup_x, y - rise)
            }
        }
    }

    fn draw_image(
        &mut self,
        index: usize,
        data: &[u8],
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), RenderError> {
        let (pixels, pixel_width, pixel_height) = decode_rgb(data)
            .map_err(|reason| RenderError::Image { index, reason })?;

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(pixel_width),
                "Height" => i64::from(pixel_height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            pixels,
        ));

        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let bottom = self.flip(y + height);
        let buffer = self.buffer()?;
        buffer.images.set(name.clone(), image_id);
        buffer.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    bottom.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, RenderError> {
        self.flush_page()?;

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);
        self.doc.compress();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        Ok(out)
    }
}

fn font_resource(face: FontFace) -> &'static str {
    match face {
        FontFace::Helvetica => "F1",
        FontFace::HelveticaBold => "F2",
    }
}

fn font_dictionary(face: FontFace) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => face.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Decodes any supported image to 8-bit RGB, compositing alpha onto white.
fn decode_rgb(data: &[u8]) -> Result<(Vec<u8>, u32, u32), String> {
    let rgba = image::load_from_memory(data)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }
    Ok((rgb, width, height))
}

/// Maps text to WinAnsi bytes. Characters outside the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            '‰' => 0x89,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font_metrics::{default_page_config, PaperSize, StandardMetrics};
    use crate::models::topic::tests::make_png;

    fn renderer() -> PdfRenderer<'static> {
        PdfRenderer::new(default_page_config(PaperSize::A4), &StandardMetrics)
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(encode_win_ansi("a+b"), b"a+b".to_vec());
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode_win_ansi("x → y"), b"x ? y".to_vec());
        assert_eq!(encode_win_ansi("•"), vec![0x95]);
    }

    #[test]
    fn test_draw_before_page_is_an_error() {
        let mut pdf = renderer();
        let run = StyledRun::Normal("orphan".to_string());
        let err = pdf
            .draw_styled_run(&run, 0.0, 0.0, FontFace::Helvetica, 10.0)
            .unwrap_err();
        assert!(matches!(err, RenderError::NoPage));
    }

    #[test]
    fn test_output_loads_with_expected_page_count() {
        let mut pdf = renderer();
        for _ in 0..2 {
            pdf.new_page().unwrap();
            pdf.draw_styled_run(
                &StyledRun::Combined {
                    base: "x".to_string(),
                    subscript: "i".to_string(),
                    superscript: "2".to_string(),
                },
                20.0,
                30.0,
                FontFace::Helvetica,
                10.0,
            )
            .unwrap();
        }
        let bytes = pdf.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_image_is_embedded_as_xobject() {
        let mut pdf = renderer();
        pdf.new_page().unwrap();
        pdf.draw_image(0, &make_png(8, 4), 18.0, 18.0, 144.0, 72.0)
            .unwrap();
        let bytes = pdf.finish().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let images = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| matches!(s.dict.get(b"Subtype").and_then(|v| v.as_name()), Ok(b"Image")))
            .count();
        assert_eq!(images, 1);
    }

    #[test]
    fn test_corrupt_image_reports_topic_index() {
        let mut pdf = renderer();
        pdf.new_page().unwrap();
        let err = pdf
            .draw_image(4, b"not an image", 0.0, 0.0, 10.0, 10.0)
            .unwrap_err();
        assert!(matches!(err, RenderError::Image { index: 4, .. }));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 0]));
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let (rgb, w, h) = decode_rgb(&png.into_inner()).unwrap();
        assert_eq!((w, h), (1, 1));
        assert_eq!(rgb, vec![255, 255, 255]);
    }
}
