//! End-to-end tests for edgequake-doc2pdf against the real pdfium library.
//!
//! They produce actual PDF files and read them back with pdfium to check
//! page counts, page sizes and extractable text. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! Generated documents are kept in `target/e2e-output/` for inspection.

use edgequake_doc2pdf::{
    convert, convert_stream, convert_to_file, ConversionOptions, ConvertError, InputFile,
    PageSize, PdfiumBackend, Phase,
};
use image::{DynamicImage, Rgb, RgbImage};
use pdfium_render::prelude::*;
use std::io::{Cursor, Write};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/e2e-output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED is set and pdfium can be bound.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match PdfiumBackend::from_options(&ConversionOptions::default()).bind() {
            Ok(pdfium) => pdfium,
            Err(e) => {
                println!("SKIP: {e}");
                println!("      Point PDFIUM_LIB_PATH at a pdfium build");
                return;
            }
        }
    }};
}

fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// Page sizes in points, read back from the generated document.
fn page_sizes(pdfium: &Pdfium, bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .expect("output should be a valid PDF");
    doc.pages()
        .iter()
        .map(|p| (p.width().value, p.height().value))
        .collect()
}

fn page_text(pdfium: &Pdfium, bytes: &[u8], index: usize) -> String {
    let doc = pdfium.load_pdf_from_byte_slice(bytes, None).unwrap();
    let page = doc.pages().iter().nth(index).unwrap();
    let text = page.text().unwrap().all();
    text
}

/// Filter names of every image object in the document.
fn image_filters(pdfium: &Pdfium, bytes: &[u8]) -> Vec<String> {
    let doc = pdfium.load_pdf_from_byte_slice(bytes, None).unwrap();
    let mut names = Vec::new();
    for page in doc.pages().iter() {
        for object in page.objects().iter() {
            if let Some(image) = object.as_image_object() {
                names.extend(image.filters().iter().map(|f| f.name().to_string()));
            }
        }
    }
    names
}

/// A photo-like gradient, so JPEG quality has something to work with.
fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, ((x ^ y) & 0xff) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.5
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_images_one_page_each() {
    let pdfium = e2e_skip_unless_ready!();

    let files = vec![
        InputFile::from_bytes("red.png", None, png(640, 480, [220, 30, 30])),
        InputFile::from_bytes("blue.png", None, png(480, 640, [30, 30, 220])),
    ];
    let result = convert(files, &ConversionOptions::default())
        .await
        .expect("convert should succeed");

    assert!(result.bytes.starts_with(b"%PDF-"));
    assert_eq!(result.page_count, 2);
    assert_eq!(result.filename, "combined.pdf");

    let sizes = page_sizes(&pdfium, &result.bytes);
    assert_eq!(sizes.len(), 2);
    for (w, h) in sizes {
        // A4 portrait: 595 x 842 pt.
        assert!(close(w, 595.3) && close(h, 841.9), "got {w}x{h}");
    }

    result.write_to(output_dir().join("images.pdf")).unwrap();
}

#[tokio::test]
async fn test_fit_page_matches_image() {
    let pdfium = e2e_skip_unless_ready!();

    let options = ConversionOptions::builder()
        .page_size(PageSize::Fit)
        .margin_mm(0.0)
        .build()
        .unwrap();
    let files = vec![InputFile::from_bytes("banner.png", None, png(960, 240, [0, 160, 0]))];
    let result = convert(files, &options).await.unwrap();

    // 960 px at 96 dpi = 10 in = 720 pt.
    let sizes = page_sizes(&pdfium, &result.bytes);
    assert_eq!(sizes.len(), 1);
    assert!(close(sizes[0].0, 720.0) && close(sizes[0].1, 180.0), "got {:?}", sizes[0]);
}

#[tokio::test]
async fn test_images_embedded_as_jpeg() {
    let pdfium = e2e_skip_unless_ready!();

    let render = |quality: f32| {
        let options = ConversionOptions::builder().quality(quality).build().unwrap();
        let files = vec![InputFile::from_bytes("photo.png", None, gradient_png(800, 600))];
        async move { convert(files, &options).await.unwrap() }
    };
    let high = render(0.95).await;
    let low = render(0.2).await;

    assert_eq!(image_filters(&pdfium, &high.bytes), vec!["DCTDecode".to_string()]);
    assert_eq!(image_filters(&pdfium, &low.bytes), vec!["DCTDecode".to_string()]);
    assert!(
        low.bytes.len() < high.bytes.len(),
        "quality 0.2 gave {} bytes, 0.95 gave {}",
        low.bytes.len(),
        high.bytes.len()
    );
}

// ── Text ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_text_is_extractable() {
    let pdfium = e2e_skip_unless_ready!();

    let text: String = (1..=120).map(|n| format!("line number {n}\n")).collect();
    let files = vec![InputFile::from_bytes("log.txt", None, text.into_bytes())];
    let result = convert(files, &ConversionOptions::default()).await.unwrap();

    assert_eq!(result.page_count, 3);
    assert_eq!(page_sizes(&pdfium, &result.bytes).len(), 3);

    let first = page_text(&pdfium, &result.bytes, 0);
    assert!(first.contains("line number 1"), "page 1 text: {first:?}");
    let last = page_text(&pdfium, &result.bytes, 2);
    assert!(last.contains("line number 120"), "page 3 text: {last:?}");

    result.write_to(output_dir().join("log.pdf")).unwrap();
}

// ── Flowing documents ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_markdown_rasterised() {
    let pdfium = e2e_skip_unless_ready!();

    let mut markdown = String::from("# Release notes\n\n");
    for n in 0..80 {
        markdown.push_str(&format!(
            "## Section {n}\n\nSome **bold** and *italic* text with `code`.\n\n- one\n- two\n\n"
        ));
    }
    let files = vec![InputFile::from_bytes("notes.md", None, markdown.into_bytes())];
    let result = convert(files, &ConversionOptions::default()).await.unwrap();

    assert!(result.page_count > 1);
    assert_eq!(page_sizes(&pdfium, &result.bytes).len(), result.page_count);
    result.write_to(output_dir().join("notes.pdf")).unwrap();
}

#[tokio::test]
async fn test_docx_batch_skips_broken_archive() {
    let _pdfium = e2e_skip_unless_ready!();

    let files = vec![
        InputFile::from_bytes("a.docx", None, docx(&["Quarterly report", "All good."])),
        InputFile::from_bytes("b.docx", None, b"definitely not a zip".to_vec()),
    ];
    let result = convert(files, &ConversionOptions::default()).await.unwrap();
    assert_eq!(result.page_count, 1);
    assert_eq!(result.stats.skipped_files, vec!["b.docx".to_string()]);
}

#[tokio::test]
async fn test_convert_to_file() {
    let _pdfium = e2e_skip_unless_ready!();

    let path = output_dir().join("nested/page.pdf");
    let files = vec![InputFile::from_bytes("page.html", None, b"<h1>Hello</h1><p>World</p>".to_vec())];
    let result = convert_to_file(files, &path, &ConversionOptions::default())
        .await
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), result.bytes);
}

#[tokio::test]
async fn test_stream_reaches_done() {
    let _pdfium = e2e_skip_unless_ready!();

    let files = vec![InputFile::from_bytes("a.txt", None, b"streamed".to_vec())];
    let handle = convert_stream(files, &ConversionOptions::default()).unwrap();
    let (states, result) = handle.finish().await.unwrap();
    assert!(matches!(states.last().unwrap().phase(), Phase::Done { page_count: 1, .. }));
    assert!(result.bytes.starts_with(b"%PDF-"));
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_library_reported() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let options = ConversionOptions::builder()
        .pdfium_library_path("/nonexistent/libpdfium.so")
        .build()
        .unwrap();
    let files = vec![InputFile::from_bytes("a.txt", None, b"x".to_vec())];
    match convert(files, &options).await {
        // Falls back to the system library when one is installed.
        Ok(result) => assert!(result.bytes.starts_with(b"%PDF-")),
        Err(e) => assert!(matches!(e, ConvertError::RenderSurfaceUnavailable(_)), "got {e}"),
    }
}
