// ============================================================
// Layer 6 — Report Plots
// ============================================================
// Two artefacts, written under the output directory:
//
//   confusion_matrix.svg   — heat map of counts[true][predicted]
//                            with class names on both axes
//
//   most_incorrect.png     — grid of the raw test images the
//   most_incorrect.json      model got wrong most confidently,
//                            plus one JSON entry per tile (true
//                            class, predicted class, confidence)
//
// The SVG is assembled as a string; the grid is painted with
// the `image` crate, nearest-neighbour upscaled so 32x32 tiles
// stay readable.

use anyhow::{ensure, Context, Result};
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::image::{ImageShape, RawImage};
use crate::domain::prediction::{ConfusionMatrix, PredictionRecord};

const CELL:        f64 = 48.0;
const MARGIN_TOP:  f64 = 60.0;
const MARGIN_LEFT: f64 = 110.0;
const MARGIN_BOTTOM: f64 = 110.0;
const COLOR_TEXT:  &str = "#2c3e50";

const TILE_SCALE: u32 = 4;
const TILE_PAD:   u32 = 2;

// ─── Confusion Matrix ─────────────────────────────────────────────────────────

/// Render `matrix` as an SVG heat map at `output_path`.
pub fn write_confusion_matrix_svg(
    matrix:      &ConfusionMatrix,
    class_names: &[String],
    output_path: &Path,
) -> Result<()> {
    let svg = render_confusion_matrix(matrix, class_names);
    fs::write(output_path, svg)
        .with_context(|| format!("Cannot write '{}'", output_path.display()))?;
    tracing::info!("Confusion matrix written to '{}'", output_path.display());
    Ok(())
}

fn render_confusion_matrix(matrix: &ConfusionMatrix, class_names: &[String]) -> String {
    let n      = matrix.num_classes();
    let side   = CELL * n as f64;
    let width  = MARGIN_LEFT + side + 20.0;
    let height = MARGIN_TOP + side + MARGIN_BOTTOM;
    let max    = matrix.max_count().max(1) as f64;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = width, h = height
    ));
    svg.push_str(&format!(r#"<rect width="{}" height="{}" fill="white"/>"#, width, height));
    svg.push_str(&format!(
        r#"<text x="{}" y="30" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" font-weight="bold" fill="{}">Confusion matrix ({} / {} correct)</text>"#,
        MARGIN_LEFT + side / 2.0, COLOR_TEXT, matrix.correct(), matrix.total()
    ));

    for (row, counts) in matrix.rows().iter().enumerate() {
        for (col, &count) in counts.iter().enumerate() {
            let x = MARGIN_LEFT + col as f64 * CELL;
            let y = MARGIN_TOP + row as f64 * CELL;
            let t = count as f64 / max;
            // white → #1f5f9f
            let r = (255.0 - t * (255.0 - 31.0)) as u8;
            let g = (255.0 - t * (255.0 - 95.0)) as u8;
            let b = (255.0 - t * (255.0 - 159.0)) as u8;
            let ink = if t > 0.5 { "white" } else { COLOR_TEXT };

            svg.push_str(&format!(
                r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#{:02x}{:02x}{:02x}" stroke="#ecf0f1"/>"##,
                x, y, CELL, CELL, r, g, b
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
                x + CELL / 2.0, y + CELL / 2.0 + 4.0, ink, count
            ));
        }
    }

    for i in 0..n {
        let name = class_names.get(i).map(String::as_str).unwrap_or("?");
        let centre = i as f64 * CELL + CELL / 2.0;

        // Row labels: true class
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            MARGIN_LEFT - 8.0, MARGIN_TOP + centre + 4.0, COLOR_TEXT, escape_xml(name)
        ));
        // Column labels: predicted class, rotated
        let x = MARGIN_LEFT + centre;
        let y = MARGIN_TOP + side + 12.0;
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{c}" transform="rotate(-45 {x} {y})">{t}</text>"#,
            x = x, y = y, c = COLOR_TEXT, t = escape_xml(name)
        ));
    }

    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">Predicted</text>"#,
        MARGIN_LEFT + side / 2.0, height - 12.0, COLOR_TEXT
    ));
    svg.push_str(&format!(
        r#"<text x="16" y="{y}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{c}" transform="rotate(-90 16 {y})">True</text>"#,
        y = MARGIN_TOP + side / 2.0, c = COLOR_TEXT
    ));

    svg.push_str("</svg>");
    svg
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ─── Most Incorrect Grid ──────────────────────────────────────────────────────

/// One tile of the error grid, as written to the JSON sidecar
#[derive(Debug, Clone, Serialize)]
pub struct GridTile {
    pub row:        usize,
    pub col:        usize,
    pub index:      usize,
    #[serde(rename = "true")]
    pub true_label: String,
    pub predicted:  String,
    pub confidence: f32,
}

/// Paint `errors` as an image grid at `<stem>.png` and describe each
/// tile in `<stem>.json`. Returns the two paths written.
///
/// `image_at` maps a record's test index to its raw image.
pub fn write_error_grid<'a>(
    errors:      &[&PredictionRecord],
    image_at:    impl Fn(usize) -> Option<&'a RawImage>,
    shape:       ImageShape,
    class_names: &[String],
    stem:        &Path,
) -> Result<(PathBuf, PathBuf)> {
    ensure!(!errors.is_empty(), "no incorrect predictions to plot");
    ensure!(
        shape.channels == 1 || shape.channels == 3,
        "cannot draw {}-channel images",
        shape.channels
    );

    let count = errors.len();
    let cols  = (count as f64).sqrt().ceil() as usize;
    let rows  = count.div_ceil(cols);

    let tile_w = shape.width as u32 * TILE_SCALE;
    let tile_h = shape.height as u32 * TILE_SCALE;
    let mut canvas = RgbImage::from_pixel(
        cols as u32 * (tile_w + TILE_PAD) + TILE_PAD,
        rows as u32 * (tile_h + TILE_PAD) + TILE_PAD,
        Rgb([255, 255, 255]),
    );

    let name = |class: usize| class_names.get(class).cloned().unwrap_or_else(|| class.to_string());
    let mut tiles = Vec::with_capacity(count);

    for (i, record) in errors.iter().enumerate() {
        let (row, col) = (i / cols, i % cols);
        let raw = image_at(record.index)
            .with_context(|| format!("test image {} not found", record.index))?;

        let x0 = TILE_PAD + col as u32 * (tile_w + TILE_PAD);
        let y0 = TILE_PAD + row as u32 * (tile_h + TILE_PAD);
        for y in 0..tile_h {
            for x in 0..tile_w {
                let src = (y / TILE_SCALE) as usize * shape.width + (x / TILE_SCALE) as usize;
                canvas.put_pixel(x0 + x, y0 + y, pixel_at(&raw.pixels, shape, src));
            }
        }

        tiles.push(GridTile {
            row,
            col,
            index:      record.index,
            true_label: name(record.label),
            predicted:  name(record.predicted),
            confidence: record.confidence(),
        });
    }

    let png_path  = stem.with_extension("png");
    let json_path = stem.with_extension("json");
    canvas
        .save(&png_path)
        .with_context(|| format!("Cannot write '{}'", png_path.display()))?;
    fs::write(&json_path, serde_json::to_string_pretty(&tiles)?)
        .with_context(|| format!("Cannot write '{}'", json_path.display()))?;

    tracing::info!("Most incorrect images written to '{}'", png_path.display());
    Ok((png_path, json_path))
}

/// RGB value of pixel `i` of a CHW image (grey images are replicated).
fn pixel_at(pixels: &[u8], shape: ImageShape, i: usize) -> Rgb<u8> {
    let plane = shape.plane_len();
    let get   = |c: usize| pixels.get(c * plane + i).copied().unwrap_or(0);
    if shape.channels == 1 {
        let v = get(0);
        Rgb([v, v, v])
    } else {
        Rgb([get(0), get(1), get(2)])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, label: usize, predicted: usize) -> PredictionRecord {
        let mut probabilities = vec![0.1, 0.1];
        probabilities[predicted] = 0.9;
        PredictionRecord::from_probabilities(index, label, probabilities)
    }

    fn names() -> Vec<String> {
        vec!["cat".to_string(), "dog & co".to_string()]
    }

    #[test]
    fn test_svg_contains_classes_and_counts() {
        let records = vec![record(0, 0, 0), record(1, 0, 1), record(2, 1, 1), record(3, 1, 1)];
        let matrix  = ConfusionMatrix::from_records(&records, 2);
        let svg     = render_confusion_matrix(&matrix, &names());

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(">cat</text>"));
        assert!(svg.contains("dog &amp; co"));
        assert!(svg.contains("(3 / 4 correct)"));
        assert_eq!(svg.matches("<rect x=").count(), 4);
    }

    #[test]
    fn test_error_grid_writes_png_and_sidecar() {
        let tmp    = tempfile::tempdir().unwrap();
        let shape  = ImageShape::new(3, 2, 2);
        let images = vec![
            RawImage::new(vec![255, 255, 255, 255, 0, 0, 0, 0, 0, 0, 0, 0], 0),
            RawImage::new(vec![0; 12], 1),
            RawImage::new(vec![9; 12], 1),
        ];
        let wrong = [record(0, 0, 1), record(2, 1, 0)];
        let refs: Vec<&PredictionRecord> = wrong.iter().collect();

        let (png, json) = write_error_grid(
            &refs,
            |i| images.get(i),
            shape,
            &names(),
            &tmp.path().join("most_incorrect"),
        )
        .unwrap();

        let img = image::open(&png).unwrap().to_rgb8();
        // 2 tiles → 2 columns, 1 row; tiles are 8x8 with 2px padding
        assert_eq!(img.dimensions(), (2 + 2 * 10, 2 + 10));
        assert_eq!(img.get_pixel(2, 2), &Rgb([255, 0, 0]));

        let tiles: serde_json::Value = serde_json::from_str(&fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(tiles[0]["true"], "cat");
        assert_eq!(tiles[0]["predicted"], "dog & co");
        assert_eq!(tiles[1]["index"], 2);
    }

    #[test]
    fn test_error_grid_rejects_empty_input() {
        let tmp = tempfile::tempdir().unwrap();
        let res = write_error_grid(
            &[],
            |_| None,
            ImageShape::new(3, 2, 2),
            &names(),
            &tmp.path().join("grid"),
        );
        assert!(res.is_err());
    }
}
