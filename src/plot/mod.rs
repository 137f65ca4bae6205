//! Overlap-matrix heat map.
//!
//! Renders the MBAR state-overlap matrix as an SVG: one annotated square per
//! state pair on a yellow-green-blue ramp, with near-zero cells left at the
//! background color so the diagonal band stands out.

use std::path::Path;

use plotters::prelude::*;

use crate::error::{AnalysisError, AnalysisResult};

/// Cells below this overlap are not annotated.
const MASK_THRESHOLD: f64 = 0.005;

const CELL_PX: i32 = 40;
const MARGIN_PX: i32 = 60;

/// Render `matrix` as a heat map SVG at `path`.
pub fn render_overlap_svg(matrix: &[Vec<f64>], path: &Path) -> AnalysisResult<()> {
    let k = matrix.len();
    if k == 0 {
        return Err(AnalysisError::Invalid(
            "cannot plot an empty overlap matrix".to_string(),
        ));
    }

    let side = (MARGIN_PX + k as i32 * CELL_PX + 20) as u32;
    let root = SVGBackend::new(path, (side, side)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    root.draw(&Text::new(
        "Overlap matrix",
        (MARGIN_PX, 15),
        ("sans-serif", 18).into_font().color(&BLACK),
    ))
    .map_err(plot_err)?;

    let border = RGBColor(192, 192, 192);
    for (i, row) in matrix.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            let x0 = MARGIN_PX + j as i32 * CELL_PX;
            let y0 = MARGIN_PX + i as i32 * CELL_PX;
            let fill = heat_color(v.clamp(0.0, 1.0));

            root.draw(&Rectangle::new(
                [(x0, y0), (x0 + CELL_PX, y0 + CELL_PX)],
                fill.filled(),
            ))
            .map_err(plot_err)?;
            root.draw(&Rectangle::new(
                [(x0, y0), (x0 + CELL_PX, y0 + CELL_PX)],
                border.stroke_width(1),
            ))
            .map_err(plot_err)?;

            if v >= MASK_THRESHOLD {
                let text_color = if v > 0.5 { WHITE } else { BLACK };
                root.draw(&Text::new(
                    format!("{v:.2}"),
                    (x0 + 8, y0 + CELL_PX / 2 - 6),
                    ("sans-serif", 12).into_font().color(&text_color),
                ))
                .map_err(plot_err)?;
            }
        }
    }

    // State indices along the top and left edges.
    for s in 0..k {
        let offset = MARGIN_PX + s as i32 * CELL_PX + CELL_PX / 2 - 4;
        root.draw(&Text::new(
            s.to_string(),
            (offset, MARGIN_PX - 18),
            ("sans-serif", 12).into_font().color(&BLACK),
        ))
        .map_err(plot_err)?;
        root.draw(&Text::new(
            s.to_string(),
            (MARGIN_PX - 18, offset),
            ("sans-serif", 12).into_font().color(&BLACK),
        ))
        .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

fn plot_err<E: std::fmt::Display>(e: E) -> AnalysisError {
    AnalysisError::Plot(e.to_string())
}

/// Piecewise-linear yellow-green-blue ramp over [0, 1].
fn heat_color(v: f64) -> RGBColor {
    const ANCHORS: [(f64, (u8, u8, u8)); 5] = [
        (0.0, (255, 255, 217)),
        (0.25, (199, 233, 180)),
        (0.5, (65, 182, 196)),
        (0.75, (34, 94, 168)),
        (1.0, (8, 29, 88)),
    ];

    for pair in ANCHORS.windows(2) {
        let (lo_v, lo_c) = pair[0];
        let (hi_v, hi_c) = pair[1];
        if v <= hi_v {
            let t = (v - lo_v) / (hi_v - lo_v);
            return RGBColor(
                lerp(lo_c.0, hi_c.0, t),
                lerp(lo_c.1, hi_c.1, t),
                lerp(lo_c.2, hi_c.2, t),
            );
        }
    }
    let (_, c) = ANCHORS[ANCHORS.len() - 1];
    RGBColor(c.0, c.1, c.2)
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_darkens_with_value() {
        let lo = heat_color(0.0);
        let mid = heat_color(0.5);
        let hi = heat_color(1.0);
        assert!(lo.0 > mid.0 && mid.0 > hi.0);
        assert!(hi.0 == 8 && hi.1 == 29 && hi.2 == 88);
    }

    #[test]
    fn renders_an_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlap.svg");
        let matrix = vec![
            vec![0.9, 0.1, 0.0],
            vec![0.1, 0.8, 0.1],
            vec![0.0, 0.1, 0.9],
        ];
        render_overlap_svg(&matrix, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("0.90"));
    }

    #[test]
    fn empty_matrix_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlap.svg");
        let err = render_overlap_svg(&[], &path).unwrap_err();
        assert!(matches!(err, AnalysisError::Invalid(_)));
    }
}
