//! Diagnostic plot of the closure construction
//!
//! An SVG scatter of the XY projection: measured points (green), corrected
//! points (blue), the two virtual notches (cyan) and the construction line
//! from the upper-left fiducial to the left notch.

use std::fmt::Write as _;
use std::path::Path;

use crate::closure::Closure;
use crate::error::Result;

const SIZE: f64 = 480.0;
const MARGIN: f64 = 24.0;

/// Maps model XY onto the square canvas with equal axis scaling.
struct Canvas {
    min_x: f64,
    max_y: f64,
    scale: f64,
}

impl Canvas {
    fn fit<'a>(points: impl Iterator<Item = &'a [f64; 3]>) -> Self {
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_y = min_y.min(p[1]);
            max_y = max_y.max(p[1]);
        }
        let span = (max_x - min_x).max(max_y - min_y).max(1e-9);
        Self {
            min_x,
            max_y,
            scale: (SIZE - 2.0 * MARGIN) / span,
        }
    }

    fn map(&self, p: &[f64; 3]) -> (f64, f64) {
        (
            MARGIN + (p[0] - self.min_x) * self.scale,
            MARGIN + (self.max_y - p[1]) * self.scale,
        )
    }
}

/// Render the construction as a standalone SVG document.
pub fn render_svg(closure: &Closure) -> String {
    let notches = [closure.left_notch, closure.right_notch];
    let canvas = Canvas::fit(
        closure
            .centred
            .iter()
            .chain(&closure.corrected)
            .chain(&notches)
            .chain(std::iter::once(&closure.left_stand_off)),
    );

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{SIZE}\" height=\"{SIZE}\" viewBox=\"0 0 {SIZE} {SIZE}\">"
    );
    let _ = writeln!(
        svg,
        "  <title>closure displacement {:.6}</title>",
        closure.displacement
    );
    let _ = writeln!(svg, "  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>");

    let line: Vec<String> = [closure.corrected[1], closure.left_stand_off, closure.left_notch]
        .iter()
        .map(|p| {
            let (x, y) = canvas.map(p);
            format!("{x:.2},{y:.2}")
        })
        .collect();
    let _ = writeln!(
        svg,
        "  <polyline points=\"{}\" fill=\"none\" stroke=\"cyan\"/>",
        line.join(" ")
    );

    let layers: [(&str, f64, &[[f64; 3]]); 3] = [
        ("green", 4.0, &closure.centred),
        ("blue", 4.0, &closure.corrected),
        ("cyan", 2.0, &notches),
    ];
    for (colour, radius, points) in layers {
        for p in points {
            let (x, y) = canvas.map(p);
            let _ = writeln!(
                svg,
                "  <circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{radius}\" fill=\"{colour}\"/>"
            );
        }
    }
    svg.push_str("</svg>\n");
    svg
}

pub fn write_svg<P: AsRef<Path>>(closure: &Closure, path: P) -> Result<()> {
    std::fs::write(path.as_ref(), render_svg(closure))?;
    tracing::info!(path = %path.as_ref().display(), "wrote closure plot");
    Ok(())
}
