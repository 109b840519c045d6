use std::path::Path;

use plotters::prelude::*;

use crate::error::{Error, Result};

/// One named curve, indexed by epoch starting at 1.
pub struct Curve<'a> {
    pub label: &'a str,
    pub values: &'a [f32],
    pub color: RGBColor,
}

/// Render per-epoch curves as a line chart PNG.
///
/// Text needs a system font; when none can be loaded the chart is redrawn with
/// lines and mesh only.
pub fn draw_curves(path: &Path, title: &str, y_desc: &str, curves: &[Curve<'_>]) -> Result<()> {
    if let Err(e) = render(path, Some((title, y_desc)), curves) {
        log::warn!("{e}; drawing {} without text", path.display());
        render(path, None, curves)?;
    }
    log::debug!("Wrote plot {}", path.display());
    Ok(())
}

fn render(path: &Path, text: Option<(&str, &str)>, curves: &[Curve<'_>]) -> Result<()> {
    let plot_err = |e: &dyn std::fmt::Display| Error::Plot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let epochs = curves.iter().map(|c| c.values.len()).max().unwrap_or(0);
    let (lo, hi) = value_range(curves);

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_err(&e))?;

    {
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if let Some((title, _)) = text {
            builder
                .caption(title, ("sans-serif", 24))
                .set_label_area_size(LabelAreaPosition::Left, 60)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart = builder
            .build_cartesian_2d(0.5f32..epochs as f32 + 0.5, lo..hi)
            .map_err(|e| plot_err(&e))?;

        let mut mesh = chart.configure_mesh();
        if let Some((_, y_desc)) = text {
            mesh.x_desc("epoch").y_desc(y_desc);
        } else {
            mesh.x_labels(0).y_labels(0);
        }
        mesh.draw().map_err(|e| plot_err(&e))?;

        for curve in curves {
            let color = curve.color;
            chart
                .draw_series(LineSeries::new(
                    curve
                        .values
                        .iter()
                        .enumerate()
                        .map(|(i, &v)| ((i + 1) as f32, v)),
                    color.stroke_width(2),
                ))
                .map_err(|e| plot_err(&e))?
                .label(curve.label)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        if text.is_some() {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(|e| plot_err(&e))?;
        }
    }

    root.present().map_err(|e| plot_err(&e))
}

/// Finite y-bounds with a margin; a flat or empty series still gets a usable range.
fn value_range(curves: &[Curve<'_>]) -> (f32, f32) {
    let (lo, hi) = curves
        .iter()
        .flat_map(|c| c.values.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if lo > hi {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-3);
    (lo - pad, hi + pad)
}
