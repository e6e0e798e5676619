//! SVG figure rendering with Plotters.
//!
//! Figures are drawn straight from a `PlotSpec`: one chart per compound and an
//! optional overlay, all with a log-scaled concentration axis. File names:
//!
//! - `dose_response_<compound>[_<timestamp>].svg`
//! - `dose_response_overlay[_<timestamp>].svg`
//!
//! Compounds whose names collide after sanitizing (or with the overlay) get a
//! numeric suffix.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::error::AppError;
use crate::plot::overlay::{Marker, OverlaySpec, ReferenceLabel};
use crate::plot::spec::{CompoundPlot, PlotSpec};

const FIGURE_SIZE: (u32, u32) = (1000, 700);
const OVERLAY_STEM: &str = "overlay";

type DrawResult = Result<(), Box<dyn std::error::Error>>;

/// Render every figure in `spec` into `dir`. Returns the written paths.
pub fn write_svgs(spec: &PlotSpec, dir: &Path, timestamp: Option<&str>) -> Result<Vec<PathBuf>, AppError> {
    let names = figure_names(
        spec.compounds.iter().map(|p| p.compound.as_str()),
        spec.overlay.is_some(),
        timestamp,
    );
    let mut written = Vec::new();
    for (plot, name) in spec.compounds.iter().zip(&names) {
        let path = dir.join(name);
        draw_compound(spec, plot, &path).map_err(|e| {
            AppError::new(4, format!("Failed to render '{}': {e}", path.display()))
        })?;
        log::info!("wrote {}", path.display());
        written.push(path);
    }
    if let (Some(overlay), Some(name)) = (&spec.overlay, names.get(spec.compounds.len())) {
        let path = dir.join(name);
        draw_overlay(spec, overlay, &path).map_err(|e| {
            AppError::new(4, format!("Failed to render '{}': {e}", path.display()))
        })?;
        log::info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// One file name per compound, then the overlay's when `with_overlay` is set.
///
/// Names are unique ignoring ASCII case; the overlay keeps its plain name.
pub fn figure_names<'a, I>(compounds: I, with_overlay: bool, timestamp: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    if with_overlay {
        taken.insert(OVERLAY_STEM.to_string());
    }
    let mut names = Vec::new();
    for compound in compounds {
        let base = sanitize(compound);
        let mut stem = base.clone();
        let mut index = 2;
        while !taken.insert(stem.to_ascii_lowercase()) {
            stem = format!("{base}_{index}");
            index += 1;
        }
        names.push(figure_name(&stem, timestamp));
    }
    if with_overlay {
        names.push(figure_name(OVERLAY_STEM, timestamp));
    }
    names
}

/// `dose_response_<stem>[_<timestamp>].svg` with a filesystem-safe stem.
pub fn figure_name(stem: &str, timestamp: Option<&str>) -> String {
    let safe = sanitize(stem);
    match timestamp {
        Some(ts) => format!("dose_response_{safe}_{ts}.svg"),
        None => format!("dose_response_{safe}.svg"),
    }
}

fn sanitize(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Parse `#rrggbb` (or `#rgb`) and a few common color names.
pub fn parse_color(token: &str) -> Option<RGBColor> {
    let t = token.trim();
    if let Some(hex) = t.strip_prefix('#') {
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let v = u32::from_str_radix(&expanded, 16).ok()?;
        return Some(RGBColor((v >> 16) as u8, (v >> 8) as u8, v as u8));
    }
    let named = match t.to_ascii_lowercase().as_str() {
        "black" => RGBColor(0, 0, 0),
        "red" => RGBColor(214, 39, 40),
        "green" => RGBColor(44, 160, 44),
        "blue" => RGBColor(31, 119, 180),
        "orange" => RGBColor(255, 127, 14),
        "purple" => RGBColor(148, 103, 189),
        "gray" | "grey" => RGBColor(127, 127, 127),
        _ => return None,
    };
    Some(named)
}

fn color_or_black(token: &str) -> RGBColor {
    parse_color(token).unwrap_or_else(|| {
        log::warn!("unrecognized color '{token}'; using black");
        BLACK
    })
}

fn draw_compound(spec: &PlotSpec, plot: &CompoundPlot, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x0, x1) = plot.domain;
    let (y0, y1) = plot.y_range;
    let color = color_or_black(&plot.color);

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} ({})", plot.compound, plot.model), ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d((x0..x1).log_scale(), y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(spec.concentration_label.as_str())
        .y_desc(spec.response_label.as_str())
        .x_label_formatter(&|v| format!("{v}"))
        .draw()?;

    if let Some(ic50) = plot.ic50 {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(ic50, y0), (ic50, y1)],
            color.mix(0.6),
        )))?;
    }
    if let Some(dmax) = plot.dmax {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x0, dmax), (x1, dmax)],
            BLACK.mix(0.35),
        )))?;
    }

    chart
        .draw_series(LineSeries::new(plot.curve.points.iter().copied(), color.stroke_width(2)))?
        .label(format!("{} fit", plot.model))
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    draw_markers(&mut chart, &plot.points, plot.marker, color)?;

    if let Some(label) = &plot.label {
        draw_label(&mut chart, label)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_overlay(spec: &PlotSpec, overlay: &OverlaySpec, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x0, x1) = overlay.domain;
    let (y0, y1) = overlay.y_range;

    let mut chart = ChartBuilder::on(&root)
        .caption("Dose-response overlay", ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d((x0..x1).log_scale(), y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(spec.concentration_label.as_str())
        .y_desc(spec.response_label.as_str())
        .x_label_formatter(&|v| format!("{v}"))
        .draw()?;

    for series in &overlay.series {
        let color = color_or_black(&series.color);
        if let Some(ic50) = series.ic50 {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(ic50, y0), (ic50, y1)],
                color.mix(0.6),
            )))?;
        }
        chart
            .draw_series(LineSeries::new(series.curve.points.iter().copied(), color.stroke_width(2)))?
            .label(format!("{} ({})", series.compound, series.model))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        draw_markers(&mut chart, &series.points, series.marker, color)?;
    }

    for label in &overlay.labels {
        draw_label(&mut chart, label)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

type LogChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<LogCoord<f64>, RangedCoordf64>>;

fn draw_markers<DB: DrawingBackend>(
    chart: &mut LogChart<'_, DB>,
    points: &[(f64, f64)],
    marker: Marker,
    color: RGBColor,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let style = color.mix(0.7).filled();
    let pts = points.iter().copied();
    match marker {
        Marker::Circle | Marker::Pentagon | Marker::Hexagon => {
            chart.draw_series(pts.map(|p| Circle::new(p, 4, style)))?;
        }
        Marker::Square | Marker::Diamond => {
            chart.draw_series(pts.map(|p| EmptyElement::at(p) + Rectangle::new([(-4, -4), (4, 4)], style)))?;
        }
        Marker::TriangleUp | Marker::TriangleDown | Marker::TriangleLeft | Marker::TriangleRight => {
            chart.draw_series(pts.map(|p| TriangleMarker::new(p, 5, style)))?;
        }
        Marker::Star => {
            chart.draw_series(pts.map(|p| Cross::new(p, 4, color.stroke_width(2))))?;
        }
    }
    Ok(())
}

fn draw_label<DB: DrawingBackend>(
    chart: &mut LogChart<'_, DB>,
    label: &ReferenceLabel,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let color = color_or_black(&label.color);
    chart.draw_series(std::iter::once(Text::new(
        label.text.clone(),
        (label.x, label.y),
        ("sans-serif", 13).into_font().color(&color),
    )))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_names_are_sanitized_and_timestamped() {
        assert_eq!(figure_name("Compound_A", None), "dose_response_Compound_A.svg");
        assert_eq!(
            figure_name("A/B 1", Some("20250101_120000")),
            "dose_response_A_B_1_20250101_120000.svg"
        );
        assert_eq!(figure_name("overlay", None), "dose_response_overlay.svg");
    }

    #[test]
    fn colliding_figure_names_get_suffixes() {
        let names = figure_names(["A/B", "A_B", "overlay", "a_b", "A_B_2"], true, None);
        assert_eq!(
            names,
            vec![
                "dose_response_A_B.svg",
                "dose_response_A_B_2.svg",
                "dose_response_overlay_2.svg",
                "dose_response_a_b_3.svg",
                "dose_response_A_B_2_2.svg",
                "dose_response_overlay.svg",
            ]
        );

        // Without an overlay the name is free for a compound.
        let names = figure_names(["overlay"], false, Some("20250101_120000"));
        assert_eq!(names, vec!["dose_response_overlay_20250101_120000.svg"]);
    }

    #[test]
    fn parses_hex_and_named_colors() {
        assert_eq!(parse_color("#e74c3c"), Some(RGBColor(0xe7, 0x4c, 0x3c)));
        assert_eq!(parse_color("#fff"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_color("Blue"), Some(RGBColor(31, 119, 180)));
        assert!(parse_color("#12345").is_none());
        assert!(parse_color("chartreuse-ish").is_none());
    }
}
