//! Overlay Composer: shared log axis, styling and IC50 label stacking for
//! drawing several compounds on one chart.
//!
//! Layout rules:
//!
//! - domain = `[min(a_i) / 10, max(b_i) * 10]` over the overlaid compounds'
//!   positive concentration extents `[a_i, b_i]`
//! - ticks at integer powers of ten inside the domain
//! - the i-th emitted IC50 label sits at `x = 1.1 * IC50` and
//!   `(0.95 - 0.05 * i)` of the axis height
//!
//! Colors and markers are picked by the compound's position in the requested
//! overlay list (missing compounds still consume a slot).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisWarning, CompoundGroup, PlotOptions, PredictionCurve, SelectionResult};
use crate::domain::ModelKind;
use crate::plot::curve::{curve_range, predict_curve, PredictError};

/// Default colors, cycled by index.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Top label position as a fraction of the axis height.
pub const LABEL_TOP: f64 = 0.95;
/// Downward offset per prior label, as a fraction of the axis height.
pub const LABEL_STEP: f64 = 0.05;
/// Labels sit slightly right of their reference line.
pub const LABEL_X_FACTOR: f64 = 1.1;

/// Scatter marker glyphs, cycled by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Circle,
    Square,
    TriangleUp,
    Diamond,
    TriangleDown,
    TriangleLeft,
    TriangleRight,
    Pentagon,
    Star,
    Hexagon,
}

impl Marker {
    pub const CYCLE: [Marker; 10] = [
        Marker::Circle,
        Marker::Square,
        Marker::TriangleUp,
        Marker::Diamond,
        Marker::TriangleDown,
        Marker::TriangleLeft,
        Marker::TriangleRight,
        Marker::Pentagon,
        Marker::Star,
        Marker::Hexagon,
    ];

    /// Single-character form for terminal plots.
    pub fn glyph(self) -> char {
        match self {
            Marker::Circle => 'o',
            Marker::Square => 's',
            Marker::TriangleUp => '^',
            Marker::Diamond => 'D',
            Marker::TriangleDown => 'v',
            Marker::TriangleLeft => '<',
            Marker::TriangleRight => '>',
            Marker::Pentagon => 'p',
            Marker::Star => '*',
            Marker::Hexagon => 'h',
        }
    }
}

/// Color for a compound: explicit mapping first, else the palette by index.
pub fn color_for(compound: &str, index: usize, colors: &BTreeMap<String, String>) -> String {
    colors
        .get(compound)
        .cloned()
        .unwrap_or_else(|| DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()].to_string())
}

pub fn marker_for(index: usize) -> Marker {
    Marker::CYCLE[index % Marker::CYCLE.len()]
}

/// Shared log-axis domain covering every extent with one decade of margin.
pub fn shared_domain(extents: &[(f64, f64)]) -> Option<(f64, f64)> {
    let lo = extents.iter().map(|e| e.0).fold(f64::INFINITY, f64::min);
    let hi = extents.iter().map(|e| e.1).fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() && hi.is_finite() && lo > 0.0 {
        Some((lo / 10.0, hi * 10.0))
    } else {
        None
    }
}

/// Powers of ten inside `domain` (inclusive).
pub fn log_ticks(domain: (f64, f64)) -> Vec<f64> {
    let (lo, hi) = domain;
    if !(lo > 0.0 && hi >= lo && hi.is_finite()) {
        return Vec::new();
    }
    let first = (lo.log10() - 1e-9).ceil() as i32;
    let last = (hi.log10() + 1e-9).floor() as i32;
    (first..=last).map(|e| 10f64.powi(e)).collect()
}

/// Vertical position (fraction of axis height) of the `index`-th label.
pub fn label_fraction(index: usize) -> f64 {
    LABEL_TOP - LABEL_STEP * index as f64
}

/// Potency label text.
pub fn ic50_label_text(compound: &str, ic50: f64) -> String {
    format!("{compound} IC50 = {ic50:.1}")
}

/// A text annotation anchored to a reference line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLabel {
    pub compound: String,
    pub text: String,
    pub color: String,
    /// Data x (concentration).
    pub x: f64,
    /// Fraction of the axis height, measured from the bottom.
    pub y_fraction: f64,
    /// Data y resolved against the chart's y range.
    pub y: f64,
}

/// One compound drawn on the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySeries {
    pub compound: String,
    pub model: ModelKind,
    pub color: String,
    pub marker: Marker,
    /// Observed `(concentration, response)` at positive concentrations.
    pub points: Vec<(f64, f64)>,
    pub curve: PredictionCurve,
    /// Vertical reference line position, when enabled and defined.
    pub ic50: Option<f64>,
}

/// Complete, immutable overlay description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub domain: (f64, f64),
    pub ticks: Vec<f64>,
    pub y_range: (f64, f64),
    pub series: Vec<OverlaySeries>,
    pub labels: Vec<ReferenceLabel>,
}

/// Overlay plus any skipped-compound warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOutcome {
    pub spec: Option<OverlaySpec>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Compose the overlay for `options.overlay_compounds`.
///
/// Compounds without a selected model are skipped with an
/// `OverlayReference` warning; an empty request yields no overlay.
pub fn compose_overlay(
    selections: &[SelectionResult],
    groups: &[CompoundGroup],
    options: &PlotOptions,
) -> Result<OverlayOutcome, PredictError> {
    let mut warnings = Vec::new();
    let mut series = Vec::new();
    let mut extents = Vec::new();

    for (idx, compound) in options.overlay_compounds.iter().enumerate() {
        let found = selections
            .iter()
            .find(|s| &s.compound == compound)
            .zip(groups.iter().find(|g| &g.compound == compound));
        let Some((selection, group)) = found else {
            let w = AnalysisWarning::OverlayReference {
                compound: compound.clone(),
            };
            log::warn!("{w}");
            warnings.push(w);
            continue;
        };
        let Some(extent) = group.concentration_extent() else {
            continue;
        };

        let curve = predict_curve(&selection.fit, curve_range(extent), options.curve_points)?;
        let ic50 = selection.fit.ic50();
        let (x, y) = group.positive_points();
        extents.push(extent);
        series.push(OverlaySeries {
            compound: compound.clone(),
            model: selection.fit.model,
            color: color_for(compound, idx, &options.compound_colors),
            marker: marker_for(idx),
            points: x.into_iter().zip(y).collect(),
            curve,
            ic50: (options.show_ic50_lines && ic50.is_finite()).then_some(ic50),
        });
    }

    let Some(domain) = shared_domain(&extents) else {
        return Ok(OverlayOutcome {
            spec: None,
            warnings,
        });
    };

    let y_bounds = y_range(series.iter().flat_map(|s| {
        s.points.iter().chain(s.curve.points.iter()).map(|p| p.1)
    }));

    let labels = series
        .iter()
        .filter_map(|s| s.ic50.map(|ic50| (s, ic50)))
        .enumerate()
        .map(|(i, (s, ic50))| {
            let y_fraction = label_fraction(i);
            ReferenceLabel {
                compound: s.compound.clone(),
                text: ic50_label_text(&s.compound, ic50),
                color: s.color.clone(),
                x: ic50 * LABEL_X_FACTOR,
                y_fraction,
                y: y_bounds.0 + (y_bounds.1 - y_bounds.0) * y_fraction,
            }
        })
        .collect();

    Ok(OverlayOutcome {
        spec: Some(OverlaySpec {
            domain,
            ticks: log_ticks(domain),
            y_range: y_bounds,
            series,
            labels,
        }),
        warnings,
    })
}

/// Response range padded by 5% of its span (a flat range gets a unit-ish pad).
pub fn y_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        (lo.abs() * 0.05).max(0.05)
    };
    (lo - pad, hi + pad)
}
