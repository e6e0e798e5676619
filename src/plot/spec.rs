//! Plot specification: everything a renderer needs, as one immutable value.
//!
//! A `PlotSpec` is built once from the selected fits and handed to the SVG and
//! terminal renderers (or saved as JSON). Renderers never reach back into the
//! fitting results.

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisWarning, ColumnMap, CompoundGroup, ModelKind, PlotOptions, PredictionCurve, SelectionResult};
use crate::plot::curve::{curve_range, predict_curve, PredictError};
use crate::plot::overlay::{
    color_for, compose_overlay, ic50_label_text, label_fraction, log_ticks, marker_for, shared_domain, y_range,
    Marker, OverlaySpec, ReferenceLabel, LABEL_X_FACTOR,
};

/// Single-compound chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundPlot {
    pub compound: String,
    pub model: ModelKind,
    pub color: String,
    pub marker: Marker,
    pub points: Vec<(f64, f64)>,
    pub curve: PredictionCurve,
    pub domain: (f64, f64),
    pub ticks: Vec<f64>,
    pub y_range: (f64, f64),
    /// Vertical IC50 marker.
    pub ic50: Option<f64>,
    /// Horizontal Dmax marker.
    pub dmax: Option<f64>,
    pub label: Option<ReferenceLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub concentration_label: String,
    pub response_label: String,
    pub compounds: Vec<CompoundPlot>,
    pub overlay: Option<OverlaySpec>,
}

impl PlotSpec {
    pub fn compound(&self, name: &str) -> Option<&CompoundPlot> {
        self.compounds.iter().find(|c| c.compound == name)
    }
}

/// Build the plot spec for every selected compound plus the optional overlay.
///
/// Overlay warnings are returned alongside the plot spec.
pub fn build_plot_spec(
    selections: &[SelectionResult],
    groups: &[CompoundGroup],
    columns: &ColumnMap,
    options: &PlotOptions,
) -> Result<(PlotSpec, Vec<AnalysisWarning>), PredictError> {
    let mut compounds = Vec::with_capacity(selections.len());
    for (idx, sel) in selections.iter().enumerate() {
        let Some(group) = groups.iter().find(|g| g.compound == sel.compound) else {
            continue;
        };
        let Some(extent) = group.concentration_extent() else {
            continue;
        };
        compounds.push(compound_plot(sel, group, extent, idx, options)?);
    }

    let overlay = compose_overlay(selections, groups, options)?;

    Ok((
        PlotSpec {
            concentration_label: columns.concentration.clone(),
            response_label: columns.response.clone(),
            compounds,
            overlay: overlay.spec,
        },
        overlay.warnings,
    ))
}

fn compound_plot(
    sel: &SelectionResult,
    group: &CompoundGroup,
    extent: (f64, f64),
    idx: usize,
    options: &PlotOptions,
) -> Result<CompoundPlot, PredictError> {
    let curve = predict_curve(&sel.fit, curve_range(extent), options.curve_points)?;
    let (x, y) = group.positive_points();
    let points: Vec<(f64, f64)> = x.into_iter().zip(y).collect();

    let ic50 = Some(sel.fit.ic50()).filter(|v| options.show_ic50_lines && v.is_finite());
    let dmax = Some(sel.fit.dmax()).filter(|v| options.show_dmax_lines && v.is_finite());

    let domain = shared_domain(&[extent]).unwrap_or(extent);
    let y_bounds = y_range(
        points
            .iter()
            .chain(curve.points.iter())
            .map(|p| p.1)
            .chain(dmax),
    );
    let color = color_for(&sel.compound, idx, &options.compound_colors);

    let label = ic50.map(|v| {
        let y_fraction = label_fraction(0);
        ReferenceLabel {
            compound: sel.compound.clone(),
            text: ic50_label_text(&sel.compound, v),
            color: color.clone(),
            x: v * LABEL_X_FACTOR,
            y_fraction,
            y: y_bounds.0 + (y_bounds.1 - y_bounds.0) * y_fraction,
        }
    });

    Ok(CompoundPlot {
        compound: sel.compound.clone(),
        model: sel.fit.model,
        color,
        marker: marker_for(idx),
        points,
        curve,
        domain,
        ticks: log_ticks(domain),
        y_range: y_bounds,
        ic50,
        dmax,
        label,
    })
}
