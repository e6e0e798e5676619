//! ASCII plotting for terminal output.
//!
//! A fixed-size character grid with deterministic output. The concentration
//! axis is logarithmic. Plot elements:
//! - observed points: the series marker glyph (`o`, `s`, `^`, ...)
//! - fitted curve: `-` line
//! - IC50 reference: `|` column, Dmax reference: `.` row

use crate::plot::spec::{CompoundPlot, PlotSpec};
use crate::plot::overlay::OverlaySpec;

struct Layer<'a> {
    points: &'a [(f64, f64)],
    curve: &'a [(f64, f64)],
    glyph: char,
}

struct Frame<'a> {
    x_label: &'a str,
    y_label: &'a str,
    domain: (f64, f64),
    ticks: &'a [f64],
    y_range: (f64, f64),
    vlines: Vec<f64>,
    hlines: Vec<f64>,
}

/// Render one compound's chart.
pub fn render_compound_plot(spec: &PlotSpec, plot: &CompoundPlot, width: usize, height: usize) -> String {
    let frame = Frame {
        x_label: &spec.concentration_label,
        y_label: &spec.response_label,
        domain: plot.domain,
        ticks: &plot.ticks,
        y_range: plot.y_range,
        vlines: plot.ic50.into_iter().collect(),
        hlines: plot.dmax.into_iter().collect(),
    };
    let layers = [Layer {
        points: &plot.points,
        curve: &plot.curve.points,
        glyph: plot.marker.glyph(),
    }];

    let mut out = format!("{} ({})\n", plot.compound, plot.model);
    out.push_str(&render_plot(&frame, &layers, width, height));
    if let Some(label) = &plot.label {
        out.push_str(&format!("  {}\n", label.text));
    }
    if let Some(d) = plot.dmax {
        out.push_str(&format!("  Dmax = {d:.3}\n"));
    }
    out
}

/// Render the multi-compound overlay.
pub fn render_overlay(spec: &PlotSpec, overlay: &OverlaySpec, width: usize, height: usize) -> String {
    let frame = Frame {
        x_label: &spec.concentration_label,
        y_label: &spec.response_label,
        domain: overlay.domain,
        ticks: &overlay.ticks,
        y_range: overlay.y_range,
        vlines: overlay.series.iter().filter_map(|s| s.ic50).collect(),
        hlines: Vec::new(),
    };
    let layers: Vec<Layer<'_>> = overlay
        .series
        .iter()
        .map(|s| Layer {
            points: &s.points,
            curve: &s.curve.points,
            glyph: s.marker.glyph(),
        })
        .collect();

    let mut out = String::from("Overlay\n");
    out.push_str(&render_plot(&frame, &layers, width, height));
    for s in &overlay.series {
        out.push_str(&format!("  {} {} ({})\n", s.marker.glyph(), s.compound, s.model));
    }
    for label in &overlay.labels {
        out.push_str(&format!("  {}\n", label.text));
    }
    out
}

fn render_plot(frame: &Frame<'_>, layers: &[Layer<'_>], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let (x_min, x_max) = frame.domain;
    let (y_min, y_max) = frame.y_range;

    let mut grid = vec![vec![' '; width]; height];

    // Curves first so points can overlay.
    for layer in layers {
        draw_curve(&mut grid, layer.curve, frame.domain, frame.y_range);
    }
    for &v in &frame.vlines {
        if v > x_min && v < x_max {
            let x = map_x(v, x_min, x_max, width);
            for row in grid.iter_mut() {
                if row[x] == ' ' {
                    row[x] = '|';
                }
            }
        }
    }
    for &h in &frame.hlines {
        if h > y_min && h < y_max {
            let y = map_y(h, y_min, y_max, height);
            for cell in grid[y].iter_mut() {
                if *cell == ' ' {
                    *cell = '.';
                }
            }
        }
    }
    for layer in layers {
        for &(px, py) in layer.points {
            if px > 0.0 && py.is_finite() {
                let x = map_x(px, x_min, x_max, width);
                let y = map_y(py, y_min, y_max, height);
                grid[y][x] = layer.glyph;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {}=[{x_min}, {x_max}] (log) | {}=[{y_min:.2}, {y_max:.2}]\n",
        frame.x_label, frame.y_label
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    if !frame.ticks.is_empty() {
        let ticks: Vec<String> = frame.ticks.iter().map(|t| t.to_string()).collect();
        out.push_str(&format!("ticks: {}\n", ticks.join(", ")));
    }
    out
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let (l0, l1) = (x_min.ln(), x_max.ln());
    let u = ((x.ln() - l0) / (l1 - l0)).clamp(0.0, 1.0);
    let u = if u.is_finite() { u } else { 0.0 };
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    let u = if u.is_finite() { u } else { 0.0 };
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], domain: (f64, f64), y_range: (f64, f64)) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x > 0.0 && y.is_finite()) {
            prev = None;
            continue;
        }
        let cx = map_x(x, domain.0, domain.1, width);
        let cy = map_y(y, y_range.0, y_range.1, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, cx, cy, '-');
        } else if grid[cy][cx] == ' ' {
            grid[cy][cx] = '-';
        }
        prev = Some((cx, cy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
