//! Minimal PNG rendering of analysis results
//!
//! Plots are drawn straight into an RGB pixel buffer: a frame, the data, and
//! nothing else. Titles and axis labels live in the store next to the data.

use crate::{
    efficiency::EfficiencyCurve,
    histogram::{to_float, Hist1D, Hist2D},
    numeric::Float,
    Result,
};
use eyre::WrapErr;
use image::{Rgb, RgbImage};
use std::path::Path;

/// Image width in pixels
const WIDTH: u32 = 800;

/// Image height in pixels
const HEIGHT: u32 = 600;

/// Space between the image border and the plot frame
const MARGIN: u32 = 60;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);

/// Line colors of successive overlaid series
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([214, 39, 40]),
    Rgb([44, 160, 44]),
    Rgb([148, 103, 189]),
    Rgb([255, 127, 14]),
    Rgb([23, 190, 207]),
];

/// Viridis anchor points, as (scalar, R, G, B)
const VIRIDIS: [(Float, u8, u8, u8); 5] = [
    (0.00, 68, 1, 84),
    (0.25, 59, 82, 139),
    (0.50, 33, 145, 140),
    (0.75, 94, 201, 98),
    (1.00, 253, 231, 37),
];

/// Line color of the n-th overlaid series
pub fn series_color(idx: usize) -> Rgb<u8> {
    PALETTE[idx % PALETTE.len()]
}

/// Mapping from data coordinates to pixels
#[derive(Clone, Copy, Debug)]
struct Frame {
    x: (Float, Float),
    y: (Float, Float),
    log_y: bool,
}
//
impl Frame {
    fn new(x: (Float, Float), y: (Float, Float), log_y: bool) -> Self {
        let y = if log_y {
            (y.0.max(Float::MIN_POSITIVE).log10(), y.1.max(Float::MIN_POSITIVE).log10())
        } else {
            y
        };
        Self { x, y, log_y }
    }

    fn px(&self, x: Float) -> i64 {
        let frac = (x - self.x.0) / (self.x.1 - self.x.0);
        clamp_px(MARGIN as i64 + (frac * (WIDTH - 2 * MARGIN) as Float).round() as i64)
    }

    fn py(&self, y: Float) -> i64 {
        let y = if self.log_y {
            if y <= 0. {
                return (HEIGHT - MARGIN) as i64;
            }
            y.log10()
        } else {
            y
        };
        let frac = (y - self.y.0) / (self.y.1 - self.y.0);
        clamp_px((HEIGHT - MARGIN) as i64 - (frac * (HEIGHT - 2 * MARGIN) as Float).round() as i64)
    }
}

/// Keep far off-frame coordinates in a band around the image, so that lines
/// towards them stay short
fn clamp_px(coord: i64) -> i64 {
    coord.clamp(-(WIDTH as i64), 2 * WIDTH as i64)
}

/// Pixel buffer with a plot frame
struct Canvas {
    image: RgbImage,
}
//
impl Canvas {
    fn new() -> Self {
        let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
        let (lo, hi) = (MARGIN as i64, (WIDTH - MARGIN) as i64);
        let (bottom, top) = ((HEIGHT - MARGIN) as i64, MARGIN as i64);
        for x in lo..=hi {
            put(&mut image, x, bottom, AXIS);
            put(&mut image, x, top, AXIS);
        }
        for y in top..=bottom {
            put(&mut image, lo, y, AXIS);
            put(&mut image, hi, y, AXIS);
        }
        Self { image }
    }

    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = ((x1 - x0).signum(), (y1 - y0).signum());
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.plot(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn fill_rect(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
        for x in x0.min(x1)..=x0.max(x1) {
            for y in y0.min(y1)..=y0.max(y1) {
                self.plot(x, y, color);
            }
        }
    }

    fn marker(&mut self, (x, y): (i64, i64), color: Rgb<u8>) {
        self.fill_rect((x - 2, y - 2), (x + 2, y + 2), color);
    }

    /// Draw within the plot frame only
    fn plot(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        let inside_x = (MARGIN as i64..=(WIDTH - MARGIN) as i64).contains(&x);
        let inside_y = (MARGIN as i64..=(HEIGHT - MARGIN) as i64).contains(&y);
        if inside_x && inside_y {
            put(&mut self.image, x, y, color);
        }
    }

    fn save(self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .wrap_err_with(|| format!("Failed to write plot {}", path.display()))
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
        if x < image.width() && y < image.height() {
            image.put_pixel(x, y, color);
        }
    }
}

/// A step curve: one (low edge, high edge, height) triplet per bin
pub type Steps = Vec<(Float, Float, Float)>;

/// A point series: (x, y, optional (low, high) error bar) per point
pub type Points = Vec<(Float, Float, Option<(Float, Float)>)>;

/// One series of an overlay
#[derive(Clone, Debug, PartialEq)]
pub enum Series {
    /// Histogram contents
    Steps(Steps),

    /// Ratio curve
    Points(Points),
}

fn draw_steps(canvas: &mut Canvas, frame: &Frame, steps: &Steps, color: Rgb<u8>) {
    let mut previous: Option<(i64, i64)> = None;
    for &(lo, hi, height) in steps {
        let (x0, x1, y) = (frame.px(lo), frame.px(hi), frame.py(height));
        if let Some(end) = previous {
            canvas.line(end, (x0, y), color);
        }
        canvas.line((x0, y), (x1, y), color);
        previous = Some((x1, y));
    }
}

fn draw_points(canvas: &mut Canvas, frame: &Frame, points: &Points, color: Rgb<u8>) {
    for &(x, y, interval) in points {
        let center = (frame.px(x), frame.py(y));
        if let Some((lo, hi)) = interval {
            canvas.line((center.0, frame.py(lo)), (center.0, frame.py(hi)), color);
        }
        canvas.marker(center, color);
    }
}

/// Vertical range fitting some non-negative heights
fn height_range(heights: impl Iterator<Item = Float>, log_y: bool) -> (Float, Float) {
    let (min, max) = heights
        .filter(|&h| h > 0.)
        .fold((Float::INFINITY, 0.), |(lo, hi): (Float, Float), h| {
            (lo.min(h), hi.max(h))
        });
    if max <= 0. {
        return if log_y { (0.5, 2.) } else { (0., 1.05) };
    }
    if log_y {
        (min * 0.5, max * 2.)
    } else {
        (0., max * 1.05)
    }
}

/// Draw a 1D histogram as filled bars
pub fn render_hist1d(hist: &Hist1D, log_y: bool, path: &Path) -> Result<()> {
    let binning = hist.binning;
    let heights = hist.counts().iter().map(|&count| to_float(count));
    let frame = Frame::new((binning.lo, binning.hi), height_range(heights, log_y), log_y);
    let mut canvas = Canvas::new();
    for (bin, &count) in hist.counts().iter().enumerate() {
        if count == 0 {
            continue;
        }
        let top_left = (frame.px(binning.low_edge(bin)), frame.py(to_float(count)));
        let bottom_right = (frame.px(binning.up_edge(bin)), (HEIGHT - MARGIN) as i64);
        canvas.fill_rect(top_left, bottom_right, PALETTE[0]);
    }
    canvas.save(path)
}

/// Color of a 2D bin, on a logarithmic scale where empty bins stay blank
fn heat_color(count: u64, max: u64) -> Option<Rgb<u8>> {
    if count == 0 {
        return None;
    }
    let scale = if max > 1 {
        (to_float(count).log10() / to_float(max).log10()).clamp(0., 1.)
    } else {
        1.
    };
    let upper_idx = VIRIDIS
        .iter()
        .position(|&(s, ..)| s >= scale)
        .unwrap_or(VIRIDIS.len() - 1)
        .max(1);
    let (s0, r0, g0, b0) = VIRIDIS[upper_idx - 1];
    let (s1, r1, g1, b1) = VIRIDIS[upper_idx];
    let t = (scale - s0) / (s1 - s0);
    let lerp = |a: u8, b: u8| (Float::from(a) + t * (Float::from(b) - Float::from(a))).round() as u8;
    Some(Rgb([lerp(r0, r1), lerp(g0, g1), lerp(b0, b1)]))
}

/// Draw a 2D histogram as a heat map
pub fn render_hist2d(hist: &Hist2D, path: &Path) -> Result<()> {
    let (xb, yb) = (hist.x_binning, hist.y_binning);
    let frame = Frame::new((xb.lo, xb.hi), (yb.lo, yb.hi), false);
    let max = hist.max_count();
    let mut canvas = Canvas::new();
    for iy in 0..yb.bins {
        for ix in 0..xb.bins {
            if let Some(color) = heat_color(hist.count(ix, iy), max) {
                canvas.fill_rect(
                    (frame.px(xb.low_edge(ix)), frame.py(yb.up_edge(iy))),
                    (frame.px(xb.up_edge(ix)), frame.py(yb.low_edge(iy))),
                    color,
                );
            }
        }
    }
    canvas.save(path)
}

/// Points of a ratio curve, leaving out bins where it is undefined
pub fn curve_points(curve: &EfficiencyCurve) -> Points {
    (curve.points.iter().enumerate())
        .filter_map(|(bin, point)| {
            point
                .ratio
                .map(|ratio| (curve.binning.center(bin), ratio, point.interval))
        })
        .collect()
}

/// Draw a ratio curve as points with error bars, on a [0, 1.05] scale
pub fn render_efficiency(curve: &EfficiencyCurve, path: &Path) -> Result<()> {
    let frame = Frame::new((curve.binning.lo, curve.binning.hi), (0., 1.05), false);
    let mut canvas = Canvas::new();
    draw_points(&mut canvas, &frame, &curve_points(curve), PALETTE[0]);
    canvas.save(path)
}

/// Draw several series on common axes
///
/// Step series set the vertical scale from their highest bin, point series
/// use a [0, 1.05] scale.
pub fn render_overlay(
    series: &[Series],
    x_range: (Float, Float),
    log_y: bool,
    path: &Path,
) -> Result<()> {
    let heights = series.iter().flat_map(|s| match s {
        Series::Steps(steps) => steps.iter().map(|&(_, _, h)| h).collect(),
        Series::Points(_) => Vec::new(),
    });
    let has_steps = series.iter().any(|s| matches!(s, Series::Steps(_)));
    let y_range = if has_steps {
        height_range(heights, log_y)
    } else {
        (0., 1.05)
    };
    let frame = Frame::new(x_range, y_range, log_y && has_steps);
    let mut canvas = Canvas::new();
    for (idx, s) in series.iter().enumerate() {
        let color = series_color(idx);
        match s {
            Series::Steps(steps) => draw_steps(&mut canvas, &frame, steps, color),
            Series::Points(points) => draw_points(&mut canvas, &frame, points, color),
        }
    }
    canvas.save(path)
}
