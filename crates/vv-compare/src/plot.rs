//! Difference plots for variables that are not bit for bit.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use ndarray::{ArrayD, ArrayViewD, Axis};
use tracing::{debug, warn};

use crate::case::CaseKey;
use crate::settings::VERIFICATION_DIR;

/// Everything a sink needs to draw one mismatching variable.
#[derive(Debug, Clone, Copy)]
pub struct PlotRequest<'a> {
    pub case_name: &'a str,
    pub case_key: &'a CaseKey,
    /// Output file the variable came from.
    pub file: &'a str,
    pub variable: &'a str,
    pub model: &'a ArrayD<f64>,
    pub bench: &'a ArrayD<f64>,
    pub diff: &'a ArrayD<f64>,
}

/// Receives plot requests and returns an opaque reference to the artifact,
/// or `None` if nothing was produced.
pub trait PlotSink: Sync {
    fn plot(&self, request: &PlotRequest<'_>) -> Option<String>;
}

/// Pixel size of one array cell; grids wider than this many cells are drawn
/// one pixel per cell.
const MAX_CELL_PX: u32 = 8;
const TARGET_WIDTH_PX: u32 = 480;
const PANEL_GAP_PX: u32 = 4;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const NAN_COLOR: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// Anchor colours of the sequential map used for model and benchmark panels.
const SEQUENTIAL: [[u8; 3]; 5] = [
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

/// Anchor colours of the diverging map used for the difference panel.
const DIVERGING: [[u8; 3]; 3] = [[33, 102, 172], [247, 247, 247], [178, 24, 43]];

/// Renders model, benchmark and difference as three stacked PNG heat maps.
#[derive(Debug, Clone)]
pub struct PngPlotter {
    output_root: PathBuf,
}

impl PngPlotter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Path of the plot for `request`, relative to the output root. Each
    /// key segment is a directory, as in the run tree itself.
    pub fn relative_path(request: &PlotRequest<'_>) -> String {
        let stem = Path::new(request.file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.file.to_string());
        let mut parts = vec![VERIFICATION_DIR.to_string(), sanitize(request.case_name)];
        parts.extend(request.case_key.segments().iter().cloned());
        parts.push(format!("{}.png", sanitize(&format!("{}_{}", stem, request.variable))));
        parts.join("/")
    }

    fn render(request: &PlotRequest<'_>) -> Option<RgbaImage> {
        let model = Grid::from_array(request.model)?;
        let bench = Grid::from_array(request.bench)?;
        let diff = Grid::from_array(request.diff)?;

        let (lo, hi) = value_range(model.values.iter().chain(&bench.values));
        let spread = diff
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0f64, |acc, v| acc.max(v.abs()));

        let cols = u32::try_from(model.cols).ok()?;
        let cell = (TARGET_WIDTH_PX / cols.max(1)).clamp(1, MAX_CELL_PX);
        let width = cols.checked_mul(cell)?;
        let panel_height = u32::try_from(model.rows).ok()?.checked_mul(cell)?;
        let height = panel_height.checked_mul(3)?.checked_add(2 * PANEL_GAP_PX)?;
        if width == 0 || panel_height == 0 {
            return None;
        }

        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
        let step = panel_height + PANEL_GAP_PX;
        draw_panel(&mut canvas, &model, 0, cell, |v| sequential(v, lo, hi));
        draw_panel(&mut canvas, &bench, step, cell, |v| sequential(v, lo, hi));
        draw_panel(&mut canvas, &diff, 2 * step, cell, |v| diverging(v, spread));
        Some(canvas)
    }
}

impl PlotSink for PngPlotter {
    fn plot(&self, request: &PlotRequest<'_>) -> Option<String> {
        let relative = Self::relative_path(request);
        let Some(canvas) = Self::render(request) else {
            warn!(
                "Cannot plot `{}` from {}: unsupported array shape {:?}",
                request.variable,
                request.file,
                request.model.shape()
            );
            return None;
        };

        let path = self.output_root.join(&relative);
        if let Some(parent) = path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warn!("Could not create {}: {}", parent.display(), e);
            return None;
        }
        match canvas.save(&path) {
            Ok(()) => {
                debug!("Wrote plot {}", path.display());
                Some(relative)
            }
            Err(e) => {
                warn!("Could not write plot {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// A 2-D row-major view of an array for drawing.
struct Grid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Grid {
    /// Reduce an array to its last 2-D slice. Rank 1 becomes a single row.
    fn from_array(array: &ArrayD<f64>) -> Option<Self> {
        let mut view: ArrayViewD<'_, f64> = array.view();
        while view.ndim() > 2 {
            let last = view.len_of(Axis(0)).checked_sub(1)?;
            view = view.index_axis_move(Axis(0), last);
        }
        let (rows, cols) = match view.shape() {
            [] => (1, 1),
            [n] => (1, *n),
            [r, c] => (*r, *c),
            _ => return None,
        };
        if rows == 0 || cols == 0 {
            return None;
        }
        Some(Self {
            rows,
            cols,
            values: view.iter().copied().collect(),
        })
    }
}

fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi { (0.0, 0.0) } else { (lo, hi) }
}

fn draw_panel(
    canvas: &mut RgbaImage,
    grid: &Grid,
    top: u32,
    cell: u32,
    color: impl Fn(f64) -> Rgba<u8>,
) {
    for (idx, &v) in grid.values.iter().enumerate() {
        let row = (idx / grid.cols) as u32;
        let col = (idx % grid.cols) as u32;
        fill_rect(canvas, col * cell, top + row * cell, cell, cell, color(v));
    }
}

fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (cw, ch) = (canvas.width(), canvas.height());
    for py in y..y.saturating_add(h).min(ch) {
        for px in x..x.saturating_add(w).min(cw) {
            canvas.put_pixel(px, py, color);
        }
    }
}

fn sequential(v: f64, lo: f64, hi: f64) -> Rgba<u8> {
    if !v.is_finite() {
        return NAN_COLOR;
    }
    let t = if hi > lo { (v - lo) / (hi - lo) } else { 0.5 };
    interpolate(&SEQUENTIAL, t)
}

/// Zero maps to the midpoint; `spread` maps to either end.
fn diverging(v: f64, spread: f64) -> Rgba<u8> {
    if !v.is_finite() {
        return NAN_COLOR;
    }
    let t = if spread > 0.0 { 0.5 + 0.5 * v / spread } else { 0.5 };
    interpolate(&DIVERGING, t)
}

fn interpolate(anchors: &[[u8; 3]], t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let segments = (anchors.len() - 1) as f64;
    let pos = t * segments;
    let i = (pos.floor() as usize).min(anchors.len() - 2);
    let frac = pos - i as f64;
    let (a, b) = (anchors[i], anchors[i + 1]);
    let mix = |k: usize| (a[k] as f64 + (b[k] as f64 - a[k] as f64) * frac).round() as u8;
    Rgba([mix(0), mix(1), mix(2), 255])
}

/// Keep file names portable.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{IxDyn, arr2};

    fn request<'a>(
        key: &'a CaseKey,
        model: &'a ArrayD<f64>,
        bench: &'a ArrayD<f64>,
        diff: &'a ArrayD<f64>,
    ) -> PlotRequest<'a> {
        PlotRequest {
            case_name: "dome",
            case_key: key,
            file: "dome.0031.nc",
            variable: "thk",
            model,
            bench,
            diff,
        }
    }

    #[test]
    fn test_relative_path() {
        let key = CaseKey::new(vec!["s1".into(), "r2".into()]);
        let a = ArrayD::zeros(IxDyn(&[1]));
        let req = request(&key, &a, &a, &a);
        assert_eq!(
            PngPlotter::relative_path(&req),
            "Verification/dome/s1/r2/dome.0031_thk.png"
        );

        let dashed = CaseKey::new(vec!["s1-r2".into()]);
        let req = request(&dashed, &a, &a, &a);
        assert_eq!(
            PngPlotter::relative_path(&req),
            "Verification/dome/s1-r2/dome.0031_thk.png"
        );

        let root = CaseKey::default();
        let req = request(&root, &a, &a, &a);
        assert_eq!(
            PngPlotter::relative_path(&req),
            "Verification/dome/dome.0031_thk.png"
        );
    }

    #[test]
    fn test_grid_takes_last_slice() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 2, 3]), (0..12).map(f64::from).collect())
            .unwrap();
        let grid = Grid::from_array(&array).unwrap();
        assert_eq!((grid.rows, grid.cols), (2, 3));
        assert_eq!(grid.values, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);

        let row = ArrayD::from_shape_vec(IxDyn(&[4]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let grid = Grid::from_array(&row).unwrap();
        assert_eq!((grid.rows, grid.cols), (1, 4));

        let empty = ArrayD::<f64>::zeros(IxDyn(&[0, 3, 3]));
        assert!(Grid::from_array(&empty).is_none());
    }

    #[test]
    fn test_colour_maps() {
        assert_eq!(diverging(0.0, 2.0), Rgba([247, 247, 247, 255]));
        assert_eq!(diverging(-2.0, 2.0), Rgba([33, 102, 172, 255]));
        assert_eq!(diverging(5.0, 2.0), Rgba([178, 24, 43, 255]));
        assert_eq!(sequential(0.0, 0.0, 1.0), Rgba([68, 1, 84, 255]));
        assert_eq!(sequential(1.0, 0.0, 1.0), Rgba([253, 231, 37, 255]));
        assert_eq!(sequential(f64::NAN, 0.0, 1.0), NAN_COLOR);
    }

    #[test]
    fn test_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = PngPlotter::new(dir.path());
        let key = CaseKey::new(vec!["s1".into()]);
        let model = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        let bench = arr2(&[[1.0, 2.0], [3.0, 5.0]]).into_dyn();
        let diff = &model - &bench;

        let reference = plotter.plot(&request(&key, &model, &bench, &diff)).unwrap();
        assert_eq!(reference, "Verification/dome/s1/dome.0031_thk.png");

        let written = image::open(dir.path().join(&reference)).unwrap();
        assert_eq!(written.width(), 2 * MAX_CELL_PX);
        assert_eq!(written.height(), 3 * 2 * MAX_CELL_PX + 2 * PANEL_GAP_PX);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a b/c"), "a_b_c");
        assert_eq!(sanitize("dome.0031"), "dome.0031");
    }
}
