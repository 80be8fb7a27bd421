use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use plotters::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// largest image side in pixels
pub const MAX_SIDE: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to plot: {0}")]
    Empty(String),
    #[error("{labels} labels for {columns} trajectories")]
    Shape { labels: usize, columns: usize },
    #[error("image size {width}x{height} is outside 1..={max} pixels per side")]
    Size { width: u32, height: u32, max: u32 },
    #[error("drawing failed: {0}")]
    Drawing(String),
    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] image::ImageError),
    #[error("cannot write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns sampled trajectories into image bytes
pub trait TrajectoryRenderer {
    /// `y` holds one column per label and one row per point of `t`
    fn render(
        &self,
        t: &DVector<f64>,
        y: &DMatrix<f64>,
        labels: &[String],
    ) -> Result<Vec<u8>, RenderError>;
}

/// All trajectories on one chart, encoded as PNG
#[derive(Debug, Clone)]
pub struct PngRenderer {
    pub width: u32,
    pub height: u32,
    pub x_label: String,
    pub y_label: String,
}

impl Default for PngRenderer {
    fn default() -> Self {
        PngRenderer {
            width: 640,
            height: 480,
            x_label: "t".to_string(),
            y_label: "y(t)".to_string(),
        }
    }
}

fn drawing_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}

/// `min..max` of the finite values, widened so that a constant series still gets a range
fn padded_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    let pad = if max > min {
        0.05 * (max - min)
    } else {
        f64::max(0.1 * max.abs(), 1.0)
    };
    Some((min - pad, max + pad))
}

impl PngRenderer {
    /// bytes of the RGB pixel buffer
    fn buffer_size(&self) -> Result<usize, RenderError> {
        let size_error = || RenderError::Size {
            width: self.width,
            height: self.height,
            max: MAX_SIDE,
        };
        let sides = 1..=MAX_SIDE;
        if !sides.contains(&self.width) || !sides.contains(&self.height) {
            return Err(size_error());
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(size_error)
    }

    fn draw(
        &self,
        buffer: &mut [u8],
        t: &DVector<f64>,
        y: &DMatrix<f64>,
        labels: &[String],
        with_text: bool,
    ) -> Result<(), RenderError> {
        let (x_min, x_max) = padded_range(t.iter().copied())
            .ok_or_else(|| RenderError::Empty("no finite time points".to_string()))?;
        let (y_min, y_max) = padded_range(y.iter().copied())
            .ok_or_else(|| RenderError::Empty("no finite values".to_string()))?;

        let root = BitMapBackend::with_buffer(buffer, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_error)?;

        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if with_text {
            builder.x_label_area_size(40).y_label_area_size(60);
        }
        let mut chart = builder
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(drawing_error)?;

        if with_text {
            chart
                .configure_mesh()
                .x_desc(self.x_label.as_str())
                .y_desc(self.y_label.as_str())
                .draw()
                .map_err(drawing_error)?;
        }

        for (col, label) in labels.iter().enumerate() {
            let series: Vec<(f64, f64)> = t
                .iter()
                .zip(y.column(col).iter())
                .filter(|(_, v)| v.is_finite())
                .map(|(&x, &v)| (x, v))
                .collect();
            let drawn = chart
                .draw_series(LineSeries::new(series, &Palette99::pick(col)))
                .map_err(drawing_error)?;
            if with_text {
                drawn.label(label.as_str()).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(col))
                });
            }
        }

        if with_text {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(drawing_error)?;
        }
        root.present().map_err(drawing_error)?;
        Ok(())
    }
}

impl TrajectoryRenderer for PngRenderer {
    fn render(
        &self,
        t: &DVector<f64>,
        y: &DMatrix<f64>,
        labels: &[String],
    ) -> Result<Vec<u8>, RenderError> {
        if labels.is_empty() || t.is_empty() {
            return Err(RenderError::Empty("no trajectories".to_string()));
        }
        if labels.len() != y.ncols() || t.len() != y.nrows() {
            return Err(RenderError::Shape {
                labels: labels.len(),
                columns: y.ncols(),
            });
        }
        let mut buffer = vec![0u8; self.buffer_size()?];
        if let Err(e) = self.draw(&mut buffer, t, y, labels, true) {
            // text needs system fonts; without them the curves alone are still worth showing
            warn!("{}, plotting without labels", e);
            buffer.iter_mut().for_each(|b| *b = 0);
            self.draw(&mut buffer, t, y, labels, false)?;
        }
        let image = image::RgbImage::from_raw(self.width, self.height, buffer)
            .ok_or_else(|| RenderError::Drawing("pixel buffer has the wrong size".to_string()))?;
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
        Ok(png)
    }
}

pub fn save_png(png: &[u8], path: &Path) -> Result<(), RenderError> {
    std::fs::write(path, png)?;
    info!("plot saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

    fn grid() -> DVector<f64> {
        DVector::from_fn(50, |i, _| i as f64 * 0.1)
    }

    #[test]
    fn test_render_two_trajectories() {
        let t = grid();
        let y = DMatrix::from_fn(50, 2, |i, j| {
            let x = i as f64 * 0.1;
            if j == 0 { x.cos() } else { -x.sin() }
        });
        let labels = vec!["solve_ivp: y1".to_string(), "solve_ivp: y2".to_string()];
        let png = PngRenderer::default().render(&t, &y, &labels).unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn test_render_flat_trajectory() {
        let t = grid();
        let y = DMatrix::from_element(50, 1, 1.0);
        let png = PngRenderer::default()
            .render(&t, &y, &["solve_ivp: y1".to_string()])
            .unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn test_render_rejects_bad_shapes() {
        let t = grid();
        let y = DMatrix::from_element(50, 2, 1.0);
        let err = PngRenderer::default()
            .render(&t, &y, &["y1".to_string()])
            .unwrap_err();
        assert!(matches!(err, RenderError::Shape { labels: 1, columns: 2 }));
        let err = PngRenderer::default().render(&t, &y, &[]).unwrap_err();
        assert!(matches!(err, RenderError::Empty(_)));
    }

    #[test]
    fn test_render_rejects_huge_images() {
        let t = grid();
        let y = DMatrix::from_element(50, 1, 1.0);
        let renderer = PngRenderer {
            width: 70_000,
            height: 70_000,
            ..PngRenderer::default()
        };
        let err = renderer.render(&t, &y, &["y1".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Size {
                width: 70_000,
                height: 70_000,
                max: MAX_SIDE
            }
        ));
        let renderer = PngRenderer {
            width: 0,
            ..PngRenderer::default()
        };
        assert!(renderer.render(&t, &y, &["y1".to_string()]).is_err());
        let renderer = PngRenderer {
            width: MAX_SIDE,
            height: 2,
            ..PngRenderer::default()
        };
        assert_eq!(renderer.buffer_size().unwrap(), MAX_SIDE as usize * 6);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        save_png(&PNG_MAGIC, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), PNG_MAGIC.to_vec());
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range([1.0, 1.0].into_iter()), Some((0.0, 2.0)));
        assert_eq!(padded_range([f64::NAN].into_iter()), None);
        let (lo, hi) = padded_range([0.0, 10.0].into_iter()).unwrap();
        assert!(lo < 0.0 && hi > 10.0);
    }
}
