//! High-quality visualization using Plotters
//!
//! Renders the four components of a seasonal decomposition as stacked line
//! charts sharing one time axis. Each panel carries its component name on the
//! y axis and in a legend box; x ticks are formatted as dates. Drawing happens
//! into an RGB buffer, which is then encoded as PNG.
//!
//! Text is rasterised with the bundled DejaVu Sans face, so rendering does not
//! depend on fonts installed on the host.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use lazy_static::lazy_static;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::core::error::{Error, Result};
use crate::time_series::Decomposition;
use crate::vis::config::PlotSettings;

static SANS_FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");

lazy_static! {
    // Registered once per process under the family plotters uses by default
    static ref FONT_REGISTERED: bool =
        register_font("sans-serif", FontStyle::Normal, SANS_FONT).is_ok();
}

fn ensure_font() -> Result<()> {
    if *FONT_REGISTERED {
        Ok(())
    } else {
        Err(Error::Visualization("Bundled font could not be loaded".to_string()))
    }
}

/// Turns a decomposition into image bytes
pub trait DecompositionRenderer {
    /// Render the components against their timestamps
    fn render(&self, timestamps: &[NaiveDateTime], decomposition: &Decomposition)
        -> Result<Vec<u8>>;
}

/// Renderer producing a PNG with observed, trend, seasonal and residual panels
#[derive(Debug, Clone, Default)]
pub struct PlottersPngRenderer {
    settings: PlotSettings,
}

impl PlottersPngRenderer {
    pub fn new(settings: PlotSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlotSettings {
        &self.settings
    }

    /// Draw into a raw RGB buffer of `width * height * 3` bytes
    fn draw(&self, x: &[f64], panels: [(&str, &[f64]); 4]) -> Result<Vec<u8>> {
        ensure_font()?;

        let (width, height) = (self.settings.width, self.settings.height);
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        let format_x = |secs: &f64| {
            DateTime::from_timestamp(*secs as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE)?;

            let areas = root.split_evenly((4, 1));
            let (x_min, x_max) = padded_range(x);

            for (i, (area, (label, y))) in areas.iter().zip(panels).enumerate() {
                let (y_min, y_max) = padded_range(y);

                let mut chart = ChartBuilder::on(area)
                    .margin(self.settings.margin)
                    .x_label_area_size(20)
                    .y_label_area_size(60)
                    .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

                let mut mesh = chart.configure_mesh();
                mesh.x_labels(6).x_label_formatter(&format_x).y_desc(label);
                if !self.settings.show_grid {
                    mesh.disable_mesh();
                }
                mesh.draw()?;

                let (r, g, b) = self.settings.color(i);
                let color = RGBColor(r, g, b);
                chart
                    .draw_series(LineSeries::new(
                        x.iter()
                            .zip(y.iter())
                            .filter(|(_, v)| v.is_finite())
                            .map(|(&x, &y)| (x, y)),
                        color,
                    ))?
                    .label(label)
                    .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], color));

                chart
                    .configure_series_labels()
                    .position(SeriesLabelPosition::UpperRight)
                    .background_style(&WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .draw()?;
            }

            root.present()?;
        }

        Ok(buffer)
    }
}

impl DecompositionRenderer for PlottersPngRenderer {
    fn render(
        &self,
        timestamps: &[NaiveDateTime],
        decomposition: &Decomposition,
    ) -> Result<Vec<u8>> {
        if timestamps.len() != decomposition.len() {
            return Err(Error::Visualization(format!(
                "Got {} timestamps for {} observations",
                timestamps.len(),
                decomposition.len()
            )));
        }
        if self.settings.width == 0 || self.settings.height == 0 {
            return Err(Error::Visualization("Plot size must be positive".to_string()));
        }

        let x: Vec<f64> = timestamps
            .iter()
            .map(|ts| ts.and_utc().timestamp() as f64)
            .collect();

        let buffer = self.draw(
            &x,
            [
                ("Observed", decomposition.observed.as_slice()),
                ("Trend", decomposition.trend.as_slice()),
                ("Seasonal", decomposition.seasonal.as_slice()),
                ("Residual", decomposition.residual.as_slice()),
            ],
        )?;

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            &buffer,
            self.settings.width,
            self.settings.height,
            ExtendedColorType::Rgb8,
        )?;

        log::debug!(
            "rendered decomposition chart {}x{} ({} bytes)",
            self.settings.width,
            self.settings.height,
            png.len()
        );
        Ok(png)
    }
}

/// Standard base64 encoding of image bytes
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::prelude::BASE64_STANDARD.encode(bytes)
}

/// Min and max of the finite values with a 5% margin; never an empty range
fn padded_range(values: &[f64]) -> (f64, f64) {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let span = max - min;
    if span == 0.0 {
        return (min - 1.0, max + 1.0);
    }
    (min - span * 0.05, max + span * 0.05)
}
