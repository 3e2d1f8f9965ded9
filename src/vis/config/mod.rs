//! Configuration for visualization functionality
//!
//! This module provides the settings used when rendering decomposition charts.

/// Plot settings for bitmap charts
#[derive(Debug, Clone)]
pub struct PlotSettings {
    /// Width of the image (pixels)
    pub width: u32,
    /// Height of the image (pixels)
    pub height: u32,
    /// Margin around each panel (pixels)
    pub margin: u32,
    /// Show grid
    pub show_grid: bool,
    /// Line color per panel, reused cyclically
    pub color_palette: Vec<(u8, u8, u8)>,
}

impl PlotSettings {
    /// Settings with the given image size and default styling
    pub fn with_size(width: u32, height: u32) -> Self {
        PlotSettings {
            width,
            height,
            ..Default::default()
        }
    }

    /// Color for the `i`-th panel
    pub fn color(&self, i: usize) -> (u8, u8, u8) {
        if self.color_palette.is_empty() {
            (0, 0, 0)
        } else {
            self.color_palette[i % self.color_palette.len()]
        }
    }
}

impl Default for PlotSettings {
    fn default() -> Self {
        PlotSettings {
            width: 1000,
            height: 800,
            margin: 10,
            show_grid: true,
            color_palette: vec![
                (0, 123, 255),  // Blue
                (255, 99, 71),  // Red
                (46, 204, 113), // Green
                (142, 68, 173), // Purple
            ],
        }
    }
}
