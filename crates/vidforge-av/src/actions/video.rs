//! Pixel filters: colour adjustments, blur, sharpen, geometry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::filter_video;
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// One adjustment of ffmpeg's `eq` filter.
///
/// Values are percentages relative to neutral: contrast, saturation and
/// gamma become a factor `1 + v/100`, brightness an offset `v/100`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EqAdjustment {
    Contrast(f64),
    Brightness(f64),
    Saturation(f64),
    Gamma(f64),
}

impl EqAdjustment {
    /// The `eq=...` filter expression.
    pub fn filter(&self) -> String {
        match *self {
            Self::Contrast(v) => format!("eq=contrast={}", 1.0 + v / 100.0),
            Self::Brightness(v) => format!("eq=brightness={}", v / 100.0),
            Self::Saturation(v) => format!("eq=saturation={}", 1.0 + v / 100.0),
            Self::Gamma(v) => format!("eq=gamma={}", 1.0 + v / 100.0),
        }
    }
}

/// Mirror axis for [`flip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipDirection {
    Horizontal,
    Vertical,
}

impl FlipDirection {
    /// The ffmpeg filter name.
    pub fn filter(&self) -> &'static str {
        match self {
            Self::Horizontal => "hflip",
            Self::Vertical => "vflip",
        }
    }
}

impl FromStr for FlipDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "horizontal" | "h" => Ok(Self::Horizontal),
            "vertical" | "v" => Ok(Self::Vertical),
            _ => Err(Error::InvalidInput(format!(
                "flip direction must be 'horizontal' or 'vertical', got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
        }
    }
}

/// A crop rectangle in pixels, offset from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
        }
    }
}

impl CropRect {
    /// The `crop=w:h:x:y` filter expression.
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// `hue=h=<degrees>`; degrees pass through unchanged.
pub fn hue_filter(degrees: f64) -> String {
    format!("hue=h={degrees}")
}

/// Box blur with the radius clamped to `[1, 10]`.
pub fn blur_filter(value: f64) -> String {
    let radius = value.clamp(1.0, 10.0);
    format!("boxblur={radius}:{radius}")
}

/// Unsharp mask with intensity `value/10` clamped to `[0.1, 2.0]`.
pub fn sharpen_filter(value: f64) -> String {
    let amount = (value / 10.0).clamp(0.1, 2.0);
    format!("unsharp=5:5:{amount}:5:5:{amount}")
}

/// Rotation by `degrees`, normalised into `[0, 360)` before conversion to
/// radians, so `rotate(d)` and `rotate(d mod 360)` are the same filter.
pub fn rotate_filter(degrees: f64) -> String {
    let radians = degrees.rem_euclid(360.0).to_radians();
    format!("rotate={radians}")
}

/// Resize; either dimension may be `-1` to keep the aspect ratio.
pub fn scale_filter(width: i32, height: i32) -> String {
    format!("scale={width}:{height}")
}

/// Apply one `eq` adjustment.
pub async fn adjust_eq(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    adjustment: EqAdjustment,
) -> Result<PathBuf> {
    tracing::info!("{} on {:?}", adjustment.filter(), input);
    filter_video(tools, input, output, &adjustment.filter()).await
}

/// Shift the hue by `degrees`.
pub async fn hue(tools: &ToolRegistry, input: &Path, output: &Path, degrees: f64) -> Result<PathBuf> {
    filter_video(tools, input, output, &hue_filter(degrees)).await
}

/// Blur with a box filter.
pub async fn blur(tools: &ToolRegistry, input: &Path, output: &Path, value: f64) -> Result<PathBuf> {
    filter_video(tools, input, output, &blur_filter(value)).await
}

/// Sharpen with an unsharp mask.
pub async fn sharpen(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    value: f64,
) -> Result<PathBuf> {
    filter_video(tools, input, output, &sharpen_filter(value)).await
}

/// Rotate the picture by `degrees`.
pub async fn rotate(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    degrees: f64,
) -> Result<PathBuf> {
    tracing::info!("rotate {:?} by {degrees} degrees", input);
    filter_video(tools, input, output, &rotate_filter(degrees)).await
}

/// Mirror the picture.
pub async fn flip(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    direction: FlipDirection,
) -> Result<PathBuf> {
    tracing::info!("flip {:?} {direction}", input);
    filter_video(tools, input, output, direction.filter()).await
}

/// Crop to a rectangle.
pub async fn crop(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    rect: CropRect,
) -> Result<PathBuf> {
    tracing::info!(
        "crop {:?} to {}x{} at ({},{})",
        input,
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );
    filter_video(tools, input, output, &rect.filter()).await
}

/// Resize the picture.
pub async fn scale(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    width: i32,
    height: i32,
) -> Result<PathBuf> {
    tracing::info!("scale {:?} to {width}x{height}", input);
    filter_video(tools, input, output, &scale_filter(width, height)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_factors() {
        assert_eq!(EqAdjustment::Contrast(20.0).filter(), "eq=contrast=1.2");
        assert_eq!(EqAdjustment::Contrast(-50.0).filter(), "eq=contrast=0.5");
        assert_eq!(EqAdjustment::Saturation(100.0).filter(), "eq=saturation=2");
        assert_eq!(EqAdjustment::Gamma(0.0).filter(), "eq=gamma=1");
        assert_eq!(EqAdjustment::Brightness(10.0).filter(), "eq=brightness=0.1");
        assert_eq!(EqAdjustment::Brightness(-25.0).filter(), "eq=brightness=-0.25");
    }

    #[test]
    fn hue_passes_degrees_through() {
        assert_eq!(hue_filter(-90.0), "hue=h=-90");
        assert_eq!(hue_filter(45.5), "hue=h=45.5");
    }

    #[test]
    fn blur_radius_is_clamped() {
        assert_eq!(blur_filter(0.0), "boxblur=1:1");
        assert_eq!(blur_filter(5.0), "boxblur=5:5");
        assert_eq!(blur_filter(50.0), "boxblur=10:10");
    }

    #[test]
    fn sharpen_intensity_is_clamped() {
        assert_eq!(sharpen_filter(0.0), "unsharp=5:5:0.1:5:5:0.1");
        assert_eq!(sharpen_filter(15.0), "unsharp=5:5:1.5:5:5:1.5");
        assert_eq!(sharpen_filter(100.0), "unsharp=5:5:2:5:5:2");
    }

    #[test]
    fn rotation_is_normalised_modulo_360() {
        assert_eq!(rotate_filter(450.0), rotate_filter(90.0));
        assert_eq!(rotate_filter(-270.0), rotate_filter(90.0));
        assert_eq!(rotate_filter(720.0), rotate_filter(0.0));
        assert_eq!(rotate_filter(0.0), "rotate=0");
        assert_eq!(
            rotate_filter(90.0),
            format!("rotate={}", std::f64::consts::FRAC_PI_2)
        );
    }

    #[test]
    fn flip_direction_parsing_is_case_insensitive() {
        for s in ["Horizontal", "h", "HORIZONTAL", "H"] {
            assert_eq!(s.parse::<FlipDirection>().unwrap(), FlipDirection::Horizontal);
        }
        for s in ["vertical", "V"] {
            assert_eq!(s.parse::<FlipDirection>().unwrap(), FlipDirection::Vertical);
        }
        let err = "diagonal".parse::<FlipDirection>().unwrap_err();
        assert!(err.to_string().contains("diagonal"));
    }

    #[test]
    fn flip_filters() {
        assert_eq!(FlipDirection::Horizontal.filter(), "hflip");
        assert_eq!(FlipDirection::Vertical.filter(), "vflip");
    }

    #[test]
    fn crop_defaults_and_filter() {
        let rect = CropRect::default();
        assert_eq!(rect.filter(), "crop=640:480:0:0");
        let rect = CropRect {
            x: 10,
            y: 20,
            width: 320,
            height: 240,
        };
        assert_eq!(rect.filter(), "crop=320:240:10:20");
    }

    #[test]
    fn scale_keeps_aspect_marker() {
        assert_eq!(scale_filter(1280, -1), "scale=1280:-1");
        assert_eq!(scale_filter(-1, 720), "scale=-1:720");
    }
}
