//! Viewer configuration: the loose host property bag and its validated form.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Largest accepted panel edge, in pixels
pub const MAX_DIMENSION: f64 = 4096.0;

/// An opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::from_hex(0xffffff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Parse `#rrggbb`, `#rgb`, or the same without the leading `#`
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let digits = value.strip_prefix('#').unwrap_or(value);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match digits.len() {
            6 => u32::from_str_radix(digits, 16).ok().map(Self::from_hex),
            3 => {
                let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16).ok().map(Self::from_hex)
            }
            _ => None,
        }
    }

    /// Channels scaled to `0.0..=1.0`
    pub fn to_vector(&self) -> Vector3<f32> {
        Vector3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    pub fn to_rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s).ok_or_else(|| ConfigurationError::InvalidColor {
            field: "color",
            value: s.to_string(),
        })
    }
}

/// A color as a host may express it: a CSS-style hex string or a `0xRRGGBB` number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Hex(u32),
    Css(String),
}

impl ColorValue {
    fn resolve(&self, field: &'static str) -> Result<Color, ConfigurationError> {
        match self {
            ColorValue::Hex(hex) if *hex <= 0xffffff => Ok(Color::from_hex(*hex)),
            ColorValue::Hex(hex) => Err(ConfigurationError::InvalidColor {
                field,
                value: format!("{hex:#x}"),
            }),
            ColorValue::Css(css) => Color::parse(css).ok_or_else(|| {
                ConfigurationError::InvalidColor {
                    field,
                    value: css.clone(),
                }
            }),
        }
    }
}

impl From<Color> for ColorValue {
    fn from(color: Color) -> Self {
        ColorValue::Css(color.to_string())
    }
}

/// Host-provided viewer properties, as read from a JSON property bag.
///
/// Missing keys take the defaults below; nothing is checked until
/// [`ViewerProps::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerProps {
    pub url: String,
    pub width: f64,
    pub height: f64,
    pub model_color: ColorValue,
    pub background_color: ColorValue,
    pub orbit_controls: bool,
    pub rotate: bool,
    pub camera_x: f32,
    pub camera_y: f32,
    pub camera_z: Option<f32>,
    pub rotation_speeds: Vec<f32>,
    pub light_x: f32,
    pub light_y: f32,
    pub light_z: f32,
    pub light_color: ColorValue,
}

impl Default for ViewerProps {
    fn default() -> Self {
        Self {
            url: String::new(),
            width: 400.0,
            height: 400.0,
            model_color: ColorValue::Css("#B92C2C".to_string()),
            background_color: ColorValue::Css("#EAEAEA".to_string()),
            orbit_controls: true,
            rotate: true,
            camera_x: 0.0,
            camera_y: 0.0,
            camera_z: None,
            rotation_speeds: vec![0.0, 0.0, 0.02],
            light_x: 0.0,
            light_y: 0.0,
            light_z: 1.0,
            light_color: ColorValue::Css("#ffffff".to_string()),
        }
    }
}

impl ViewerProps {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }

    pub fn validate(&self) -> Result<ViewerConfig, ConfigurationError> {
        if self.url.trim().is_empty() {
            return Err(ConfigurationError::EmptyUrl);
        }

        let width = dimension("width", self.width)?;
        let height = dimension("height", self.height)?;

        let rotation_speeds = match self.rotation_speeds.as_slice() {
            &[x, y, z] if [x, y, z].iter().all(|v| v.is_finite()) => [x, y, z],
            _ if self.rotate => {
                return Err(ConfigurationError::InvalidRotationSpeeds(
                    self.rotation_speeds.clone(),
                ))
            }
            _ => [0.0; 3],
        };

        let camera = CameraPlacement {
            x: finite("cameraX", self.camera_x)?,
            y: finite("cameraY", self.camera_y)?,
            z: self.camera_z.map(|z| finite("cameraZ", z)).transpose()?,
        };
        if camera.z == Some(0.0) && camera.x == 0.0 && camera.y == 0.0 {
            return Err(ConfigurationError::CameraAtTarget);
        }

        let light_position = Point3::new(
            finite("lightX", self.light_x)?,
            finite("lightY", self.light_y)?,
            finite("lightZ", self.light_z)?,
        );

        Ok(ViewerConfig {
            url: self.url.trim().to_string(),
            width,
            height,
            model_color: self.model_color.resolve("modelColor")?,
            background_color: self.background_color.resolve("backgroundColor")?,
            orbit_controls: self.orbit_controls,
            rotate: self.rotate,
            camera,
            rotation_speeds,
            light_position,
            light_color: self.light_color.resolve("lightColor")?,
        })
    }
}

fn dimension(field: &'static str, value: f64) -> Result<u32, ConfigurationError> {
    let rounded = value.round();
    if !value.is_finite() || rounded < 1.0 || rounded > MAX_DIMENSION {
        return Err(ConfigurationError::InvalidDimension { field, value });
    }
    Ok(rounded as u32)
}

fn finite(field: &'static str, value: f32) -> Result<f32, ConfigurationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigurationError::NonFinite(field))
    }
}

/// Camera position; `z == None` means "derive from the model's size"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPlacement {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

/// Validated, immutable viewer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub model_color: Color,
    pub background_color: Color,
    pub orbit_controls: bool,
    pub rotate: bool,
    pub camera: CameraPlacement,
    pub rotation_speeds: [f32; 3],
    pub light_position: Point3<f32>,
    pub light_color: Color,
}

impl ViewerConfig {
    /// Re-check the invariants a hand-built config could break
    pub fn check(&self) -> Result<(), ConfigurationError> {
        dimension("width", self.width as f64)?;
        dimension("height", self.height as f64)?;
        if self.url.is_empty() {
            return Err(ConfigurationError::EmptyUrl);
        }
        if self.rotate && !self.rotation_speeds.iter().all(|v| v.is_finite()) {
            return Err(ConfigurationError::InvalidRotationSpeeds(
                self.rotation_speeds.to_vec(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<ViewerProps> for ViewerConfig {
    type Error = ConfigurationError;

    fn try_from(props: ViewerProps) -> Result<Self, Self::Error> {
        props.validate()
    }
}

impl TryFrom<&ViewerProps> for ViewerConfig {
    type Error = ConfigurationError;

    fn try_from(props: &ViewerProps) -> Result<Self, Self::Error> {
        props.validate()
    }
}
