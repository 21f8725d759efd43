/// stlview terminal - show an STL model in the terminal
///
/// Controls:
///   - Mouse drag / WASD / Arrow Keys: orbit (stops auto-rotation)
///   - Scroll / + / -: zoom
///   - Q/ESC: Quit
use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use stlview_core::{Color, ColorValue, ViewerProps};
use stlview_terminal::{TerminalApp, BUILTIN_CUBE_URL, ROWS_PER_CELL};

#[derive(Parser, Debug)]
#[command(name = "stlview-terminal")]
#[command(about = "Render an STL model in the terminal, auto-rotating until you grab it")]
struct Cli {
    /// STL file to show; a cube is shown when omitted
    path: Option<PathBuf>,

    /// JSON property bag (camelCase keys); flags below override it
    #[arg(long)]
    props: Option<PathBuf>,

    #[arg(long)]
    model_color: Option<Color>,

    #[arg(long)]
    background_color: Option<Color>,

    #[arg(long)]
    light_color: Option<Color>,

    /// Start without auto-rotation
    #[arg(long)]
    no_rotate: bool,

    /// Ignore mouse and keyboard orbiting
    #[arg(long)]
    no_orbit: bool,

    #[arg(long, allow_negative_numbers = true)]
    camera_x: Option<f32>,

    #[arg(long, allow_negative_numbers = true)]
    camera_y: Option<f32>,

    /// Camera distance; derived from the model size when omitted
    #[arg(long, allow_negative_numbers = true)]
    camera_z: Option<f32>,

    /// Per-frame rotation increments, e.g. `0,0.02,0`
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    rotation_speeds: Option<Vec<f32>>,

    /// Light position, e.g. `0,0,1`
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    light: Option<Vec<f32>>,
}

impl Cli {
    fn into_props(self) -> io::Result<ViewerProps> {
        let mut props = match &self.props {
            Some(path) => ViewerProps::from_json(&fs::read_to_string(path)?)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            None => ViewerProps::default(),
        };

        // The panel is the whole terminal unless the property bag sizes it
        if self.props.is_none() {
            let (columns, rows) = crossterm::terminal::size()?;
            props.width = columns as f64;
            props.height = (rows as u32 * ROWS_PER_CELL) as f64;
        }

        if let Some(path) = self.path {
            props.url = path.to_string_lossy().into_owned();
        } else if props.url.is_empty() {
            props.url = BUILTIN_CUBE_URL.to_string();
        }

        if let Some(c) = self.model_color {
            props.model_color = ColorValue::from(c);
        }
        if let Some(c) = self.background_color {
            props.background_color = ColorValue::from(c);
        }
        if let Some(c) = self.light_color {
            props.light_color = ColorValue::from(c);
        }

        props.rotate &= !self.no_rotate;
        props.orbit_controls &= !self.no_orbit;
        props.camera_x = self.camera_x.unwrap_or(props.camera_x);
        props.camera_y = self.camera_y.unwrap_or(props.camera_y);
        props.camera_z = self.camera_z.or(props.camera_z);
        if let Some(speeds) = self.rotation_speeds {
            props.rotation_speeds = speeds;
        }
        if let Some(light) = self.light {
            match light.as_slice() {
                &[x, y, z] => (props.light_x, props.light_y, props.light_z) = (x, y, z),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "--light takes exactly three comma-separated numbers",
                    ))
                }
            }
        }
        Ok(props)
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let props = Cli::parse().into_props()?;
    let config = props
        .validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    log::info!("showing {} at {}x{}", config.url, config.width, config.height);

    let mut app = TerminalApp::new(config)?;
    app.run()
}
