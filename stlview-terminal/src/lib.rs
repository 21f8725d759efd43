/// Terminal host for the STL viewer
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use std::fs;
use std::io::{self, stdout, Stdout, Write};
use std::time::{Duration, Instant};
use stlview_core::{
    stl, Color as Rgb, FrameScheduler, Framebuffer, LoadError, LoadId, LoadResult, Mesh,
    MeshLoader, OrbitInput, Surface, SurfaceError, Viewer, ViewerConfig, ViewerError,
};

pub mod renderer;

pub use renderer::{AsciiPresenter, ROWS_PER_CELL};

/// Mesh url that loads the built-in demo cube instead of a file
pub const BUILTIN_CUBE_URL: &str = "builtin:cube";

/// Pixels of drag synthesized for one arrow-key press
const KEY_DRAG_PIXELS: f32 = 4.0;

/// Frame scheduling, file loading and drawing for a terminal
pub struct TerminalHost<W: Write> {
    writer: W,
    presenter: AsciiPresenter,
    title: String,
    frame_requested: bool,
    completed: Option<(LoadId, LoadResult)>,
}

impl<W: Write> TerminalHost<W> {
    pub fn new(writer: W, background: Rgb, title: impl Into<String>) -> Self {
        Self {
            writer,
            presenter: AsciiPresenter::new(background),
            title: title.into(),
            frame_requested: false,
            completed: None,
        }
    }

    /// Consume the pending frame request, if any
    pub fn take_frame_request(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    pub fn take_completed(&mut self) -> Option<(LoadId, LoadResult)> {
        self.completed.take()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn draw(&mut self, frame: &Framebuffer) -> io::Result<()> {
        self.presenter.draw(frame, &mut self.writer)?;
        queue!(
            self.writer,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(&self.title),
            ResetColor
        )?;
        self.writer.flush()
    }
}

/// Read a mesh file, mapping I/O failures onto load error kinds
pub fn read_mesh(url: &str) -> LoadResult {
    if url == BUILTIN_CUBE_URL {
        return Ok(stl::to_binary_stl(&Mesh::cube(2.0)));
    }
    fs::read(url).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(url.to_string()),
        _ => LoadError::Network(format!("{url}: {e}")),
    })
}

impl<W: Write> FrameScheduler for TerminalHost<W> {
    fn request_frame(&mut self) {
        self.frame_requested = true;
    }

    fn cancel_frame(&mut self) {
        self.frame_requested = false;
    }
}

impl<W: Write> MeshLoader for TerminalHost<W> {
    /// Files are read right away; the result is handed to the viewer on the
    /// next loop iteration, like any other asynchronous completion.
    fn begin(&mut self, id: LoadId, url: &str) {
        self.completed = Some((id, read_mesh(url)));
    }

    fn abort(&mut self, id: LoadId) {
        if matches!(self.completed, Some((pending, _)) if pending == id) {
            self.completed = None;
        }
    }
}

impl<W: Write> Surface for TerminalHost<W> {
    fn mount(&mut self, _width: u32, _height: u32) -> Result<(), SurfaceError> {
        execute!(self.writer, Clear(ClearType::All))
            .map_err(|e| SurfaceError(e.to_string()))
    }

    fn present(&mut self, frame: &Framebuffer) {
        if let Err(e) = self.draw(frame) {
            log::warn!("failed to draw frame: {}", e);
        }
    }

    fn release(&mut self) {
        if let Err(e) = execute!(self.writer, ResetColor, Clear(ClearType::All)) {
            log::warn!("failed to clear terminal: {}", e);
        }
    }
}

/// Translates terminal input into orbit gestures
#[derive(Debug, Default)]
pub struct InputMapper {
    drag_origin: Option<(u16, u16)>,
}

impl InputMapper {
    pub fn map(&mut self, event: &Event) -> Option<OrbitInput> {
        match event {
            Event::Mouse(MouseEvent { kind, column, row, .. }) => {
                self.map_mouse(*kind, *column, *row)
            }
            Event::Key(KeyEvent { code, kind, .. }) if *kind != KeyEventKind::Release => {
                let drag = |dx: f32, dy: f32| OrbitInput::Rotate { dx, dy };
                match code {
                    KeyCode::Char('w') | KeyCode::Up => Some(drag(0.0, -KEY_DRAG_PIXELS)),
                    KeyCode::Char('s') | KeyCode::Down => Some(drag(0.0, KEY_DRAG_PIXELS)),
                    KeyCode::Char('a') | KeyCode::Left => Some(drag(-KEY_DRAG_PIXELS, 0.0)),
                    KeyCode::Char('d') | KeyCode::Right => Some(drag(KEY_DRAG_PIXELS, 0.0)),
                    KeyCode::Char('+') | KeyCode::Char('=') => Some(OrbitInput::Dolly(-1.0)),
                    KeyCode::Char('-') => Some(OrbitInput::Dolly(1.0)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn map_mouse(&mut self, kind: MouseEventKind, column: u16, row: u16) -> Option<OrbitInput> {
        match kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.drag_origin = Some((column, row));
                None
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let (last_column, last_row) = self.drag_origin.replace((column, row))?;
                let dx = column as f32 - last_column as f32;
                let dy = (row as f32 - last_row as f32) * ROWS_PER_CELL as f32;
                Some(OrbitInput::Rotate { dx, dy })
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.drag_origin = None;
                None
            }
            MouseEventKind::ScrollDown => Some(OrbitInput::Dolly(1.0)),
            MouseEventKind::ScrollUp => Some(OrbitInput::Dolly(-1.0)),
            _ => None,
        }
    }
}

fn is_quit(event: &Event) -> bool {
    matches!(
        event,
        Event::Key(KeyEvent {
            code: KeyCode::Char('q') | KeyCode::Esc,
            ..
        })
    )
}

fn to_io(err: ViewerError) -> io::Error {
    let kind = match &err {
        ViewerError::Load(LoadError::NotFound(_)) => io::ErrorKind::NotFound,
        ViewerError::Load(LoadError::Parse(_)) | ViewerError::Configuration(_) => {
            io::ErrorKind::InvalidData
        }
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    viewer: Viewer<TerminalHost<Stdout>>,
    input: InputMapper,
    running: bool,
}

impl TerminalApp {
    pub fn new(config: ViewerConfig) -> io::Result<Self> {
        let title = format!(
            "stlview | {} | drag/WASD=orbit  scroll/+-=zoom  q=quit",
            config.url
        );
        let host = TerminalHost::new(stdout(), config.background_color, title);
        Ok(Self {
            viewer: Viewer::new(config, host).map_err(to_io)?,
            input: InputMapper::default(),
            running: true,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;

        let result = self.main_loop();
        self.viewer.destroy();

        // Cleanup
        execute!(
            stdout(),
            DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;
        terminal::disable_raw_mode()?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        self.viewer.initialize().map_err(to_io)?;

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                let event = event::read()?;
                self.handle_event(&event);
            }

            if let Some((id, result)) = self.viewer.host_mut().take_completed() {
                self.viewer.finish_load(id, result).map_err(to_io)?;
            }

            if self.viewer.host_mut().take_frame_request() {
                self.viewer.on_frame();
            }

            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: &Event) {
        if is_quit(event) {
            self.running = false;
            return;
        }
        if let Some(input) = self.input.map(event) {
            self.viewer.orbit(input);
        }
    }
}
