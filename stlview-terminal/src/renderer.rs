/// Draws a rendered framebuffer as colored terminal characters
use crossterm::{
    cursor::MoveTo,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use std::io::Write;
use stlview_core::{Color as Rgb, Framebuffer};

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Each terminal cell covers this many framebuffer rows
pub const ROWS_PER_CELL: u32 = 2;

/// Maps framebuffer pixels onto terminal cells, one column per pixel and
/// `ROWS_PER_CELL` pixel rows per line
pub struct AsciiPresenter {
    background: Rgb,
}

impl AsciiPresenter {
    pub fn new(background: Rgb) -> Self {
        Self { background }
    }

    /// Character and color for a cell covering `top` and `bottom`
    pub fn cell(&self, top: [u8; 3], bottom: [u8; 3]) -> (char, Color) {
        let background = self.background.to_rgb();
        let avg = |i: usize| ((top[i] as u16 + bottom[i] as u16) / 2) as u8;
        let (r, g, b) = (avg(0), avg(1), avg(2));

        if top == background && bottom == background {
            return (' ', Color::Rgb { r, g, b });
        }

        let luminance = (0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32) / 255.0;
        let index = (luminance * (LUMINOSITY_RAMP.len() - 1) as f32).round() as usize;
        // Never draw model pixels as blank
        let index = index.clamp(1, LUMINOSITY_RAMP.len() - 1);
        (LUMINOSITY_RAMP[index], Color::Rgb { r, g, b })
    }

    pub fn draw<W: Write>(&self, frame: &Framebuffer, writer: &mut W) -> std::io::Result<()> {
        let [r, g, b] = self.background.to_rgb();
        writer.queue(SetBackgroundColor(Color::Rgb { r, g, b }))?;

        let lines = frame.height() / ROWS_PER_CELL;
        for line in 0..lines {
            writer.queue(MoveTo(0, line as u16))?;
            let mut current = None;
            for x in 0..frame.width() {
                let top = frame.pixel(x, line * ROWS_PER_CELL);
                let bottom = frame.pixel(x, line * ROWS_PER_CELL + 1);
                let (character, color) = self.cell(top, bottom);
                if current != Some(color) {
                    writer.queue(SetForegroundColor(color))?;
                    current = Some(color);
                }
                writer.queue(Print(character))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: Rgb = Rgb::from_hex(0xeaeaea);

    #[test]
    fn test_background_cells_are_blank() {
        let presenter = AsciiPresenter::new(BACKGROUND);
        let (c, _) = presenter.cell(BACKGROUND.to_rgb(), BACKGROUND.to_rgb());
        assert_eq!(c, ' ');
    }

    #[test]
    fn test_model_cells_follow_luminosity() {
        let presenter = AsciiPresenter::new(BACKGROUND);
        assert_eq!(presenter.cell([255; 3], [255; 3]).0, '@');
        assert_eq!(presenter.cell([0; 3], [0; 3]).0, '.');
        let (c, color) = presenter.cell([200, 0, 0], [100, 0, 0]);
        assert_eq!(color, Color::Rgb { r: 150, g: 0, b: 0 });
        assert_ne!(c, ' ');
    }

    #[test]
    fn test_draw_emits_one_glyph_per_cell() {
        let presenter = AsciiPresenter::new(BACKGROUND);
        let frame = Framebuffer::new(3, 4, Rgb::WHITE);
        let mut out = Vec::new();
        presenter.draw(&frame, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('@').count(), 6);
    }
}
