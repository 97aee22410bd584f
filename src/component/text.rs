//! Static text on a cell.

use super::draw_centered_lines;
use crate::frame::Color;
use crate::geometry::{CellRect, GridPosition};
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub text: String,
    pub color: Color,
    /// Fill behind the text.  Transparent when absent.
    pub background: Option<Color>,
    /// Use the large font.
    pub large: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            color: Color(Rgb565::WHITE),
            background: None,
            large: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Text {
    position: GridPosition,
    options: TextOptions,
}

impl Text {
    pub fn new(position: GridPosition, options: TextOptions) -> Self {
        Self { position, options }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn draw<D>(&self, target: &mut D, rect: CellRect) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        if let Some(bg) = self.options.background {
            Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height))
                .into_styled(PrimitiveStyle::with_fill(bg.0))
                .draw(target)?;
        }
        let font = if self.options.large { &FONT_10X20 } else { &FONT_6X10 };
        draw_centered_lines(target, &self.options.text, rect, font, self.options.color.0)
    }
}
