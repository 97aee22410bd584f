//! In-memory RGB565 frame buffer and colour parsing.
//!
//! Everything the compositor draws ends up in a [`Frame`], which implements
//! `embedded-graphics`' [`DrawTarget`].  A finished frame is handed to a
//! [`DisplaySink`](crate::traits::DisplaySink) as a whole; the device screen
//! natively speaks big-endian RGB565, so that is the storage format.

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::io::{self, Write};

/// A full-screen RGB565 image.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// A black frame of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Colour at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb565> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    #[inline]
    fn set_pixel(&mut self, x: i32, y: i32, color: Rgb565) {
        if x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32 {
            let idx = y as usize * self.width as usize + x as usize;
            self.pixels[idx] = color;
        }
    }

    /// Pixels as big-endian RGB565, row-major.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 2);
        for &color in &self.pixels {
            let raw: RawU16 = color.into();
            out.extend_from_slice(&raw.into_inner().to_be_bytes());
        }
        out
    }

    /// Write the frame as a binary PPM (P6) image.
    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut row = Vec::with_capacity(self.width as usize * 3);
        for line in self.pixels.chunks(self.width.max(1) as usize) {
            row.clear();
            for &color in line {
                let c = Rgb888::from(color);
                row.extend_from_slice(&[c.r(), c.g(), c.b()]);
            }
            out.write_all(&row)?;
        }
        Ok(())
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Frame {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        if area.size == Size::zero() {
            return Ok(());
        }
        let width = self.width as usize;
        let x0 = area.top_left.x as usize;
        let x1 = x0 + area.size.width as usize;
        for y in area.rows() {
            let start = y as usize * width;
            self.pixels[start + x0..start + x1].fill(color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}

//  Colours

/// An RGB565 colour written as `"#rrggbb"` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub Rgb565);

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(Rgb888::new(r, g, b).into())
    }
}

impl From<Color> for Rgb565 {
    fn from(c: Color) -> Self {
        c.0
    }
}

/// Parse `"#rrggbb"` or `"rrggbb"` (case-insensitive).
pub fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = Rgb888::from(self.0);
        write!(f, "#{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_hex_color(&s).ok_or_else(|| DeError::custom(format!("invalid colour: {:?}", s)))
    }
}
