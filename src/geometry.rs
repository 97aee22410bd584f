//! Screen geometry of the touch grid.
//!
//! The device screen is split into `columns × rows` square keys of
//! `key_size` pixels.  The key grid is centred horizontally on the screen
//! (the remaining width is split into two equal side margins) and aligned to
//! the top edge, so the vertical margin is always zero.
//!
//! [`Geometry`] answers two questions:
//!
//! * where does cell `(col, row)` live in pixel space ([`Geometry::cell_rect`])
//! * which cell did a pixel touch land in ([`Geometry::map_touch`])

use log::debug;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Static description of the device screen.
///
/// Defaults describe a Loupedeck Live: a 480×270 screen with a 4×3 grid of
/// 90 px keys, leaving a 60 px strip on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    /// Screen width in pixels.
    pub width: u32,
    /// Screen height in pixels.
    pub height: u32,
    /// Edge length of one square key in pixels.
    pub key_size: u32,
    /// Number of key columns.
    pub columns: u32,
    /// Number of key rows.
    pub rows: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            width: 480,
            height: 270,
            key_size: 90,
            columns: 4,
            rows: 3,
        }
    }
}

/// Address of one key on the touch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridPosition {
    pub col: u32,
    pub row: u32,
}

impl GridPosition {
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// Registry key for this position, e.g. `"2_1"`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.col, self.row)
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Accepts `{"col": 1, "row": 2}` or the string `"1 2"`.
impl<'de> Deserialize<'de> for GridPosition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = GridPosition;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "object {{col, row}} or string \"col row\"")
            }
            fn visit_map<A>(self, mut map: A) -> Result<GridPosition, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut col = None;
                let mut row = None;
                while let Some(k) = map.next_key::<String>()? {
                    match k.as_str() {
                        "col" => col = Some(map.next_value()?),
                        "row" => row = Some(map.next_value()?),
                        _ => {
                            let _: serde::de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                Ok(GridPosition {
                    col: col.ok_or_else(|| DeError::missing_field("col"))?,
                    row: row.ok_or_else(|| DeError::missing_field("row"))?,
                })
            }
            fn visit_str<E>(self, s: &str) -> Result<GridPosition, E>
            where
                E: DeError,
            {
                let parts: Vec<&str> = s.split_whitespace().collect();
                if parts.len() != 2 {
                    return Err(DeError::custom(format!("position: expected \"col row\", got {:?}", s)));
                }
                let col: u32 = parts[0].parse().map_err(|_| DeError::custom("position: col must be a non-negative integer"))?;
                let row: u32 = parts[1].parse().map_err(|_| DeError::custom("position: row must be a non-negative integer"))?;
                Ok(GridPosition { col, row })
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// Pixel rectangle of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    /// Whether the pixel `(x, y)` lies inside this rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }
}

/// A raw touch point as reported by the device, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: i32,
    pub y: i32,
}

/// Device geometry that does not fit on the screen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("grid is {total}px wide but the screen is only {screen}px")]
    TooWide { total: u32, screen: u32 },
    #[error("grid is {total}px tall but the screen is only {screen}px")]
    TooTall { total: u32, screen: u32 },
    #[error("device dimensions must be non-zero: {0:?}")]
    Empty(DeviceInfo),
    #[error("device dimensions are out of range: {0:?}")]
    TooLarge(DeviceInfo),
}

/// Resolved grid geometry for one device.
///
/// Construction validates the device description; after that every method
/// is a pure function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    info: DeviceInfo,
    margin_x: i32,
}

impl Geometry {
    /// Validate `info` and compute the horizontal margin.
    pub fn new(info: DeviceInfo) -> Result<Self, GeometryError> {
        if info.width == 0
            || info.height == 0
            || info.key_size == 0
            || info.columns == 0
            || info.rows == 0
        {
            return Err(GeometryError::Empty(info));
        }
        let max = i32::MAX as u32;
        if info.width > max || info.height > max {
            return Err(GeometryError::TooLarge(info));
        }
        let total = info
            .key_size
            .checked_mul(info.columns)
            .ok_or(GeometryError::TooLarge(info))?;
        if total > info.width {
            return Err(GeometryError::TooWide {
                total,
                screen: info.width,
            });
        }
        let total_h = info
            .key_size
            .checked_mul(info.rows)
            .ok_or(GeometryError::TooLarge(info))?;
        if total_h > info.height {
            return Err(GeometryError::TooTall {
                total: total_h,
                screen: info.height,
            });
        }
        Ok(Self {
            info,
            margin_x: ((info.width - total) / 2) as i32,
        })
    }

    //  Accessors

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Horizontal offset of the first column.
    pub fn margin_x(&self) -> i32 {
        self.margin_x
    }

    /// Width of the key grid (`key_size * columns`).
    pub fn total_width(&self) -> u32 {
        self.info.key_size * self.info.columns
    }

    /// Whether `pos` addresses a cell of this grid.
    pub fn contains(&self, pos: GridPosition) -> bool {
        pos.col < self.info.columns && pos.row < self.info.rows
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = GridPosition> + '_ {
        (0..self.info.rows)
            .flat_map(move |row| (0..self.info.columns).map(move |col| GridPosition::new(col, row)))
    }

    //  Geometry

    /// Pixel rectangle of the cell at `pos`.
    ///
    /// Positions outside the grid still produce a rectangle (extrapolated);
    /// callers that care check [`contains`](Self::contains) first.
    pub fn cell_rect(&self, pos: GridPosition) -> CellRect {
        let size = self.info.key_size;
        let offset = |n: u32| i32::try_from(n.saturating_mul(size)).unwrap_or(i32::MAX);
        CellRect {
            x: self.margin_x.saturating_add(offset(pos.col)),
            y: offset(pos.row),
            width: size,
            height: size,
        }
    }

    //  Touch mapping

    /// Map a pixel touch to the cell it landed in, or `None` when it falls
    /// outside the key grid (side strips, below the last row).
    pub fn map_touch(&self, x: i32, y: i32) -> Option<GridPosition> {
        let size = self.info.key_size as i32;
        let col = x.saturating_sub(self.margin_x).div_euclid(size);
        let row = y.div_euclid(size);
        if col < 0 || row < 0 || col >= self.info.columns as i32 || row >= self.info.rows as i32 {
            debug!("touch ({}, {}) outside grid", x, y);
            return None;
        }
        Some(GridPosition::new(col as u32, row as u32))
    }

    /// Map a batch of touch points in arrival order, dropping misses.
    pub fn map_touches<'a>(
        &'a self,
        points: &'a [TouchPoint],
    ) -> impl Iterator<Item = GridPosition> + 'a {
        points.iter().filter_map(move |p| self.map_touch(p.x, p.y))
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scenario() -> Geometry {
        Geometry::new(DeviceInfo {
            width: 600,
            height: 270,
            key_size: 90,
            columns: 5,
            rows: 3,
        })
        .unwrap()
    }

    #[test]
    fn default_device_is_loupedeck_live() {
        let g = Geometry::new(DeviceInfo::default()).unwrap();
        assert_eq!(g.total_width(), 360);
        assert_eq!(g.margin_x(), 60);
    }

    #[test]
    fn margin_centres_grid() {
        let g = scenario();
        assert_eq!(g.total_width(), 450);
        assert_eq!(g.margin_x(), 75);
    }

    #[test]
    fn cell_rect_offsets_by_margin() {
        let g = scenario();
        assert_eq!(
            g.cell_rect(GridPosition::new(0, 0)),
            CellRect { x: 75, y: 0, width: 90, height: 90 }
        );
        assert_eq!(
            g.cell_rect(GridPosition::new(4, 2)),
            CellRect { x: 435, y: 180, width: 90, height: 90 }
        );
    }

    #[test]
    fn touch_inside_first_cell() {
        assert_eq!(scenario().map_touch(80, 10), Some(GridPosition::new(0, 0)));
    }

    #[test]
    fn touch_left_of_margin_is_ignored() {
        assert_eq!(scenario().map_touch(70, 10), None);
    }

    #[test]
    fn touch_at_right_edge_is_ignored() {
        // col would be 5, one past the last column
        assert_eq!(scenario().map_touch(600, 10), None);
        assert_eq!(scenario().map_touch(525, 10), None);
        assert_eq!(scenario().map_touch(524, 10), Some(GridPosition::new(4, 0)));
    }

    #[test]
    fn touch_below_grid_is_ignored() {
        assert_eq!(scenario().map_touch(80, 270), None);
        assert_eq!(scenario().map_touch(80, -1), None);
    }

    #[test]
    fn batch_keeps_arrival_order_and_drops_misses() {
        let g = scenario();
        let points = [
            TouchPoint { x: 300, y: 100 },
            TouchPoint { x: 10, y: 10 },
            TouchPoint { x: 80, y: 200 },
        ];
        let hits: Vec<GridPosition> = g.map_touches(&points).collect();
        assert_eq!(hits, vec![GridPosition::new(2, 1), GridPosition::new(0, 2)]);
    }

    #[test]
    fn too_wide_grid_is_rejected() {
        let err = Geometry::new(DeviceInfo {
            width: 300,
            height: 270,
            key_size: 90,
            columns: 4,
            rows: 3,
        })
        .unwrap_err();
        assert_eq!(err, GeometryError::TooWide { total: 360, screen: 300 });
    }

    #[test]
    fn too_tall_grid_is_rejected() {
        let err = Geometry::new(DeviceInfo {
            rows: 4,
            ..DeviceInfo::default()
        })
        .unwrap_err();
        assert!(matches!(err, GeometryError::TooTall { .. }));
    }

    #[test]
    fn zero_columns_rejected() {
        let info = DeviceInfo {
            columns: 0,
            ..DeviceInfo::default()
        };
        assert_eq!(Geometry::new(info), Err(GeometryError::Empty(info)));
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let wide = DeviceInfo {
            width: 480,
            height: 270,
            key_size: u32::MAX,
            columns: 2,
            rows: 1,
        };
        assert_eq!(Geometry::new(wide), Err(GeometryError::TooLarge(wide)));

        let tall = DeviceInfo {
            width: u32::MAX / 2,
            height: 270,
            key_size: 1 << 20,
            columns: 1,
            rows: 1 << 13,
        };
        assert_eq!(Geometry::new(tall), Err(GeometryError::TooLarge(tall)));

        let huge = DeviceInfo {
            width: u32::MAX,
            ..DeviceInfo::default()
        };
        assert_eq!(Geometry::new(huge), Err(GeometryError::TooLarge(huge)));
    }

    #[test]
    fn extreme_touch_coordinates_miss() {
        let g = scenario();
        assert_eq!(g.map_touch(i32::MIN, i32::MIN), None);
        assert_eq!(g.map_touch(i32::MAX, i32::MAX), None);
    }

    #[test]
    fn cells_iterate_row_major() {
        let g = Geometry::new(DeviceInfo::default()).unwrap();
        let cells: Vec<GridPosition> = g.cells().collect();
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], GridPosition::new(0, 0));
        assert_eq!(cells[4], GridPosition::new(0, 1));
    }

    #[test]
    fn position_key_format() {
        assert_eq!(GridPosition::new(3, 1).key(), "3_1");
    }

    #[test]
    fn position_deserializes_from_object_or_string() {
        let a: GridPosition = serde_json::from_str(r#"{"col":2,"row":1}"#).unwrap();
        let b: GridPosition = serde_json::from_str(r#""2 1""#).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<GridPosition>(r#""2""#).is_err());
    }

    proptest! {
        #[test]
        fn every_pixel_inside_a_cell_maps_to_it(
            col in 0u32..5, row in 0u32..3, dx in 0u32..90, dy in 0u32..90
        ) {
            let g = scenario();
            let pos = GridPosition::new(col, row);
            let rect = g.cell_rect(pos);
            let (x, y) = (rect.x + dx as i32, rect.y + dy as i32);
            prop_assert!(rect.contains(x, y));
            prop_assert_eq!(g.map_touch(x, y), Some(pos));
        }

        #[test]
        fn pixels_outside_the_grid_map_to_none(x in -200i32..800, y in -100i32..400) {
            let g = scenario();
            let outside = x < g.margin_x()
                || x >= g.margin_x() + g.total_width() as i32
                || y < 0
                || y >= 270;
            if outside {
                prop_assert_eq!(g.map_touch(x, y), None);
            } else {
                prop_assert!(g.map_touch(x, y).is_some());
            }
        }
    }
}
