use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// A point on the screen, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Element bounds as reported by the UI tree, `[left,top][right,bottom]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// A point inside the bounds given as fractions of the width and height.
    pub fn relative(&self, fx: f64, fy: f64) -> Point {
        Point::new(
            self.left + (self.width() as f64 * fx).round() as i32,
            self.top + (self.height() as f64 * fy).round() as i32,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

impl FromStr for Bounds {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeviceError::Bounds(s.to_string());

        let values = s
            .split(|c| c == '[' || c == ']' || c == ',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| part.trim().parse::<i32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [left, top, right, bottom] => Ok(Bounds {
                left: *left,
                top: *top,
                right: *right,
                bottom: *bottom,
            }),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bounds() {
        let bounds: Bounds = "[0,120][1080,2340]".parse().unwrap();
        assert_eq!(
            Bounds {
                left: 0,
                top: 120,
                right: 1080,
                bottom: 2340
            },
            bounds
        );
        assert_eq!(Point::new(540, 1230), bounds.center());
    }

    #[test]
    fn parse_bounds_rejects_garbage() {
        assert!("[0,0][10]".parse::<Bounds>().is_err());
        assert!("[a,b][c,d]".parse::<Bounds>().is_err());
        assert!("".parse::<Bounds>().is_err());
    }

    #[test]
    fn relative_point() {
        let bounds: Bounds = "[0,0][1000,2000]".parse().unwrap();
        assert_eq!(Point::new(500, 1600), bounds.relative(0.5, 0.8));
    }
}
