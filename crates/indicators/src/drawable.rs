//! Renderer-agnostic output primitives, in data space (time x price).

use meridian_core::{Price, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub time: Timestamp,
    pub price: Price,
}

impl Point {
    pub fn new(time: Timestamp, price: Price) -> Self {
        Self { time, price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Drawable {
    /// Polyline through the points in order
    Line {
        points: Vec<Point>,
        color: Option<String>,
        label: Option<String>,
    },
    /// Rectangle spanned by two opposite corners
    Box {
        from: Point,
        to: Point,
        color: Option<String>,
    },
    Marker {
        at: Point,
        shape: MarkerShape,
        text: Option<String>,
    },
}

impl Drawable {
    pub fn line(points: Vec<Point>, color: Option<&str>) -> Self {
        Drawable::Line {
            points,
            color: color.map(str::to_string),
            label: None,
        }
    }

    pub fn labelled(self, text: &str) -> Self {
        match self {
            Drawable::Line { points, color, .. } => Drawable::Line {
                points,
                color,
                label: Some(text.to_string()),
            },
            Drawable::Marker { at, shape, .. } => Drawable::Marker {
                at,
                shape,
                text: Some(text.to_string()),
            },
            other => other,
        }
    }
}
