//! Sheet geometry: placing library pins and following wires to labels

use super::raw::{Label, Position, Wire};

/// Coordinates are compared on a 0.01 mm grid.
const GRID_PER_MM: f64 = 100.0;

/// A point on the sheet, in grid units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn from_mm(x: f64, y: f64) -> Self {
        Point {
            x: (x * GRID_PER_MM).round() as i64,
            y: (y * GRID_PER_MM).round() as i64,
        }
    }
}

impl From<Position> for Point {
    fn from(value: Position) -> Self {
        Point::from_mm(value.x, value.y)
    }
}

/// Sheet position of the connection point of a library pin for a symbol
/// placed at `origin`. Library Y grows upwards, sheet Y downwards; the
/// placement angle rotates counterclockwise as seen on the sheet.
pub fn pin_point(origin: Position, pin: Position) -> Point {
    let (dx, dy) = (pin.x, -pin.y);
    let (sin, cos) = origin.angle.to_radians().sin_cos();
    let rx = dx * cos + dy * sin;
    let ry = -dx * sin + dy * cos;
    Point::from_mm(origin.x + rx, origin.y + ry)
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    cross == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Wires grouped into connected nets
pub struct Nets<'a> {
    segments: Vec<(usize, Point, Point)>,
    parent: Vec<usize>,
    labels: Vec<(Point, &'a str)>,
}

impl<'a> Nets<'a> {
    pub fn new(wires: &[Wire], labels: &'a [Label<'_>]) -> Self {
        let mut segments = Vec::new();
        let mut ends = Vec::new();
        for (i, wire) in wires.iter().enumerate() {
            let pts: Vec<Point> = wire.pts.iter().map(|&p| p.into()).collect();
            for pair in pts.windows(2) {
                segments.push((i, pair[0], pair[1]));
            }
            if let (Some(&first), Some(&last)) = (pts.first(), pts.last()) {
                ends.push((i, first));
                ends.push((i, last));
            }
        }

        let mut nets = Nets {
            segments,
            parent: (0..wires.len()).collect(),
            labels: labels.iter().map(|l| (l.at.into(), &*l.text)).collect(),
        };

        // Wires join where an end of one lies anywhere on the other.
        for &(wire, end) in &ends {
            let touching: Vec<usize> = nets
                .segments
                .iter()
                .filter(|&&(other, a, b)| other != wire && on_segment(end, a, b))
                .map(|&(other, _, _)| other)
                .collect();
            for other in touching {
                nets.union(wire, other);
            }
        }
        nets
    }

    fn find(&self, mut wire: usize) -> usize {
        while self.parent[wire] != wire {
            wire = self.parent[wire];
        }
        wire
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }

    /// Net id of the wire passing through `p`
    pub fn net_at(&self, p: Point) -> Option<usize> {
        self.segments
            .iter()
            .find(|&&(_, a, b)| on_segment(p, a, b))
            .map(|&(wire, _, _)| self.find(wire))
    }

    /// Whether `a` and `b` are the same point or sit on the same net
    pub fn connected(&self, a: Point, b: Point) -> bool {
        a == b
            || matches!(
                (self.net_at(a), self.net_at(b)),
                (Some(x), Some(y)) if x == y
            )
    }

    /// Text of the first label connected to `p`
    pub fn label_at(&self, p: Point) -> Option<&'a str> {
        self.labels
            .iter()
            .find(|&&(at, _)| self.connected(p, at))
            .map(|&(_, text)| text)
    }
}
