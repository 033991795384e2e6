//! Planar geometry primitives in metres.
//!
//! The map frame has its origin at the centre of the intersection box, `x`
//! pointing east and `y` pointing north.  Headings are radians measured
//! counter-clockwise from `+x`.  `f32` gives sub-millimetre precision over the
//! few hundred metres a map spans.

use std::ops::{Add, Mul, Sub};

/// A point (or vector) in the map frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `heading`.
    #[inline]
    pub fn from_heading(heading: f32) -> Self {
        Self { x: heading.cos(), y: heading.sin() }
    }

    #[inline]
    pub fn dot(self, other: Point2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3-D cross product.
    #[inline]
    pub fn cross(self, other: Point2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn distance(self, other: Point2) -> f32 {
        (self - other).length()
    }

    /// Rotate counter-clockwise by `angle` radians about the origin.
    #[inline]
    pub fn rotate(self, angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { x: c * self.x - s * self.y, y: s * self.x + c * self.y }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point2 {
    type Output = Point2;
    #[inline]
    fn add(self, rhs: Point2) -> Point2 {
        Point2 { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl Sub for Point2 {
    type Output = Point2;
    #[inline]
    fn sub(self, rhs: Point2) -> Point2 {
        Point2 { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl Mul<f32> for Point2 {
    type Output = Point2;
    #[inline]
    fn mul(self, rhs: f32) -> Point2 {
        Point2 { x: self.x * rhs, y: self.y * rhs }
    }
}

impl std::fmt::Display for Point2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Position plus heading of a vehicle on its track.
#[derive(Copy, Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    pub position: Point2,
    /// Radians, counter-clockwise from `+x`, normalised to `(-π, π]`.
    pub heading:  f32,
}

impl Pose {
    #[inline]
    pub fn new(position: Point2, heading: f32) -> Self {
        Self { position, heading: normalize_angle(heading) }
    }
}

/// A finite line segment, e.g. one side of a road arm.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub a: Point2,
    pub b: Point2,
}

impl Segment {
    #[inline]
    pub fn new(a: Point2, b: Point2) -> Self {
        Self { a, b }
    }

    /// Distance along the ray `origin + t·dir` (`dir` unit length) to the
    /// first intersection with this segment, or `None` if the ray misses.
    pub fn ray_hit(&self, origin: Point2, dir: Point2) -> Option<f32> {
        let edge  = self.b - self.a;
        let denom = dir.cross(edge);
        if denom.abs() < 1e-9 {
            return None; // parallel
        }
        let to_a = self.a - origin;
        let t = to_a.cross(edge) / denom;
        let u = to_a.cross(dir) / denom;
        (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
    }
}

/// Distance along the ray `origin + t·dir` (`dir` unit length) to the first
/// intersection with a circle, or `None` if the ray misses or starts inside.
pub fn ray_circle_hit(origin: Point2, dir: Point2, center: Point2, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b  = oc.dot(dir);
    let c  = oc.dot(oc) - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    (t >= 0.0).then_some(t)
}

/// `true` if two `length × width` rectangles centred on `a` and `b`, long
/// side along their headings, intersect.  Touching edges do not count.
pub fn rectangles_overlap(a: Pose, b: Pose, length: f32, width: f32) -> bool {
    let (half_l, half_w) = (0.5 * length, 0.5 * width);
    let frame = |pose: Pose| {
        let along = Point2::from_heading(pose.heading);
        (along, Point2::new(-along.y, along.x))
    };
    let (ua, va) = frame(a);
    let (ub, vb) = frame(b);
    let d = b.position - a.position;

    // Separating axis test over the four edge normals.
    [ua, va, ub, vb].into_iter().all(|n| {
        let ra = half_l * ua.dot(n).abs() + half_w * va.dot(n).abs();
        let rb = half_l * ub.dot(n).abs() + half_w * vb.dot(n).abs();
        d.dot(n).abs() < ra + rb
    })
}

/// Wrap an angle into `(-π, π]`.
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}
