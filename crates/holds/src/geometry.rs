//! Contour geometry: polygon measures through `geo`, rotated rectangles
//! and hulls through `imageproc`.

use geo::{Area, ConvexHull, EuclideanLength};
use geo_types::{Coord, LineString, Polygon};
use imageproc::point::Point;

pub fn to_polygon(contour: &[[i32; 2]]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = contour
        .iter()
        .map(|&[x, y]| Coord { x: x as f64, y: y as f64 })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Shoelace area of the closed contour.
pub fn contour_area(contour: &[[i32; 2]]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    to_polygon(contour).unsigned_area()
}

/// Length of the closed contour, including the closing segment.
pub fn contour_perimeter(contour: &[[i32; 2]]) -> f64 {
    if contour.len() < 2 {
        return 0.0;
    }
    to_polygon(contour).exterior().euclidean_length()
}

pub fn convex_hull_area(contour: &[[i32; 2]]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    to_polygon(contour).convex_hull().unsigned_area()
}

fn to_points(contour: &[[i32; 2]]) -> Vec<Point<i32>> {
    contour.iter().map(|&[x, y]| Point::new(x, y)).collect()
}

/// Corners of the minimal-area rotated rectangle, in boundary order.
pub fn min_area_rect(contour: &[[i32; 2]]) -> Option<[[i32; 2]; 4]> {
    if contour.is_empty() {
        return None;
    }
    let points = to_points(contour);
    let hull = imageproc::geometry::convex_hull(points.as_slice());
    let corners = match hull.len() {
        0 => [points[0]; 4],
        1 => [hull[0]; 4],
        2 => [hull[0], hull[1], hull[1], hull[0]],
        _ => imageproc::geometry::min_area_rect(&hull),
    };
    Some(corners.map(|p| [p.x, p.y]))
}

/// Side lengths `(w, h)` of a rectangle given by its corners in order.
pub fn rect_sides(corners: &[[i32; 2]; 4]) -> (f64, f64) {
    let dist = |a: [i32; 2], b: [i32; 2]| {
        let dx = (b[0] - a[0]) as f64;
        let dy = (b[1] - a[1]) as f64;
        dx.hypot(dy)
    };
    (dist(corners[0], corners[1]), dist(corners[1], corners[2]))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Circle {
    fn contains(&self, p: [f64; 2]) -> bool {
        let d = (p[0] - self.center[0]).hypot(p[1] - self.center[1]);
        d <= self.radius * (1.0 + 1e-9) + 1e-9
    }

    fn from_two(a: [f64; 2], b: [f64; 2]) -> Self {
        let center = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
        let radius = (a[0] - center[0]).hypot(a[1] - center[1]);
        Self { center, radius }
    }

    fn from_three(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Self {
        let d = 2.0 * (a[0] * (b[1] - c[1]) + b[0] * (c[1] - a[1]) + c[0] * (a[1] - b[1]));
        if d.abs() < 1e-12 {
            // collinear: the widest pair spans the circle
            return [Self::from_two(a, b), Self::from_two(a, c), Self::from_two(b, c)]
                .into_iter()
                .fold(Self::from_two(a, b), |best, c| if c.radius > best.radius { c } else { best });
        }
        let sq = |p: [f64; 2]| p[0] * p[0] + p[1] * p[1];
        let ux = (sq(a) * (b[1] - c[1]) + sq(b) * (c[1] - a[1]) + sq(c) * (a[1] - b[1])) / d;
        let uy = (sq(a) * (c[0] - b[0]) + sq(b) * (a[0] - c[0]) + sq(c) * (b[0] - a[0])) / d;
        let center = [ux, uy];
        let radius = (a[0] - ux).hypot(a[1] - uy);
        Self { center, radius }
    }
}

/// Smallest circle enclosing every contour point.
///
/// Runs the incremental (Welzl) construction over the convex hull only,
/// which has the same enclosing circle and far fewer points. Point order is
/// fixed, so the result is deterministic.
pub fn min_enclosing_circle(contour: &[[i32; 2]]) -> Option<Circle> {
    if contour.is_empty() {
        return None;
    }
    let points = to_points(contour);
    let hull: Vec<[f64; 2]> = imageproc::geometry::convex_hull(points.as_slice())
        .into_iter()
        .map(|p| [p.x as f64, p.y as f64])
        .collect();
    let points = if hull.is_empty() {
        vec![[contour[0][0] as f64, contour[0][1] as f64]]
    } else {
        hull
    };

    let mut circle = Circle { center: points[0], radius: 0.0 };
    for i in 1..points.len() {
        if circle.contains(points[i]) {
            continue;
        }
        circle = Circle { center: points[i], radius: 0.0 };
        for j in 0..i {
            if circle.contains(points[j]) {
                continue;
            }
            circle = Circle::from_two(points[i], points[j]);
            for k in 0..j {
                if !circle.contains(points[k]) {
                    circle = Circle::from_three(points[i], points[j], points[k]);
                }
            }
        }
    }
    Some(circle)
}
