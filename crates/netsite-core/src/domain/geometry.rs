//! Edge path geometry for label placement and label dragging.
//!
//! Paths are rebuilt with the same routing rules the diagram renderer uses
//! (straight, step, bezier, smoothstep) and flattened into a polyline, so
//! a point computed here lands where the curve is actually drawn.

use super::model::{Edge, EdgeShape, HandleSide, Node, Point};

/// Distance edges travel straight out of a handle before turning
pub const STEP_OFFSET: f64 = 20.0;

/// Corner radius of smoothstep edges
pub const SMOOTHSTEP_RADIUS: f64 = 5.0;

/// Bezier control point curvature
pub const BEZIER_CURVATURE: f64 = 0.25;

/// Samples used by [`EdgePath::nearest_parameter`]
pub const NEAREST_SAMPLES: usize = 100;

const CUBIC_SEGMENTS: usize = 48;
const CORNER_SEGMENTS: usize = 8;
const EPSILON: f64 = 1e-9;

/// Pan/zoom transform of the diagram canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Horizontal translation in client pixels
    pub x: f64,
    /// Vertical translation in client pixels
    pub y: f64,
    /// Uniform scale
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Map a client (screen) point into diagram coordinates
    pub fn to_diagram(&self, client: Point) -> Point {
        let zoom = if self.zoom > 0.0 && self.zoom.is_finite() {
            self.zoom
        } else {
            1.0
        };
        Point::new((client.x - self.x) / zoom, (client.y - self.y) / zoom)
    }
}

/// Result of a nearest-point search along a path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathHit {
    /// Fractional arc length of the hit
    pub t: f64,
    /// The sampled point on the path
    pub point: Point,
}

/// A rendered edge path flattened into a polyline
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePath {
    points: Vec<Point>,
    // cumulative arc length at each point
    lengths: Vec<f64>,
}

impl EdgePath {
    /// Build a path from polyline vertices. Consecutive duplicates are
    /// dropped; an empty list yields a degenerate path at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        let mut deduped: Vec<Point> = Vec::new();
        for p in points {
            if deduped.last().map_or(true, |last| last.distance_sq(&p) > EPSILON) {
                deduped.push(p);
            }
        }
        if deduped.is_empty() {
            deduped.push(Point::default());
        }

        let mut lengths = Vec::with_capacity(deduped.len());
        let mut total = 0.0;
        lengths.push(0.0);
        for pair in deduped.windows(2) {
            total += pair[0].distance(&pair[1]);
            lengths.push(total);
        }

        Self {
            points: deduped,
            lengths,
        }
    }

    /// Polyline vertices
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// First point of the path
    pub fn start(&self) -> Point {
        self.points[0]
    }

    /// Last point of the path
    pub fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    /// Total arc length
    pub fn total_length(&self) -> f64 {
        self.lengths[self.lengths.len() - 1]
    }

    fn point_at_length(&self, distance: f64) -> Point {
        let distance = distance.clamp(0.0, self.total_length());
        // first vertex whose cumulative length reaches `distance`
        let idx = self.lengths.partition_point(|&l| l < distance);
        if idx == 0 {
            return self.points[0];
        }
        if idx >= self.points.len() {
            return self.end();
        }
        let (l0, l1) = (self.lengths[idx - 1], self.lengths[idx]);
        let span = l1 - l0;
        let local = if span > EPSILON { (distance - l0) / span } else { 0.0 };
        self.points[idx - 1].lerp(&self.points[idx], local)
    }

    fn point_on_path(&self, t: f64) -> Point {
        let total = self.total_length();
        if total <= EPSILON {
            return self.start().lerp(&self.end(), 0.5);
        }
        let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
        self.point_at_length(t * total)
    }

    /// Point at fractional arc length `t` (clamped to `[0, 1]`) displaced by
    /// `offset`. Zero-length paths fall back to the endpoint midpoint.
    pub fn point_at(&self, t: f64, offset: Point) -> Point {
        self.point_on_path(t) + offset
    }

    /// Sample the path at [`NEAREST_SAMPLES`] equal arc-length steps and
    /// return the sample closest to `target`.
    pub fn nearest_parameter(&self, target: Point) -> PathHit {
        let mut best = PathHit {
            t: 0.0,
            point: self.point_on_path(0.0),
        };
        let mut best_dist = best.point.distance_sq(&target);

        for i in 1..=NEAREST_SAMPLES {
            let t = i as f64 / NEAREST_SAMPLES as f64;
            let point = self.point_on_path(t);
            let dist = point.distance_sq(&target);
            if dist < best_dist {
                best = PathHit { t, point };
                best_dist = dist;
            }
        }

        best
    }
}

/// Point on a node's perimeter where a handle on `side` sits
pub fn handle_anchor(node: &Node, side: HandleSide) -> Point {
    match side {
        HandleSide::Top => Point::new(node.x + node.width / 2.0, node.y),
        HandleSide::Bottom => Point::new(node.x + node.width / 2.0, node.y + node.height),
        HandleSide::Left => Point::new(node.x, node.y + node.height / 2.0),
        HandleSide::Right => Point::new(node.x + node.width, node.y + node.height / 2.0),
    }
}

/// Build the rendered path of an edge between two handle anchors
pub fn build_path(
    shape: EdgeShape,
    source: Point,
    source_side: HandleSide,
    target: Point,
    target_side: HandleSide,
) -> EdgePath {
    match shape {
        EdgeShape::Straight => EdgePath::from_points([source, target]),
        EdgeShape::Bezier => bezier_path(source, source_side, target, target_side),
        EdgeShape::Step => {
            let corners = step_points(source, source_side, target, target_side, STEP_OFFSET);
            EdgePath::from_points(round_corners(&corners, 0.0))
        }
        EdgeShape::SmoothStep => {
            let corners = step_points(source, source_side, target, target_side, STEP_OFFSET);
            EdgePath::from_points(round_corners(&corners, SMOOTHSTEP_RADIUS))
        }
    }
}

/// Resolve the path of `edge` between its endpoint nodes. Without explicit
/// handles edges leave the source at the bottom and enter the target at
/// the top.
pub fn edge_path(edge: &Edge, source: &Node, target: &Node) -> EdgePath {
    let source_side = edge.source_handle.map_or(HandleSide::Bottom, |h| h.side);
    let target_side = edge.target_handle.map_or(HandleSide::Top, |h| h.side);
    build_path(
        edge.shape,
        handle_anchor(source, source_side),
        source_side,
        handle_anchor(target, target_side),
        target_side,
    )
}

fn control_offset(distance: f64, curvature: f64) -> f64 {
    if distance >= 0.0 {
        0.5 * distance
    } else {
        curvature * 25.0 * (-distance).sqrt()
    }
}

fn control_point(side: HandleSide, from: Point, to: Point) -> Point {
    match side {
        HandleSide::Left => Point::new(from.x - control_offset(from.x - to.x, BEZIER_CURVATURE), from.y),
        HandleSide::Right => Point::new(from.x + control_offset(to.x - from.x, BEZIER_CURVATURE), from.y),
        HandleSide::Top => Point::new(from.x, from.y - control_offset(from.y - to.y, BEZIER_CURVATURE)),
        HandleSide::Bottom => Point::new(from.x, from.y + control_offset(to.y - from.y, BEZIER_CURVATURE)),
    }
}

fn bezier_path(source: Point, source_side: HandleSide, target: Point, target_side: HandleSide) -> EdgePath {
    let c1 = control_point(source_side, source, target);
    let c2 = control_point(target_side, target, source);

    let samples = (0..=CUBIC_SEGMENTS).map(|i| {
        let t = i as f64 / CUBIC_SEGMENTS as f64;
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        Point::new(
            a * source.x + b * c1.x + c * c2.x + d * target.x,
            a * source.y + b * c1.y + c * c2.y + d * target.y,
        )
    });

    EdgePath::from_points(samples)
}

fn axis(p: Point, horizontal: bool) -> f64 {
    if horizontal {
        p.x
    } else {
        p.y
    }
}

fn set_axis(p: &mut Point, horizontal: bool, value: f64) {
    if horizontal {
        p.x = value;
    } else {
        p.y = value;
    }
}

/// Corner points of an orthogonal route, the renderer's step routing:
/// leave each handle by `offset`, then connect with at most two bends.
fn step_points(
    source: Point,
    source_side: HandleSide,
    target: Point,
    target_side: HandleSide,
    offset: f64,
) -> Vec<Point> {
    let source_dir = source_side.direction();
    let target_dir = target_side.direction();
    let source_gapped = Point::new(source.x + source_dir.x * offset, source.y + source_dir.y * offset);
    let target_gapped = Point::new(target.x + target_dir.x * offset, target.y + target_dir.y * offset);

    // main travel direction between the gapped points
    let horizontal = source_side.is_horizontal();
    let curr_dir = if horizontal {
        if source_gapped.x < target_gapped.x { 1.0 } else { -1.0 }
    } else if source_gapped.y < target_gapped.y {
        1.0
    } else {
        -1.0
    };

    let center = source.lerp(&target, 0.5);
    let mut source_gap_offset = Point::default();
    let mut target_gap_offset = Point::default();

    let middle: Vec<Point> = if axis(source_dir, horizontal) * axis(target_dir, horizontal) == -1.0 {
        let vertical_split = vec![
            Point::new(center.x, source_gapped.y),
            Point::new(center.x, target_gapped.y),
        ];
        let horizontal_split = vec![
            Point::new(source_gapped.x, center.y),
            Point::new(target_gapped.x, center.y),
        ];
        if axis(source_dir, horizontal) == curr_dir {
            if horizontal { vertical_split } else { horizontal_split }
        } else if horizontal {
            horizontal_split
        } else {
            vertical_split
        }
    } else {
        let source_target = vec![Point::new(source_gapped.x, target_gapped.y)];
        let target_source = vec![Point::new(target_gapped.x, source_gapped.y)];

        let mut points = if horizontal {
            if source_dir.x == curr_dir { target_source.clone() } else { source_target.clone() }
        } else if source_dir.y == curr_dir {
            source_target.clone()
        } else {
            target_source.clone()
        };

        if source_side == target_side {
            let diff = (axis(source, horizontal) - axis(target, horizontal)).abs();
            if diff <= offset {
                let gap_offset = (offset - 1.0).min(offset - diff);
                if axis(source_dir, horizontal) == curr_dir {
                    let sign = if axis(source_gapped, horizontal) > axis(source, horizontal) { -1.0 } else { 1.0 };
                    set_axis(&mut source_gap_offset, horizontal, sign * gap_offset);
                } else {
                    let sign = if axis(target_gapped, horizontal) > axis(target, horizontal) { -1.0 } else { 1.0 };
                    set_axis(&mut target_gap_offset, horizontal, sign * gap_offset);
                }
            }
        } else {
            let same_dir = axis(source_dir, horizontal) == axis(target_dir, !horizontal);
            let source_gt = axis(source_gapped, !horizontal) > axis(target_gapped, !horizontal);
            let source_lt = axis(source_gapped, !horizontal) < axis(target_gapped, !horizontal);
            let flip = if axis(source_dir, horizontal) == 1.0 {
                (!same_dir && source_gt) || (same_dir && source_lt)
            } else {
                (!same_dir && source_lt) || (same_dir && source_gt)
            };
            if flip {
                points = if horizontal { source_target } else { target_source };
            }
        }

        points
    };

    let mut route = Vec::with_capacity(middle.len() + 4);
    route.push(source);
    route.push(source_gapped + source_gap_offset);
    route.extend(middle);
    route.push(target_gapped + target_gap_offset);
    route.push(target);
    route
}

/// Replace each interior corner with a quadratic bend of at most `radius`.
/// A zero radius keeps the sharp corners.
fn round_corners(corners: &[Point], radius: f64) -> Vec<Point> {
    if corners.len() < 3 || radius <= 0.0 {
        return corners.to_vec();
    }

    let mut out = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
    out.push(corners[0]);

    for window in corners.windows(3) {
        let (a, b, c) = (window[0], window[1], window[2]);
        let collinear = ((a.x - b.x).abs() < EPSILON && (b.x - c.x).abs() < EPSILON)
            || ((a.y - b.y).abs() < EPSILON && (b.y - c.y).abs() < EPSILON);
        let bend = (a.distance(&b) / 2.0).min(b.distance(&c) / 2.0).min(radius);
        if collinear || bend <= EPSILON {
            out.push(b);
            continue;
        }

        let (entry, exit) = if (a.y - b.y).abs() < EPSILON {
            let x_dir = if a.x < c.x { -1.0 } else { 1.0 };
            let y_dir = if a.y < c.y { 1.0 } else { -1.0 };
            (Point::new(b.x + bend * x_dir, b.y), Point::new(b.x, b.y + bend * y_dir))
        } else {
            let x_dir = if a.x < c.x { 1.0 } else { -1.0 };
            let y_dir = if a.y < c.y { -1.0 } else { 1.0 };
            (Point::new(b.x, b.y + bend * y_dir), Point::new(b.x + bend * x_dir, b.y))
        };

        for i in 0..=CORNER_SEGMENTS {
            let t = i as f64 / CORNER_SEGMENTS as f64;
            let mt = 1.0 - t;
            out.push(Point::new(
                mt * mt * entry.x + 2.0 * mt * t * b.x + t * t * exit.x,
                mt * mt * entry.y + 2.0 * mt * t * b.y + t * t * exit.y,
            ));
        }
    }

    out.push(corners[corners.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NodeKind;

    const SHAPES: [EdgeShape; 4] = [
        EdgeShape::Straight,
        EdgeShape::Step,
        EdgeShape::Bezier,
        EdgeShape::SmoothStep,
    ];

    fn close(a: Point, b: Point) -> bool {
        a.distance(&b) < 1e-6
    }

    #[test]
    fn test_endpoints_for_all_shapes() {
        let source = Point::new(10.0, 20.0);
        let target = Point::new(240.0, 180.0);
        let sides = [
            (HandleSide::Bottom, HandleSide::Top),
            (HandleSide::Right, HandleSide::Left),
            (HandleSide::Right, HandleSide::Top),
            (HandleSide::Top, HandleSide::Top),
            (HandleSide::Left, HandleSide::Bottom),
        ];

        for shape in SHAPES {
            for (s, t) in sides {
                let path = build_path(shape, source, s, target, t);
                assert!(close(path.point_at(0.0, Point::default()), source), "{shape:?} {s:?}->{t:?} start");
                assert!(close(path.point_at(1.0, Point::default()), target), "{shape:?} {s:?}->{t:?} end");
            }
        }
    }

    #[test]
    fn test_straight_midpoint_and_offset() {
        let path = build_path(
            EdgeShape::Straight,
            Point::new(0.0, 0.0),
            HandleSide::Bottom,
            Point::new(100.0, 0.0),
            HandleSide::Top,
        );
        assert!(close(path.point_at(0.5, Point::default()), Point::new(50.0, 0.0)));
        assert!(close(path.point_at(0.25, Point::new(0.0, -10.0)), Point::new(25.0, -10.0)));
    }

    #[test]
    fn test_t_is_clamped() {
        let path = EdgePath::from_points([Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert!(close(path.point_at(-3.0, Point::default()), Point::new(0.0, 0.0)));
        assert!(close(path.point_at(7.0, Point::default()), Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_step_routes_orthogonally() {
        let path = build_path(
            EdgeShape::Step,
            Point::new(0.0, 0.0),
            HandleSide::Bottom,
            Point::new(100.0, 200.0),
            HandleSide::Top,
        );
        for pair in path.points().windows(2) {
            let dx = (pair[0].x - pair[1].x).abs();
            let dy = (pair[0].y - pair[1].y).abs();
            assert!(dx < 1e-9 || dy < 1e-9, "diagonal segment {:?}", pair);
        }
        // down 20, across at the vertical center, down to the target
        assert!(close(path.points()[1], Point::new(0.0, 20.0)));
        assert!(close(path.points()[2], Point::new(0.0, 100.0)));
        assert!(close(path.points()[3], Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_smoothstep_is_no_longer_than_step() {
        let args = (Point::new(0.0, 0.0), HandleSide::Bottom, Point::new(100.0, 200.0), HandleSide::Top);
        let step = build_path(EdgeShape::Step, args.0, args.1, args.2, args.3);
        let smooth = build_path(EdgeShape::SmoothStep, args.0, args.1, args.2, args.3);
        assert!(smooth.total_length() < step.total_length());
        assert!(step.total_length() - smooth.total_length() < 10.0);
    }

    #[test]
    fn test_zero_length_path_falls_back_to_midpoint() {
        let p = Point::new(5.0, 5.0);
        let path = build_path(EdgeShape::Straight, p, HandleSide::Bottom, p, HandleSide::Top);
        assert!(close(path.point_at(0.8, Point::new(1.0, 1.0)), Point::new(6.0, 6.0)));
    }

    #[test]
    fn test_nearest_parameter_on_straight_line() {
        let path = EdgePath::from_points([Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
        let hit = path.nearest_parameter(Point::new(30.2, 12.0));
        assert!((hit.t - 0.30).abs() < 1e-9);
        assert!(close(hit.point, Point::new(30.0, 0.0)));

        let beyond = path.nearest_parameter(Point::new(-50.0, 0.0));
        assert_eq!(beyond.t, 0.0);
    }

    #[test]
    fn test_nearest_inverts_point_at() {
        let path = build_path(
            EdgeShape::Bezier,
            Point::new(0.0, 0.0),
            HandleSide::Right,
            Point::new(300.0, 120.0),
            HandleSide::Left,
        );
        let on_curve = path.point_at(0.42, Point::default());
        let hit = path.nearest_parameter(on_curve);
        assert!((hit.t - 0.42).abs() < 0.011);
    }

    #[test]
    fn test_viewport_maps_client_to_diagram() {
        let viewport = Viewport { x: 100.0, y: 50.0, zoom: 2.0 };
        assert_eq!(viewport.to_diagram(Point::new(300.0, 250.0)), Point::new(100.0, 100.0));

        let broken = Viewport { x: 0.0, y: 0.0, zoom: 0.0 };
        assert_eq!(broken.to_diagram(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
    }

    #[test]
    fn test_edge_path_uses_default_handles() {
        let a = Node::new("A", "A", NodeKind::Core, 0.0, 0.0);
        let b = Node::new("B", "B", NodeKind::Node, 0.0, 200.0);
        let edge = Edge::new("e1", "A", "B").with_shape(EdgeShape::Straight);
        let path = edge_path(&edge, &a, &b);
        assert!(close(path.start(), Point::new(60.0, 48.0)));
        assert!(close(path.end(), Point::new(60.0, 200.0)));
    }
}
