use glam::{DVec2, Vec2};

const AREA_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriangulationError {
    #[error("loop {loop_index} has {count} vertices, at least 3 are required")]
    TooFewVertices { loop_index: usize, count: usize },
    #[error("loop {loop_index} has zero area")]
    Degenerate { loop_index: usize },
    #[error("polygon edges intersect")]
    SelfIntersection,
    #[error("hole {hole} is not inside the outer loop")]
    HoleOutside { hole: usize },
    #[error("no ear found with {remaining} vertices left")]
    NoEar { remaining: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    pub vertices: Vec<Vec2>,
    pub triangles: Vec<[u32; 3]>,
}

impl Triangulation {
    pub fn indices(&self, reverse: bool) -> Vec<u32> {
        let mut indices = Vec::with_capacity(self.triangles.len() * 3);
        for tri in &self.triangles {
            if reverse {
                indices.extend_from_slice(&[tri[0], tri[2], tri[1]]);
            } else {
                indices.extend_from_slice(tri);
            }
        }
        indices
    }
}

/// Ear clipping over a polygon with holes. Either winding is accepted.
pub fn triangulate(outer: &[Vec2], holes: &[Vec<Vec2>]) -> Result<Triangulation, TriangulationError> {
    let loops: Vec<&[Vec2]> = std::iter::once(outer)
        .chain(holes.iter().map(Vec::as_slice))
        .collect();

    for (loop_index, ring) in loops.iter().enumerate() {
        if ring.len() < 3 {
            return Err(TriangulationError::TooFewVertices {
                loop_index,
                count: ring.len(),
            });
        }
    }

    let points: Vec<DVec2> = loops
        .iter()
        .flat_map(|ring| ring.iter().map(|p| p.as_dvec2()))
        .collect();

    let mut ranges = Vec::with_capacity(loops.len());
    let mut start = 0;
    for ring in &loops {
        ranges.push(start..start + ring.len());
        start += ring.len();
    }

    let mut rings: Vec<Vec<usize>> = Vec::with_capacity(ranges.len());
    for (loop_index, range) in ranges.iter().enumerate() {
        let mut ring: Vec<usize> = range.clone().collect();
        let area = signed_area(&points, &ring);
        if area.abs() <= AREA_EPSILON {
            return Err(TriangulationError::Degenerate { loop_index });
        }
        // Outer loop counter-clockwise, holes clockwise.
        let want_ccw = loop_index == 0;
        if (area > 0.0) != want_ccw {
            ring.reverse();
        }
        rings.push(ring);
    }

    if has_crossing_edges(&points, &rings) {
        return Err(TriangulationError::SelfIntersection);
    }

    let mut rings = rings.into_iter();
    let mut outer_ring = rings.next().unwrap_or_default();
    let mut hole_rings: Vec<(usize, Vec<usize>)> = rings.enumerate().collect();

    for (hole, ring) in &hole_rings {
        if !point_in_ring(&points, &outer_ring, points[ring[0]]) {
            return Err(TriangulationError::HoleOutside { hole: *hole });
        }
    }

    // Rightmost holes first so later bridges never cross earlier ones.
    hole_rings.sort_by(|(_, a), (_, b)| {
        let ax = max_x(&points, a);
        let bx = max_x(&points, b);
        bx.total_cmp(&ax)
    });
    for (hole, ring) in &hole_rings {
        bridge_hole(&points, &mut outer_ring, ring)
            .ok_or(TriangulationError::HoleOutside { hole: *hole })?;
    }

    let triangles = clip_ears(&points, outer_ring)?;
    Ok(Triangulation {
        vertices: points.iter().map(|p| p.as_vec2()).collect(),
        triangles,
    })
}

fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
    (a - o).perp_dot(b - o)
}

fn signed_area(points: &[DVec2], ring: &[usize]) -> f64 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[(i + 1) % n]];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

fn max_x(points: &[DVec2], ring: &[usize]) -> f64 {
    ring.iter()
        .map(|i| points[*i].x)
        .fold(f64::NEG_INFINITY, f64::max)
}

fn segments_cross(a1: DVec2, a2: DVec2, b1: DVec2, b2: DVec2) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    ((d1 > AREA_EPSILON && d2 < -AREA_EPSILON) || (d1 < -AREA_EPSILON && d2 > AREA_EPSILON))
        && ((d3 > AREA_EPSILON && d4 < -AREA_EPSILON) || (d3 < -AREA_EPSILON && d4 > AREA_EPSILON))
}

fn has_crossing_edges(points: &[DVec2], rings: &[Vec<usize>]) -> bool {
    let mut edges = Vec::new();
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            edges.push((ring[i], ring[(i + 1) % n]));
        }
    }
    for (i, &(a1, a2)) in edges.iter().enumerate() {
        for &(b1, b2) in &edges[i + 1..] {
            if a1 == b1 || a1 == b2 || a2 == b1 || a2 == b2 {
                continue;
            }
            if segments_cross(points[a1], points[a2], points[b1], points[b2]) {
                return true;
            }
        }
    }
    false
}

fn point_in_ring(points: &[DVec2], ring: &[usize], p: DVec2) -> bool {
    let n = ring.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[j]];
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    cross(a, b, p) >= -AREA_EPSILON
        && cross(b, c, p) >= -AREA_EPSILON
        && cross(c, a, p) >= -AREA_EPSILON
}

fn sector_contains(prev: DVec2, p: DVec2, next: DVec2, target: DVec2) -> bool {
    let left_of_in = cross(prev, p, target) > 0.0;
    let left_of_out = cross(p, next, target) > 0.0;
    if cross(prev, p, next) >= 0.0 {
        left_of_in && left_of_out
    } else {
        left_of_in || left_of_out
    }
}

/// Splices `hole` into `ring` through a bridge from the hole's rightmost
/// vertex to a mutually visible ring vertex.
fn bridge_hole(points: &[DVec2], ring: &mut Vec<usize>, hole: &[usize]) -> Option<()> {
    let (hole_start, &m_index) = hole
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| points[**a].x.total_cmp(&points[**b].x))?;
    let m = points[m_index];

    // Cast a ray towards +x and keep the closest edge hit.
    let n = ring.len();
    let mut best: Option<(f64, usize)> = None;
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[(i + 1) % n]];
        if (a.y > m.y) == (b.y > m.y) && a.y != m.y && b.y != m.y {
            continue;
        }
        if (a.y - b.y).abs() <= f64::EPSILON {
            continue;
        }
        let t = (m.y - a.y) / (b.y - a.y);
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let x = a.x + t * (b.x - a.x);
        if x < m.x {
            continue;
        }
        // Pick the endpoint with the larger x as the bridge candidate.
        let candidate = if a.x >= b.x { i } else { (i + 1) % n };
        if best.map_or(true, |(best_x, _)| x < best_x) {
            best = Some((x, candidate));
        }
    }
    let (hit_x, mut target) = best?;
    let hit = DVec2::new(hit_x, m.y);
    let p = points[ring[target]];

    if p != hit {
        // A reflex vertex inside (m, hit, p) blocks visibility; use the one
        // closest in angle to the ray instead.
        let mut best_angle = f64::INFINITY;
        let mut best_distance = f64::INFINITY;
        for i in 0..n {
            let candidate = points[ring[i]];
            if i == target || candidate == m {
                continue;
            }
            let prev = points[ring[(i + n - 1) % n]];
            let next = points[ring[(i + 1) % n]];
            let reflex = cross(prev, candidate, next) < 0.0;
            let inside = if p.y > m.y {
                point_in_triangle(candidate, m, hit, p)
            } else {
                point_in_triangle(candidate, m, p, hit)
            };
            if !reflex || !inside {
                continue;
            }
            let offset = candidate - m;
            let angle = (offset.y / offset.x.max(f64::EPSILON)).abs();
            let distance = offset.length_squared();
            if angle < best_angle || (angle == best_angle && distance < best_distance) {
                best_angle = angle;
                best_distance = distance;
                target = i;
            }
        }
    }

    // The chosen vertex may already appear twice from an earlier bridge; take
    // the occurrence whose interior wedge faces the hole.
    let vertex = ring[target];
    if let Some(occurrence) = (0..n).filter(|i| ring[*i] == vertex).find(|i| {
        let prev = points[ring[(i + n - 1) % n]];
        let next = points[ring[(i + 1) % n]];
        sector_contains(prev, points[vertex], next, m)
    }) {
        target = occurrence;
    }

    let mut spliced = Vec::with_capacity(n + hole.len() + 2);
    spliced.extend_from_slice(&ring[..=target]);
    spliced.extend(hole[hole_start..].iter().chain(&hole[..hole_start]).copied());
    spliced.push(m_index);
    spliced.push(ring[target]);
    spliced.extend_from_slice(&ring[target + 1..]);
    *ring = spliced;
    Some(())
}

fn is_ear(points: &[DVec2], ring: &[usize], i: usize) -> bool {
    let n = ring.len();
    let a = points[ring[(i + n - 1) % n]];
    let b = points[ring[i]];
    let c = points[ring[(i + 1) % n]];
    if cross(a, b, c) <= AREA_EPSILON {
        return false;
    }
    ring.iter().all(|&other| {
        let p = points[other];
        p == a || p == b || p == c || !point_in_triangle(p, a, b, c)
    })
}

/// Removes `ring[i]` and refreshes the ear flags of its two new neighbours.
/// Clipping a vertex only changes the triangles of those neighbours.
fn remove_vertex(points: &[DVec2], ring: &mut Vec<usize>, ears: &mut Vec<bool>, i: usize) {
    ring.remove(i);
    ears.remove(i);
    let n = ring.len();
    if n < 3 {
        return;
    }
    let prev = (i + n - 1) % n;
    let next = i % n;
    ears[prev] = is_ear(points, ring, prev);
    ears[next] = is_ear(points, ring, next);
}

fn clip_ears(points: &[DVec2], mut ring: Vec<usize>) -> Result<Vec<[u32; 3]>, TriangulationError> {
    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));
    let mut ears: Vec<bool> = (0..ring.len()).map(|i| is_ear(points, &ring, i)).collect();
    let mut rescanned = false;
    while ring.len() > 3 {
        let n = ring.len();
        if let Some(i) = ears.iter().position(|ear| *ear) {
            triangles.push([
                ring[(i + n - 1) % n] as u32,
                ring[i] as u32,
                ring[(i + 1) % n] as u32,
            ]);
            remove_vertex(points, &mut ring, &mut ears, i);
            rescanned = false;
            continue;
        }
        // A clipped vertex may have been the only one blocking a distant ear.
        if !rescanned {
            ears = (0..n).map(|i| is_ear(points, &ring, i)).collect();
            rescanned = true;
            continue;
        }
        // Collinear vertices never form ears; drop one and retry.
        let flat = (0..n).find(|i| {
            let a = points[ring[(i + n - 1) % n]];
            let b = points[ring[*i]];
            let c = points[ring[(i + 1) % n]];
            cross(a, b, c).abs() <= AREA_EPSILON
        });
        match flat {
            Some(i) => {
                remove_vertex(points, &mut ring, &mut ears, i);
                rescanned = false;
            }
            None => return Err(TriangulationError::NoEar { remaining: n }),
        }
    }
    if ring.len() == 3 && cross(points[ring[0]], points[ring[1]], points[ring[2]]) > AREA_EPSILON {
        triangles.push([ring[0] as u32, ring[1] as u32, ring[2] as u32]);
    }
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(min: f32, max: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(min, min),
            Vec2::new(max, min),
            Vec2::new(max, max),
            Vec2::new(min, max),
        ]
    }

    fn total_area(result: &Triangulation) -> f32 {
        result
            .triangles
            .iter()
            .map(|[a, b, c]| {
                let a = result.vertices[*a as usize];
                let b = result.vertices[*b as usize];
                let c = result.vertices[*c as usize];
                (b - a).perp_dot(c - a) * 0.5
            })
            .sum()
    }

    #[test]
    fn unit_square() {
        let result = triangulate(&square(0.0, 1.0), &[]).expect("triangulate");
        assert_eq!(result.triangles, vec![[3, 0, 1], [1, 2, 3]]);
        assert_relative_eq!(total_area(&result), 1.0);
    }

    #[test]
    fn clockwise_input_is_wound_counter_clockwise() {
        let mut outer = square(0.0, 1.0);
        outer.reverse();
        let result = triangulate(&outer, &[]).expect("triangulate");
        assert_eq!(result.triangles.len(), 2);
        assert_relative_eq!(total_area(&result), 1.0);
    }

    #[test]
    fn concave_polygon() {
        let outer = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(1.0, 0.5),
            Vec2::new(0.0, 2.0),
        ];
        let result = triangulate(&outer, &[]).expect("triangulate");
        assert_eq!(result.triangles.len(), 3);
        assert_relative_eq!(total_area(&result), 2.5, epsilon = 1e-5);
    }

    #[test]
    fn square_with_hole() {
        let result = triangulate(&square(0.0, 4.0), &[square(1.0, 3.0)]).expect("triangulate");
        assert_eq!(result.vertices.len(), 8);
        // n + 2h - 2 triangles for n vertices and h holes.
        assert_eq!(result.triangles.len(), 8);
        assert_relative_eq!(total_area(&result), 12.0, epsilon = 1e-4);
        for tri in &result.triangles {
            let a = result.vertices[tri[0] as usize];
            let b = result.vertices[tri[1] as usize];
            let c = result.vertices[tri[2] as usize];
            assert!((b - a).perp_dot(c - a) > 0.0);
        }
    }

    #[test]
    fn two_holes() {
        let holes = vec![
            vec![
                Vec2::new(1.0, 1.0),
                Vec2::new(2.0, 1.0),
                Vec2::new(2.0, 2.0),
                Vec2::new(1.0, 2.0),
            ],
            vec![
                Vec2::new(4.0, 1.0),
                Vec2::new(5.0, 1.0),
                Vec2::new(5.0, 2.0),
                Vec2::new(4.0, 2.0),
            ],
        ];
        let outer = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(6.0, 0.0),
            Vec2::new(6.0, 3.0),
            Vec2::new(0.0, 3.0),
        ];
        let result = triangulate(&outer, &holes).expect("triangulate");
        assert_eq!(result.triangles.len(), 4 + 8 + 4 - 2);
        assert_relative_eq!(total_area(&result), 16.0, epsilon = 1e-4);
    }

    #[test]
    fn dense_circle() {
        let n = 2000;
        let circle: Vec<Vec2> = (0..n)
            .map(|i| {
                let angle = i as f32 / n as f32 * std::f32::consts::TAU;
                Vec2::new(angle.cos(), angle.sin()) * 10.0
            })
            .collect();
        let result = triangulate(&circle, &[]).expect("triangulate");
        assert_eq!(result.triangles.len(), n - 2);
        let expected = 0.5 * n as f32 * 100.0 * (std::f32::consts::TAU / n as f32).sin();
        assert_relative_eq!(total_area(&result), expected, epsilon = 1e-2);
    }

    #[test]
    fn comb_with_many_reflex_vertices() {
        let mut comb = vec![Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0)];
        for tooth in (0..10).rev() {
            let x = tooth as f32 * 2.0;
            comb.push(Vec2::new(x + 2.0, 3.0));
            comb.push(Vec2::new(x + 1.0, 1.0));
        }
        let result = triangulate(&comb, &[]).expect("triangulate");
        assert_eq!(result.triangles.len(), comb.len() - 2);
        assert_relative_eq!(total_area(&result), 38.5, epsilon = 1e-4);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            triangulate(&[Vec2::ZERO, Vec2::X], &[]),
            Err(TriangulationError::TooFewVertices {
                loop_index: 0,
                count: 2
            })
        );
        assert_eq!(
            triangulate(&[Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0)], &[]),
            Err(TriangulationError::Degenerate { loop_index: 0 })
        );
        let bowtie = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        assert_eq!(
            triangulate(&bowtie, &[]),
            Err(TriangulationError::SelfIntersection)
        );
        assert_eq!(
            triangulate(&square(0.0, 1.0), &[square(5.0, 6.0)]),
            Err(TriangulationError::HoleOutside { hole: 0 })
        );
    }

    #[test]
    fn reversed_indices_flip_winding() {
        let result = triangulate(&square(0.0, 1.0), &[]).expect("triangulate");
        assert_eq!(result.indices(false), vec![3, 0, 1, 1, 2, 3]);
        assert_eq!(result.indices(true), vec![3, 1, 0, 1, 3, 2]);
    }
}
