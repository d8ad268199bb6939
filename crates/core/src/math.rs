use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clamping {
    #[default]
    Clamp,
    Loop,
    PingPong,
}

pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Wraps `t` into `[0, length]`. Unlike a plain modulo, `repeat(length, length)`
/// returns `length` rather than `0`.
pub fn repeat(t: f32, length: f32) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    if t == length {
        return t;
    }
    t - (t / length).floor() * length
}

fn wrap(t: f32, length: f32) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    (t - (t / length).floor() * length).clamp(0.0, length)
}

pub fn ping_pong(t: f32, length: f32) -> f32 {
    let t = wrap(t, length * 2.0);
    length - (t - length).abs()
}

pub fn map_value(min: f32, max: f32, value: f32, v_min: f32, v_max: f32) -> f32 {
    min + (max - min) * (value - v_min) / (v_max - v_min)
}

pub fn fix_nan(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

pub fn fix_nan_vec3(value: Vec3) -> Vec3 {
    Vec3::new(fix_nan(value.x), fix_nan(value.y), fix_nan(value.z))
}

pub fn snap_precision(value: f32, decimals: i32) -> f32 {
    if decimals < 0 {
        return value;
    }
    let factor = 10f64.powi(decimals);
    ((value as f64 * factor).round() / factor) as f32
}

pub fn clamp_tf(tf: f32, clamping: Clamping) -> f32 {
    match clamping {
        Clamping::Loop => wrap(tf, 1.0),
        Clamping::PingPong => ping_pong(tf, 1.0),
        Clamping::Clamp => clamp01(tf),
    }
}

pub fn clamp_tf_dir(tf: f32, dir: &mut i32, clamping: Clamping, min_tf: f32, max_tf: f32) -> f32 {
    let min_tf = clamp01(min_tf);
    let max_tf = max_tf.clamp(min_tf, 1.0);
    let span = max_tf - min_tf;
    match clamping {
        Clamping::Loop => min_tf + wrap(tf, span),
        Clamping::PingPong => {
            if span > 0.0 && (tf / span).floor() as i64 % 2 != 0 {
                *dir = -*dir;
            }
            min_tf + ping_pong(tf, span)
        }
        Clamping::Clamp => tf.clamp(min_tf, max_tf),
    }
}

pub fn clamp_distance(distance: f32, clamping: Clamping, length: f32) -> f32 {
    if length == 0.0 {
        return 0.0;
    }
    match clamping {
        Clamping::Loop => wrap(distance, length),
        Clamping::PingPong => ping_pong(distance, length),
        Clamping::Clamp => distance.clamp(0.0, length),
    }
}

pub fn clamp_distance_dir(
    distance: f32,
    dir: &mut i32,
    clamping: Clamping,
    length: f32,
    min: f32,
    max: f32,
) -> f32 {
    if length == 0.0 {
        return 0.0;
    }
    let min = min.clamp(0.0, length);
    let max = max.clamp(min, length);
    let span = max - min;
    match clamping {
        Clamping::Loop => min + wrap(distance, span),
        Clamping::PingPong => {
            if span > 0.0 && (distance / span).floor() as i64 % 2 != 0 {
                *dir = -*dir;
            }
            min + ping_pong(distance, span)
        }
        Clamping::Clamp => distance.clamp(min, max),
    }
}

/// Squared distance from `p` to the segment `l1..l2`, together with the
/// fragment (0..1) of the nearest point on the segment.
pub fn line_point_distance_sqr(l1: Vec3, l2: Vec3, p: Vec3) -> (f32, f32) {
    let v = l2 - l1;
    let w = p - l1;
    let c1 = w.dot(v);
    if c1 <= 0.0 {
        return ((p - l1).length_squared(), 0.0);
    }
    let c2 = v.dot(v);
    if c2 <= c1 {
        return ((p - l2).length_squared(), 1.0);
    }
    let frag = c1 / c2;
    let nearest = l1 + v * frag;
    ((p - nearest).length_squared(), frag)
}

pub fn ray_segment_intersection(origin: Vec2, dir: Vec2, l1: Vec2, l2: Vec2) -> Option<(Vec2, f32)> {
    let s = l2 - l1;
    let denom = -s.x * dir.y + dir.x * s.y;
    if denom == 0.0 {
        return None;
    }
    let frag = (-dir.y * (origin.x - l1.x) + dir.x * (origin.y - l1.y)) / denom;
    let t = (s.x * (origin.y - l1.y) - s.y * (origin.x - l1.x)) / denom;
    if (0.0..=1.0).contains(&frag) && t > 0.0 {
        Some((origin + dir * t, frag))
    } else {
        None
    }
}

pub fn line_line_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2, segment_only: bool) -> Option<Vec2> {
    let d = (b2.y - b1.y) as f64 * (a2.x - a1.x) as f64 - (b2.x - b1.x) as f64 * (a2.y - a1.y) as f64;
    if d == 0.0 {
        return None;
    }
    let n_a = (b2.x - b1.x) as f64 * (a1.y - b1.y) as f64 - (b2.y - b1.y) as f64 * (a1.x - b1.x) as f64;
    let n_b = (a2.x - a1.x) as f64 * (a1.y - b1.y) as f64 - (a2.y - a1.y) as f64 * (a1.x - b1.x) as f64;
    let ua = n_a / d;
    let ub = n_b / d;
    if segment_only && !((0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub)) {
        return None;
    }
    Some(Vec2::new(
        (a1.x as f64 + ua * (a2.x - a1.x) as f64) as f32,
        (a1.y as f64 + ua * (a2.y - a1.y) as f64) as f32,
    ))
}

/// Shortest segment connecting two infinite 3D lines, as `(on_a, on_b)`.
/// `None` for degenerate or parallel lines.
pub fn shortest_intersection_line(a1: Vec3, a2: Vec3, b1: Vec3, b2: Vec3) -> Option<(Vec3, Vec3)> {
    let p13 = (a1 - b1).as_dvec3();
    let p43 = (b2 - b1).as_dvec3();
    if p43.length_squared() < f32::EPSILON as f64 {
        return None;
    }
    let p21 = (a2 - a1).as_dvec3();
    if p21.length_squared() < f32::EPSILON as f64 {
        return None;
    }

    let d1343 = p13.dot(p43);
    let d4321 = p43.dot(p21);
    let d1321 = p13.dot(p21);
    let d4343 = p43.dot(p43);
    let d2121 = p21.dot(p21);

    let denom = d2121 * d4343 - d4321 * d4321;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let mua = (d1343 * d4321 - d1321 * d4343) / denom;
    let mub = (d1343 + d4321 * mua) / d4343;
    let on_a = a1.as_dvec3() + p21 * mua;
    let on_b = b1.as_dvec3() + p43 * mub;
    Some((on_a.as_vec3(), on_b.as_vec3()))
}

pub fn line_line_intersection(a1: Vec3, a2: Vec3, b1: Vec3, b2: Vec3) -> Option<Vec3> {
    let (on_a, on_b) = shortest_intersection_line(a1, a2, b1, b2)?;
    if (on_b - on_a).length_squared() <= f32::EPSILON * f32::EPSILON {
        Some(on_a)
    } else {
        None
    }
}

/// Rotation whose local +Z looks along `forward` with local +Y as close to
/// `up` as possible. Degenerate inputs fall back to a stable basis.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let Some(z) = forward.try_normalize() else {
        return Quat::IDENTITY;
    };
    let x = up
        .cross(z)
        .try_normalize()
        .or_else(|| Vec3::Y.cross(z).try_normalize())
        .unwrap_or_else(|| Vec3::X.cross(z).normalize());
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}

pub fn section_frame(position: Vec3, tangent: Vec3, normal: Vec3) -> Mat4 {
    Mat4::from_rotation_translation(look_rotation(tangent, normal), position)
}

/// Inverse of [`section_frame`]: projects volume-space points onto the
/// section plane (local XY) with the tangent as the plane normal.
pub fn section_projection(position: Vec3, tangent: Vec3, normal: Vec3) -> Mat4 {
    let inverse = look_rotation(tangent, normal).inverse();
    Mat4::from_rotation_translation(inverse, -(inverse * position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn repeat_keeps_upper_bound() {
        assert_eq!(repeat(1.0, 1.0), 1.0);
        assert_relative_eq!(repeat(1.25, 1.0), 0.25);
        assert_relative_eq!(repeat(-0.25, 1.0), 0.75);
        assert_eq!(repeat(3.0, 0.0), 0.0);
    }

    #[test]
    fn ping_pong_bounces() {
        assert_relative_eq!(ping_pong(0.25, 1.0), 0.25);
        assert_relative_eq!(ping_pong(1.25, 1.0), 0.75);
        assert_relative_eq!(ping_pong(2.25, 1.0), 0.25);
    }

    #[test]
    fn clamp_tf_modes() {
        assert_eq!(clamp_tf(1.5, Clamping::Clamp), 1.0);
        assert_relative_eq!(clamp_tf(1.5, Clamping::Loop), 0.5);
        assert_relative_eq!(clamp_tf(1.25, Clamping::PingPong), 0.75);
    }

    #[test]
    fn ping_pong_flips_direction() {
        let mut dir = 1;
        let tf = clamp_tf_dir(1.25, &mut dir, Clamping::PingPong, 0.0, 1.0);
        assert_relative_eq!(tf, 0.75);
        assert_eq!(dir, -1);
    }

    #[test]
    fn distance_clamping_on_empty_path() {
        assert_eq!(clamp_distance(5.0, Clamping::Loop, 0.0), 0.0);
        assert_relative_eq!(clamp_distance(12.0, Clamping::Loop, 10.0), 2.0);
    }

    #[test]
    fn map_and_snap() {
        assert_relative_eq!(map_value(0.0, 10.0, 0.0, -1.0, 1.0), 5.0);
        assert_relative_eq!(snap_precision(1.23456, 2), 1.23);
        assert_eq!(snap_precision(1.23456, -1), 1.23456);
        assert_eq!(fix_nan(f32::NAN), 0.0);
    }

    #[test]
    fn point_segment_distance() {
        let (dist, frag) =
            line_point_distance_sqr(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(dist, 1.0);
        assert_relative_eq!(frag, 0.5);
    }

    #[test]
    fn segment_intersections() {
        let hit = line_line_intersect(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(2.0, 0.0),
            true,
        )
        .expect("segments cross");
        assert_relative_eq!(hit.x, 1.0);
        assert_relative_eq!(hit.y, 1.0);

        let (hit, frag) = ray_segment_intersection(
            Vec2::ZERO,
            Vec2::X,
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
        )
        .expect("ray hits segment");
        assert_relative_eq!(hit.x, 1.0);
        assert_relative_eq!(frag, 0.5);
    }

    #[test]
    fn skew_lines_do_not_intersect() {
        let a = line_line_intersection(Vec3::ZERO, Vec3::X, Vec3::new(0.0, 1.0, 1.0), Vec3::new(0.0, 1.0, 2.0));
        assert!(a.is_none());
        let b = line_line_intersection(Vec3::ZERO, Vec3::X, Vec3::new(0.5, -1.0, 0.0), Vec3::new(0.5, 1.0, 0.0))
            .expect("lines cross");
        assert_relative_eq!(b.x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn projection_inverts_frame() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let tangent = Vec3::new(1.0, 0.0, 1.0);
        let normal = Vec3::Y;
        let frame = section_frame(position, tangent, normal);
        let projection = section_projection(position, tangent, normal);
        let p = Vec3::new(0.3, -0.7, 0.2);
        let back = frame.transform_point3(projection.transform_point3(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-5);
    }

    #[test]
    fn tangent_becomes_plane_normal() {
        let projection = section_projection(Vec3::ZERO, Vec3::X, Vec3::Y);
        let along = projection.transform_vector3(Vec3::X);
        assert_relative_eq!(along.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn look_rotation_survives_parallel_up() {
        let q = look_rotation(Vec3::Y, Vec3::Y);
        assert!(q.is_finite());
        let z = q * Vec3::Z;
        assert_relative_eq!(z.y, 1.0, epsilon = 1e-6);
        assert_eq!(look_rotation(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);
    }
}
