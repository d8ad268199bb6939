use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::section_frame;

/// One sampled slice of a volume. `vertices` is the closed boundary ring,
/// already placed in volume space around `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    pub position: [f32; 3],
    pub tangent: [f32; 3],
    pub normal: [f32; 3],
    pub vertices: Vec<[f32; 3]>,
}

impl CrossSection {
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    pub fn tangent(&self) -> Vec3 {
        Vec3::from(self.tangent)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub sections: Vec<CrossSection>,
    pub seamless: bool,
}

impl Volume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(sections: Vec<CrossSection>, seamless: bool) -> Self {
        Self { sections, seamless }
    }

    pub fn count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, index: usize) -> Option<&CrossSection> {
        self.sections.get(index)
    }

    pub fn first(&self) -> Option<&CrossSection> {
        self.sections.first()
    }

    pub fn last(&self) -> Option<&CrossSection> {
        self.sections.last()
    }

    pub fn push(&mut self, section: CrossSection) {
        self.sections.push(section);
    }
}

pub fn rectangle_profile(size: [f32; 2]) -> Vec<[f32; 2]> {
    let hx = size[0] * 0.5;
    let hy = size[1] * 0.5;
    vec![[-hx, -hy], [hx, -hy], [hx, hy], [-hx, hy]]
}

pub fn polygon_profile(radius: f32, sides: u32) -> Vec<[f32; 2]> {
    (0..sides)
        .map(|i| {
            let angle = i as f32 / sides as f32 * std::f32::consts::TAU;
            [radius * angle.cos(), radius * angle.sin()]
        })
        .collect()
}

/// Sweeps a 2D profile along +Z. Every section uses +Z as tangent and +Y as
/// normal; `sections` is clamped to at least one.
pub fn make_swept_volume(profile: &[[f32; 2]], length: f32, sections: u32, seamless: bool) -> Volume {
    let count = sections.max(1);
    let step = if count > 1 {
        length / (count - 1) as f32
    } else {
        0.0
    };

    let mut volume = Volume::with_sections(Vec::with_capacity(count as usize), seamless);
    for i in 0..count {
        let position = Vec3::new(0.0, 0.0, i as f32 * step);
        let frame = section_frame(position, Vec3::Z, Vec3::Y);
        let vertices = profile
            .iter()
            .map(|p| {
                let local = Vec2::from(*p).extend(0.0);
                frame.transform_point3(local).to_array()
            })
            .collect();
        volume.push(CrossSection {
            position: position.to_array(),
            tangent: Vec3::Z.to_array(),
            normal: Vec3::Y.to_array(),
            vertices,
        });
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swept_volume_spans_length() {
        let volume = make_swept_volume(&rectangle_profile([2.0, 1.0]), 4.0, 3, false);
        assert_eq!(volume.count(), 3);
        assert_eq!(volume.first().expect("first").position, [0.0, 0.0, 0.0]);
        assert_eq!(volume.last().expect("last").position, [0.0, 0.0, 4.0]);
        let ring = &volume.last().expect("last").vertices;
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[2], [1.0, 0.5, 4.0]);
    }

    #[test]
    fn single_section_volume() {
        let volume = make_swept_volume(&rectangle_profile([1.0, 1.0]), 4.0, 0, true);
        assert_eq!(volume.count(), 1);
        assert!(volume.seamless);
    }

    #[test]
    fn polygon_profile_has_requested_sides() {
        let profile = polygon_profile(1.0, 6);
        assert_eq!(profile.len(), 6);
        assert!((profile[0][0] - 1.0).abs() < 1e-6);
    }
}
