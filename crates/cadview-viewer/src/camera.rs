//! Preset camera views framing the visible scene.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cadview_ir::Aabb;

/// Distance from the target, in multiples of the bounds' diagonal.
const FRAMING: f32 = 1.2;

/// A named camera direction. glTF is Y-up, with the front facing +Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPreset {
    /// Looking along -Z.
    Front,
    /// Looking along +Z.
    Back,
    /// Looking along +X.
    Left,
    /// Looking along -X.
    Right,
    /// Looking down.
    Top,
    /// Looking up.
    Bottom,
    /// From the (+X, +Y, +Z) octant.
    Iso,
}

impl ViewPreset {
    /// Every preset, in toolbar order.
    pub const ALL: [ViewPreset; 7] = [
        ViewPreset::Front,
        ViewPreset::Back,
        ViewPreset::Left,
        ViewPreset::Right,
        ViewPreset::Top,
        ViewPreset::Bottom,
        ViewPreset::Iso,
    ];

    /// Unit vector from the target towards the eye, and the up vector.
    fn direction(self) -> ([f32; 3], [f32; 3]) {
        const Y: [f32; 3] = [0.0, 1.0, 0.0];
        let k = 1.0 / 3f32.sqrt();
        match self {
            ViewPreset::Front => ([0.0, 0.0, 1.0], Y),
            ViewPreset::Back => ([0.0, 0.0, -1.0], Y),
            ViewPreset::Left => ([-1.0, 0.0, 0.0], Y),
            ViewPreset::Right => ([1.0, 0.0, 0.0], Y),
            ViewPreset::Top => ([0.0, 1.0, 0.0], [0.0, 0.0, -1.0]),
            ViewPreset::Bottom => ([0.0, -1.0, 0.0], [0.0, 0.0, 1.0]),
            ViewPreset::Iso => ([k, k, k], Y),
        }
    }
}

impl FromStr for ViewPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| format!("{p:?}").eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown view preset: {s}"))
    }
}

/// A look-at camera placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraView {
    /// Camera position.
    pub eye: [f32; 3],
    /// Point looked at.
    pub target: [f32; 3],
    /// Up direction.
    pub up: [f32; 3],
}

/// Frame `bounds` from a preset direction.
///
/// Without bounds (empty or fully hidden scene) a unit box at the origin is
/// framed instead.
pub fn camera_view(bounds: Option<Aabb>, preset: ViewPreset) -> CameraView {
    let bounds = bounds.unwrap_or(Aabb {
        min: [-0.5; 3],
        max: [0.5; 3],
    });
    let target = bounds.center();
    let distance = bounds.diagonal().max(1e-3) * FRAMING;
    let (dir, up) = preset.direction();
    CameraView {
        eye: [
            target[0] + dir[0] * distance,
            target[1] + dir[1] * distance,
            target[2] + dir[2] * distance,
        ],
        target,
        up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_front_view_frames_bounds() {
        let bounds = Aabb {
            min: [0.0, 0.0, 0.0],
            max: [2.0, 2.0, 1.0],
        };
        let view = camera_view(Some(bounds), ViewPreset::Front);
        assert_eq!(view.target, [1.0, 1.0, 0.5]);
        assert_relative_eq!(view.eye[2], 0.5 + 3.0 * FRAMING, epsilon = 1e-5);
        assert_eq!(view.up, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_iso_distance_matches_axis_views() {
        let front = camera_view(None, ViewPreset::Front);
        let iso = camera_view(None, ViewPreset::Iso);
        let dist = |v: CameraView| {
            (0..3)
                .map(|i| (v.eye[i] - v.target[i]).powi(2))
                .sum::<f32>()
                .sqrt()
        };
        assert_relative_eq!(dist(front), dist(iso), epsilon = 1e-5);
    }

    #[test]
    fn test_parse_preset() {
        assert_eq!("top".parse::<ViewPreset>(), Ok(ViewPreset::Top));
        assert_eq!("ISO".parse::<ViewPreset>(), Ok(ViewPreset::Iso));
        assert!("diagonal".parse::<ViewPreset>().is_err());
    }
}
