//! Closed-form yaw + translation fit over paired observations.

use contracts::Vector3;
use nalgebra::{Rotation3, Vector3 as NVector3};

/// One joint observed at the same instant from both frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosePair {
    pub host_position: Vector3,
    pub client_position: Vector3,
}

/// Yaw + translation computed from one pair window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentCandidate {
    pub theta_degrees: f64,
    pub translation: Vector3,
}

#[inline]
fn to_na(v: Vector3) -> NVector3<f64> {
    NVector3::new(v.x, v.y, v.z)
}

#[inline]
fn from_na(v: NVector3<f64>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

/// Rotation of `theta_degrees` about the vertical axis
pub fn yaw_rotation(theta_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&NVector3::y_axis(), theta_degrees.to_radians())
}

/// Fit the yaw and translation between the host and client point sets
///
/// Returns `None` for an empty window.
pub fn solve_yaw_alignment<'a, I>(pairs: I) -> Option<AlignmentCandidate>
where
    I: IntoIterator<Item = &'a PosePair>,
{
    let pairs: Vec<&PosePair> = pairs.into_iter().collect();
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f64;

    let host_centroid = pairs
        .iter()
        .fold(NVector3::zeros(), |acc, p| acc + to_na(p.host_position))
        / n;
    let client_centroid = pairs
        .iter()
        .fold(NVector3::zeros(), |acc, p| acc + to_na(p.client_position))
        / n;

    let (mut a, mut b) = (0.0, 0.0);
    for pair in &pairs {
        let p = to_na(pair.host_position) - host_centroid;
        let q = to_na(pair.client_position) - client_centroid;
        a += p.x * q.x + p.z * q.z;
        b += -p.x * q.z + p.z * q.x;
    }

    let theta_degrees = b.atan2(a).to_degrees();
    let rotation = yaw_rotation(theta_degrees);
    let translation = -(rotation * (host_centroid - client_centroid));

    Some(AlignmentCandidate {
        theta_degrees,
        translation: from_na(translation),
    })
}
