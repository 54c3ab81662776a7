//! Debug line segments visualizing each node's frame.

use crate::tree::Tree;
use glam::Vec3;

pub const TANGENT_COLOR: [f32; 3] = [1.0, 0.0, 0.0];
pub const NORMAL_COLOR: [f32; 3] = [0.0, 1.0, 0.0];
pub const BINORMAL_COLOR: [f32; 3] = [0.0, 0.0, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: [f32; 3],
}

/// Three lines per node, in node order: tangent, normal and binormal, each
/// `length + node.width` long.
pub fn frame_lines(tree: &Tree, length: f32) -> Vec<DebugLine> {
    let mut lines = Vec::with_capacity(tree.nodes.len() * 3);
    for node in &tree.nodes {
        let scale = length + node.width;
        for (axis, color) in [
            (node.tangent, TANGENT_COLOR),
            (node.normal, NORMAL_COLOR),
            (node.binormal(), BINORMAL_COLOR),
        ] {
            lines.push(DebugLine {
                start: node.pos,
                end: node.pos + axis * scale,
                color,
            });
        }
    }
    lines
}
