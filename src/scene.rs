//! Renderable object graph built from a serialized geometry document.

use nalgebra::{Point3, Vector3};

use crate::compute::ComputeError;
use crate::document::{Geometry, GeometryDocument};

pub const MESH_OPACITY: f32 = 0.7;
const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    Default,
    /// Face normals mapped to RGB, flat per triangle.
    NormalFlat { opacity: f32 },
    LineBasic { color: [f32; 3] },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Directional { position: Point3<f32>, intensity: f32 },
    Ambient { intensity: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh { positions: Vec<Point3<f32>>, triangles: Vec<[u32; 3]> },
    Line { points: Vec<Point3<f32>> },
    Points { points: Vec<Point3<f32>> },
    Light(Light),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub material: Material,
    pub user_strings: Vec<(String, String)>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, material: Material::Default, user_strings: Vec::new(), children: Vec::new() }
    }

    pub fn is_light(&self) -> bool {
        matches!(self.kind, NodeKind::Light(_))
    }

    /// Depth-first, parents before children.
    pub fn traverse_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(self);
        for child in &mut self.children {
            child.traverse_mut(f);
        }
    }

    pub fn traverse(&self, f: &mut impl FnMut(&SceneNode)) {
        f(self);
        for child in &self.children {
            child.traverse(f);
        }
    }

    /// Grows `bounds` by every vertex below this node, lights excluded.
    pub fn expand_bounds(&self, bounds: &mut Aabb) {
        self.traverse(&mut |node| match &node.kind {
            NodeKind::Mesh { positions: points, .. }
            | NodeKind::Line { points }
            | NodeKind::Points { points } => {
                for p in points {
                    bounds.expand(p);
                }
            }
            NodeKind::Group | NodeKind::Light(_) => {}
        });
    }
}

/// Axis-aligned box; starts empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    pub fn expand(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }
}

#[derive(Debug)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    revision: u64,
}

impl Default for Scene {
    /// One directional and one ambient light, no objects.
    fn default() -> Self {
        Self {
            nodes: vec![
                SceneNode::new(NodeKind::Light(Light::Directional {
                    position: Point3::origin(),
                    intensity: 2.0,
                })),
                SceneNode::new(NodeKind::Light(Light::Ambient { intensity: 1.0 })),
            ],
            revision: 0,
        }
    }
}

impl Scene {
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Changes every time the object set is replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drops every non-light node and adds `root` in their place.
    pub fn replace_objects(&mut self, root: SceneNode) {
        self.nodes.retain(SceneNode::is_light);
        self.nodes.push(root);
        self.revision += 1;
    }

    pub fn object_bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for node in self.nodes.iter().filter(|n| !n.is_light()) {
            node.expand_bounds(&mut bounds);
        }
        bounds
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

fn to_f32(p: &Point3<f64>) -> Point3<f32> {
    p.cast::<f32>()
}

/// Converts archive bytes into a group node with one child per object.
pub fn import(bytes: &[u8]) -> Result<SceneNode, ComputeError> {
    let document = GeometryDocument::from_bytes(bytes)
        .map_err(|e| ComputeError::DecodeFailed(format!("scene import: {e}")))?;

    let mut root = SceneNode::new(NodeKind::Group);
    for object in document.objects() {
        let kind = match &object.geometry {
            Geometry::Mesh(mesh) => NodeKind::Mesh {
                positions: mesh.vertices.iter().map(to_f32).collect(),
                triangles: mesh.triangles.clone(),
            },
            Geometry::Curve(curve) => NodeKind::Line {
                points: curve.points.iter().map(to_f32).collect(),
            },
            Geometry::Point { location } => NodeKind::Points { points: vec![to_f32(location)] },
        };
        let mut node = SceneNode::new(kind);
        node.user_strings = object.attributes.user_strings.clone();
        root.children.push(node);
    }
    document.release();
    Ok(root)
}

/// Parses `"r,g,b"` with 0–255 components.
pub fn parse_rgb(text: &str) -> Option<[f32; 3]> {
    let mut parts = text.split(',').map(|p| p.trim().parse::<f32>().ok());
    let r = parts.next()??;
    let g = parts.next()??;
    let b = parts.next()??;
    if parts.next().is_some() {
        return None;
    }
    let unit = |c: f32| (c.clamp(0.0, 255.0)) / 255.0;
    Some([unit(r), unit(g), unit(b)])
}

/// Meshes get the translucent normal material; coloured curves a line colour.
pub fn apply_materials(root: &mut SceneNode) {
    root.traverse_mut(&mut |node| match node.kind {
        NodeKind::Mesh { .. } => node.material = Material::NormalFlat { opacity: MESH_OPACITY },
        NodeKind::Line { .. } => {
            if let Some((_, value)) = node.user_strings.first() {
                match parse_rgb(value) {
                    Some(color) => node.material = Material::LineBasic { color },
                    None => log::warn!("ignoring unparsable curve colour {value:?}"),
                }
            }
        }
        _ => {}
    });
}

// ---------------------------------------------------------------------------
// Flattening for the GPU
// ---------------------------------------------------------------------------

/// Interleaved `xyz rgba` vertices, grouped by primitive type.
#[derive(Debug, Default)]
pub struct VertexData {
    pub triangles: Vec<f32>,
    pub lines: Vec<f32>,
    pub points: Vec<f32>,
}

pub const FLOATS_PER_VERTEX: usize = 7;

fn push_vertex(out: &mut Vec<f32>, p: &Point3<f32>, rgb: [f32; 3], alpha: f32) {
    out.extend_from_slice(&[p.x, p.y, p.z, rgb[0], rgb[1], rgb[2], alpha]);
}

fn normal_color(n: &Vector3<f32>) -> [f32; 3] {
    [n.x * 0.5 + 0.5, n.y * 0.5 + 0.5, n.z * 0.5 + 0.5]
}

/// Expands every non-light node into GPU-ready vertex streams.
pub fn tessellate(scene: &Scene) -> VertexData {
    let mut data = VertexData::default();
    for node in scene.nodes().iter().filter(|n| !n.is_light()) {
        node.traverse(&mut |node| match &node.kind {
            NodeKind::Mesh { positions, triangles } => {
                let alpha = match node.material {
                    Material::NormalFlat { opacity } => opacity,
                    _ => 1.0,
                };
                for tri in triangles {
                    let [a, b, c] = tri.map(|i| positions.get(i as usize));
                    let (Some(a), Some(b), Some(c)) = (a, b, c) else { continue };
                    let normal = (b - a).cross(&(c - a)).try_normalize(f32::EPSILON);
                    let rgb = match (node.material, normal) {
                        (Material::NormalFlat { .. }, Some(n)) => normal_color(&n),
                        _ => DEFAULT_COLOR,
                    };
                    for p in [a, b, c] {
                        push_vertex(&mut data.triangles, p, rgb, alpha);
                    }
                }
            }
            NodeKind::Line { points } => {
                let rgb = match node.material {
                    Material::LineBasic { color } => color,
                    _ => DEFAULT_COLOR,
                };
                for pair in points.windows(2) {
                    push_vertex(&mut data.lines, &pair[0], rgb, 1.0);
                    push_vertex(&mut data.lines, &pair[1], rgb, 1.0);
                }
            }
            NodeKind::Points { points } => {
                for p in points {
                    push_vertex(&mut data.points, p, DEFAULT_COLOR, 1.0);
                }
            }
            NodeKind::Group | NodeKind::Light(_) => {}
        });
    }
    data
}
