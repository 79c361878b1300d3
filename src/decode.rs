//! Turns a solve response into a geometry document and the named metrics.

use base64::Engine;
use nalgebra::Point3;
use serde::Deserialize;
use serde_json::Value;

use crate::compute::{ComputeError, SolveResponse, TreeItem};
use crate::document::{CurveGeometry, DocObject, Geometry, GeometryDocument, MeshGeometry, ObjectAttributes};
use crate::metrics::{self, NamedMetrics};

/// Type tag of items that may carry a base64-packed mesh.
pub const COMPRESSED_MESH_TAG: &str = "System.String";

#[derive(Debug)]
pub struct Decoded {
    pub document: GeometryDocument,
    pub metrics: NamedMetrics,
    /// Objects produced by the solver, before the trailing placeholder.
    pub decoded_items: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum MeshDecodeError {
    #[error("not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("not an STL payload")]
    NotStl,
    #[error("unreadable STL: {0}")]
    Stl(#[from] std::io::Error),
    #[error("mesh has no faces")]
    Empty,
}

/// Walks outputs → branches → items, decoding geometry and picking up
/// metric values as it goes.
pub fn decode_response(response: &SolveResponse) -> Result<Decoded, ComputeError> {
    let mut document = GeometryDocument::new();
    let mut metrics = NamedMetrics::new();

    for output in &response.values {
        let slot = metrics::lookup(&output.param_name);
        for (path, branch) in &output.inner_tree.branches {
            for item in branch {
                let object = decode_item(item).map_err(|e| {
                    ComputeError::DecodeFailed(format!("{} {path}: {e}", output.param_name))
                })?;

                if let Some(slot) = slot {
                    metrics.record(slot, &item.data);
                }

                if let Some(object) = object {
                    document.add(object);
                }
            }
        }
    }

    let decoded_items = document.count();
    if decoded_items == 0 {
        return Err(ComputeError::EmptyResult { metrics });
    }

    // The importer mishandles documents holding only some object kinds;
    // a stray point keeps it on the happy path.
    document.add_point(Point3::origin());

    Ok(Decoded { document, metrics, decoded_items })
}

/// Decodes one data-tree item. `Ok(None)` means "not geometry".
pub fn decode_item(item: &TreeItem) -> Result<Option<DocObject>, serde_json::Error> {
    let payload: Value = serde_json::from_str(&item.data)?;
    if item.type_tag == COMPRESSED_MESH_TAG {
        let Value::String(text) = &payload else {
            return Ok(None);
        };
        return Ok(match decode_compressed_mesh(text) {
            Ok(mesh) => Some(DocObject::new(Geometry::Mesh(mesh))),
            Err(e) => {
                // plain strings come through here too
                log::debug!("string item is not a mesh: {e}");
                None
            }
        });
    }
    if payload.is_object() {
        return Ok(decode_object(&payload));
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Packed meshes: base64 → STL
// ---------------------------------------------------------------------------

pub fn decode_compressed_mesh(text: &str) -> Result<MeshGeometry, MeshDecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(text.trim())?;
    if !looks_like_stl(&bytes) {
        return Err(MeshDecodeError::NotStl);
    }
    let csg = csgrs::mesh::Mesh::<()>::from_stl(&bytes, None)?;

    let mut mesh = MeshGeometry { vertices: Vec::new(), triangles: Vec::new() };
    for polygon in &csg.polygons {
        let base = mesh.vertices.len() as u32;
        let n = polygon.vertices.len() as u32;
        if n < 3 {
            continue;
        }
        mesh.vertices.extend(polygon.vertices.iter().map(|v| v.pos));
        for i in 1..n - 1 {
            mesh.triangles.push([base, base + i, base + i + 1]);
        }
    }
    if mesh.triangles.is_empty() {
        return Err(MeshDecodeError::Empty);
    }
    Ok(mesh)
}

/// Binary STL has an exact size for its triangle count; ASCII starts with `solid`.
fn looks_like_stl(bytes: &[u8]) -> bool {
    if bytes.len() >= 84 {
        let count = u64::from(u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]));
        if count > 0 && bytes.len() as u64 == 84 + count * 50 {
            return true;
        }
    }
    let head = &bytes[..bytes.len().min(5)];
    head == b"solid" && std::str::from_utf8(bytes).is_ok_and(|s| s.contains("facet"))
}

// ---------------------------------------------------------------------------
// Structured objects
// ---------------------------------------------------------------------------

/// JSON geometry accepted from structured items.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum EncodedObject {
    Mesh {
        vertices: Vec<[f64; 3]>,
        /// Triangles or quads (fan-triangulated); repeated last index marks a triangle.
        faces: Vec<Vec<u32>>,
        #[serde(default, rename = "userStrings")]
        user_strings: Vec<(String, String)>,
    },
    Polyline {
        points: Vec<[f64; 3]>,
        #[serde(default, rename = "userStrings")]
        user_strings: Vec<(String, String)>,
    },
    Line {
        from: [f64; 3],
        to: [f64; 3],
        #[serde(default, rename = "userStrings")]
        user_strings: Vec<(String, String)>,
    },
    Point {
        location: [f64; 3],
        #[serde(default, rename = "userStrings")]
        user_strings: Vec<(String, String)>,
    },
}

fn point(p: [f64; 3]) -> Point3<f64> {
    Point3::new(p[0], p[1], p[2])
}

/// Generic decoder for structured items. Unknown shapes are not geometry.
pub fn decode_object(value: &Value) -> Option<DocObject> {
    let encoded = match EncodedObject::deserialize(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            log::debug!("object item is not geometry: {e}");
            return None;
        }
    };

    let (geometry, user_strings) = match encoded {
        EncodedObject::Mesh { vertices, faces, user_strings } => {
            (Geometry::Mesh(mesh_from_faces(vertices, &faces)?), user_strings)
        }
        EncodedObject::Polyline { points, user_strings } => {
            if points.len() < 2 {
                return None;
            }
            let points = points.into_iter().map(point).collect();
            (Geometry::Curve(CurveGeometry { points }), user_strings)
        }
        EncodedObject::Line { from, to, user_strings } => (
            Geometry::Curve(CurveGeometry { points: vec![point(from), point(to)] }),
            user_strings,
        ),
        EncodedObject::Point { location, user_strings } => {
            (Geometry::Point { location: point(location) }, user_strings)
        }
    };

    Some(DocObject { geometry, attributes: ObjectAttributes { user_strings } })
}

fn mesh_from_faces(vertices: Vec<[f64; 3]>, faces: &[Vec<u32>]) -> Option<MeshGeometry> {
    let count = vertices.len() as u32;
    let mut triangles = Vec::with_capacity(faces.len());
    for face in faces {
        let mut face = face.clone();
        face.dedup();
        if face.len() > 1 && face.first() == face.last() {
            face.pop();
        }
        if face.len() < 3 || face.iter().any(|&i| i >= count) {
            log::debug!("skipping invalid mesh face {face:?}");
            return None;
        }
        for i in 1..face.len() - 1 {
            triangles.push([face[0], face[i], face[i + 1]]);
        }
    }
    if triangles.is_empty() {
        return None;
    }
    Some(MeshGeometry { vertices: vertices.into_iter().map(point).collect(), triangles })
}
