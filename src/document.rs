//! Geometry document: the decoded objects of one solve, plus the byte form
//! handed to the scene importer and offered as a download.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Bumped when the archive layout changes.
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshGeometry {
    pub vertices: Vec<Point3<f64>>,
    /// Indices into `vertices`, counter-clockwise.
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveGeometry {
    pub points: Vec<Point3<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Mesh(MeshGeometry),
    Curve(CurveGeometry),
    Point { location: Point3<f64> },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    /// `(key, value)` pairs attached by the solver, in order.
    pub user_strings: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocObject {
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: ObjectAttributes,
}

impl DocObject {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, attributes: ObjectAttributes::default() }
    }
}

#[derive(Serialize, Deserialize)]
struct Archive {
    version: u32,
    objects: Vec<DocObject>,
}

/// Owned container of decoded objects. One per solve; the previous one is
/// released when a new result is applied.
#[derive(Debug, Default, PartialEq)]
pub struct GeometryDocument {
    objects: Vec<DocObject>,
}

impl GeometryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: DocObject) {
        self.objects.push(object);
    }

    pub fn add_point(&mut self, location: Point3<f64>) {
        self.add(DocObject::new(Geometry::Point { location }));
    }

    pub fn count(&self) -> usize {
        self.objects.len()
    }

    pub fn objects(&self) -> &[DocObject] {
        &self.objects
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&ArchiveRef { version: ARCHIVE_VERSION, objects: &self.objects })
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let archive: Archive = serde_json::from_slice(bytes)?;
        if archive.version != ARCHIVE_VERSION {
            anyhow::bail!("unsupported archive version {}", archive.version);
        }
        Ok(Self { objects: archive.objects })
    }

    /// Drops the document and everything it holds.
    pub fn release(self) {
        log::debug!("releasing document with {} objects", self.objects.len());
    }
}

#[derive(Serialize)]
struct ArchiveRef<'a> {
    version: u32,
    objects: &'a [DocObject],
}
