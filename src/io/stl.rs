use crate::collection::BoxCollection;
use crate::fitbox::{BoxMesh, FitBox};
use crate::triangulated::Triangulated3D;
use std::io::Cursor;

/// Export to ASCII STL
/// Convert this shape to an **ASCII STL** string with the given `name`.
///
/// ```rust
/// # use boxfit::fitbox::FitBox;
/// # use nalgebra::Point3;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fit = FitBox::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0));
/// let text = fit.to_stl_ascii("my_box");
/// assert!(text.starts_with("solid my_box"));
/// # Ok(())
/// # }
/// ```
pub fn to_stl_ascii<T: Triangulated3D>(shape: &T, name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("solid {name}\n"));

    shape.visit_triangles(|tri, n| {
        out.push_str(&format!("  facet normal {:.6} {:.6} {:.6}\n", n.x, n.y, n.z));
        out.push_str("    outer loop\n");
        for p in &tri {
            out.push_str(&format!("      vertex {:.6} {:.6} {:.6}\n", p.x, p.y, p.z));
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    });

    out.push_str(&format!("endsolid {name}\n"));
    out
}

/// Export to BINARY STL (returns `Vec<u8>`)
///
/// The binary format carries no solid name.
pub fn to_stl_binary<T: Triangulated3D>(shape: &T, _name: &str) -> std::io::Result<Vec<u8>> {
    use stl_io::{Normal, Triangle, Vertex, write_stl};

    let mut triangles = Vec::<Triangle>::new();

    shape.visit_triangles(|tri, n| {
        triangles.push(Triangle {
            normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
            vertices: tri.map(|p| Vertex::new([p.x as f32, p.y as f32, p.z as f32])),
        });
    });

    let mut cursor = Cursor::new(Vec::new());
    write_stl(&mut cursor, triangles.iter())?;
    Ok(cursor.into_inner())
}

impl BoxMesh {
    pub fn to_stl_ascii(&self, name: &str) -> String {
        self::to_stl_ascii(self, name)
    }
    pub fn to_stl_binary(&self, name: &str) -> std::io::Result<Vec<u8>> {
        self::to_stl_binary(self, name)
    }
}

impl FitBox {
    pub fn to_stl_ascii(&self, name: &str) -> String {
        self::to_stl_ascii(self, name)
    }
    pub fn to_stl_binary(&self, name: &str) -> std::io::Result<Vec<u8>> {
        self::to_stl_binary(self, name)
    }
}

impl BoxCollection {
    pub fn to_stl_ascii(&self, name: &str) -> String {
        self::to_stl_ascii(self, name)
    }
    pub fn to_stl_binary(&self, name: &str) -> std::io::Result<Vec<u8>> {
        self::to_stl_binary(self, name)
    }
}
