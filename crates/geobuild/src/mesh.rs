// Mesh container IO.
//
// Maps are fed to the builder as flat little-endian `GMSH` files: the
// map name and bounding box followed by entity records of interleaved
// position/normal vertices and triangle indices. Everything in the
// file is in the source (Z-up) convention; `Map::add_entity` does the
// axis swap on ingest.
//
// Layout:
//   magic    "GMSH"
//   name     u32 length + bytes
//   bbox     6 x f32 (min xyz, max xyz)
//   entities u32 count, then per entity:
//       u32 vertex count, u32 index count,
//       vertex count x 6 f32 (position xyz, normal xyz),
//       index count x u32

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::GeodataError;
use crate::geometry::{Aabb, Vec3};
use crate::map::Map;

const MESH_MAGIC: &[u8; 4] = b"GMSH";

/// One entity's raw geometry, as stored in the container.
pub struct MeshEntity {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

pub fn load_map(path: &Path) -> Result<Map, GeodataError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_map(&mut reader)
}

pub fn read_map<R: Read>(reader: &mut R) -> Result<Map, GeodataError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MESH_MAGIC {
        return Err(GeodataError::MalformedMesh(format!(
            "bad magic {magic:02x?}"
        )));
    }

    let name_len = reader.read_u32::<LittleEndian>()? as usize;
    let mut name_buf = vec![0u8; name_len];
    reader.read_exact(&mut name_buf)?;
    let name = String::from_utf8(name_buf)
        .map_err(|_| GeodataError::MalformedMesh("map name is not valid UTF-8".to_string()))?;

    let min = read_vec3(reader)?;
    let max = read_vec3(reader)?;
    let mut map = Map::new(&name, Aabb::new(min, max));

    let entity_count = reader.read_u32::<LittleEndian>()?;
    for _ in 0..entity_count {
        let vertex_count = reader.read_u32::<LittleEndian>()? as usize;
        let index_count = reader.read_u32::<LittleEndian>()? as usize;

        let mut positions = Vec::with_capacity(vertex_count);
        let mut normals = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            positions.push(read_vec3(reader)?);
            normals.push(read_vec3(reader)?);
        }

        let mut indices = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            indices.push(reader.read_u32::<LittleEndian>()?);
        }

        map.add_entity(&positions, &normals, &indices)?;
    }

    Ok(map)
}

/// Write a container from raw entity geometry, the inverse of
/// `read_map` up to the winding fix applied on ingest.
pub fn write_map<W: Write>(
    writer: &mut W,
    name: &str,
    bounding_box: Aabb,
    entities: &[MeshEntity],
) -> std::io::Result<()> {
    writer.write_all(MESH_MAGIC)?;
    writer.write_u32::<LittleEndian>(name.len() as u32)?;
    writer.write_all(name.as_bytes())?;
    write_vec3(writer, bounding_box.min)?;
    write_vec3(writer, bounding_box.max)?;

    writer.write_u32::<LittleEndian>(entities.len() as u32)?;
    for entity in entities {
        writer.write_u32::<LittleEndian>(entity.positions.len() as u32)?;
        writer.write_u32::<LittleEndian>(entity.indices.len() as u32)?;
        for (position, normal) in entity.positions.iter().zip(&entity.normals) {
            write_vec3(writer, *position)?;
            write_vec3(writer, *normal)?;
        }
        for &index in &entity.indices {
            writer.write_u32::<LittleEndian>(index)?;
        }
    }

    Ok(())
}

fn read_vec3<R: Read>(reader: &mut R) -> Result<Vec3, std::io::Error> {
    Ok(Vec3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> std::io::Result<()> {
    writer.write_f32::<LittleEndian>(v.x)?;
    writer.write_f32::<LittleEndian>(v.y)?;
    writer.write_f32::<LittleEndian>(v.z)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshEntity {
        MeshEntity {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(64.0, 0.0, 0.0),
                Vec3::new(64.0, 64.0, 0.0),
                Vec3::new(0.0, 64.0, 0.0),
            ],
            normals: vec![Vec3::new(0.0, 0.0, 1.0); 4],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    #[test]
    fn test_roundtrip() {
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -8.0), Vec3::new(64.0, 64.0, 8.0));
        let mut bytes = Vec::new();
        write_map(&mut bytes, "quad", bb, &[quad()]).unwrap();

        let map = read_map(&mut bytes.as_slice()).unwrap();
        assert_eq!(map.name(), "quad");
        assert_eq!(map.triangle_count(), 2);
        assert_eq!(map.bounding_box().min.z, -8.0);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = Vec::new();
        let bb = Aabb::default();
        write_map(&mut bytes, "quad", bb, &[]).unwrap();
        bytes[0] = b'X';

        assert!(matches!(
            read_map(&mut bytes.as_slice()),
            Err(GeodataError::MalformedMesh(_))
        ));
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let bb = Aabb::new(Vec3::new(0.0, 0.0, -8.0), Vec3::new(64.0, 64.0, 8.0));
        let mut bytes = Vec::new();
        write_map(&mut bytes, "quad", bb, &[quad()]).unwrap();
        bytes.truncate(bytes.len() - 7);

        assert!(matches!(
            read_map(&mut bytes.as_slice()),
            Err(GeodataError::Io(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_index_rejected() {
        let bb = Aabb::default();
        let mut entity = quad();
        entity.indices[2] = 40;
        let mut bytes = Vec::new();
        write_map(&mut bytes, "quad", bb, &[entity]).unwrap();

        assert!(matches!(
            read_map(&mut bytes.as_slice()),
            Err(GeodataError::MalformedMesh(_))
        ));
    }
}
