/// STL decoding for binary and ASCII files
use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending, space0},
    combinator::{all_consuming, opt},
    multi::many0,
    number::complete::float,
    sequence::{preceded, terminated},
    IResult,
};
use thiserror::Error;

use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StlError {
    #[error("file too small to be a valid STL ({0} bytes)")]
    TooSmall(usize),

    #[error("unexpected end of file: header declares {expected} facets, data holds {found}")]
    Truncated { expected: usize, found: usize },

    #[error("failed to parse ASCII STL: {0}")]
    Ascii(String),

    #[error("mesh contains no triangles")]
    Empty,
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vector(data: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32(data, offset),
        read_f32(data, offset + 4),
        read_f32(data, offset + 8),
    ]
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, StlError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(StlError::TooSmall(data.len()));
    }

    let data = &data[HEADER_LEN..];
    let triangle_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let facets = &data[4..];

    let available = facets.len() / FACET_LEN;
    if available < triangle_count {
        return Err(StlError::Truncated {
            expected: triangle_count,
            found: available,
        });
    }

    let mut mesh = Mesh::with_capacity(triangle_count);
    for facet in facets.chunks_exact(FACET_LEN).take(triangle_count) {
        let [nx, ny, nz] = read_vector(facet, 0);
        let corner = |i: usize| {
            let [x, y, z] = read_vector(facet, 12 + i * 12);
            Vertex::new(x, y, z, nx, ny, nz)
        };
        // The trailing attribute byte count is ignored
        mesh.add_triangle(Triangle::new(corner(0), corner(1), corner(2)));
    }

    Ok(mesh)
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, StlError> {
    match all_consuming(parse_solid)(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(StlError::Ascii(e.to_string())),
    }
}

fn parse_solid(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = preceded(space0, not_line_ending)(input)?; // Optional name
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = terminated(opt(preceded(space0, not_line_ending)), multispace0)(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }

    Ok((input, mesh))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Detect and parse an STL file (binary or ASCII).
///
/// Binary files may also start with `solid`, so the ASCII path is only taken
/// when the whole buffer parses as ASCII. A mesh without triangles is an error.
pub fn parse_stl(data: &[u8]) -> Result<Mesh, StlError> {
    let mesh = match ascii_candidate(data) {
        Some(text) => match parse_ascii_stl(text) {
            Ok(mesh) => mesh,
            Err(ascii_err) => parse_binary_stl(data).map_err(|_| ascii_err)?,
        },
        None => parse_binary_stl(data)?,
    };

    if mesh.is_empty() {
        return Err(StlError::Empty);
    }
    Ok(mesh)
}

fn ascii_candidate(data: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(data).ok()?;
    text.trim_start().starts_with("solid").then_some(text)
}

/// Encode a mesh as binary STL
pub fn to_binary_stl(mesh: &Mesh) -> Vec<u8> {
    let mut data = Vec::with_capacity(HEADER_LEN + 4 + mesh.triangles.len() * FACET_LEN);
    let mut header = [0u8; HEADER_LEN];
    header[..7].copy_from_slice(b"stlview");
    data.extend_from_slice(&header);
    data.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());

    for triangle in &mesh.triangles {
        let corners = triangle.vertices.iter().map(|v| v.position.coords);
        for vector in std::iter::once(triangle.normal).chain(corners) {
            for value in vector.iter() {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    data
}
