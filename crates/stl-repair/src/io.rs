//! STL file codec: binary and ASCII read/write.
//!
//! The binary layout is fixed little-endian: an 80-byte header preserved
//! verbatim, a 32-bit facet count, then packed 50-byte facet records
//! (normal, three vertices, two attribute bytes). Decoding goes through
//! `f32::from_le_bytes`, so the same code is correct on big-endian hosts.
//!
//! Some exporters write `solid` into a binary header. Format detection
//! therefore cross-checks the header against the file-size arithmetic
//! `84 + 50·N == file_size` instead of trusting the first five bytes.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{StlError, StlResult};
use crate::stats::SourceFormat;
use crate::types::{Facet, Mesh, Normal, Vertex, FACET_SIZE, HEADER_SIZE};

/// Load an STL file, auto-detecting binary vs ASCII encoding.
pub fn load_stl(path: &Path) -> StlResult<Mesh> {
    let mut file = File::open(path).map_err(|e| StlError::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| StlError::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut mesh = match sniff_format(&bytes) {
        SourceFormat::Ascii => read_ascii(&bytes)?,
        format => {
            let mut mesh = read_binary(&bytes)?;
            mesh.stats.format = format;
            mesh
        }
    };

    mesh.stats.original_num_facets = mesh.facet_count();
    mesh.update_bounds();

    info!(
        "Loaded {} facets from {:?} ({:?})",
        mesh.facet_count(),
        path,
        mesh.stats.format
    );
    debug!(
        "Bounding box: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
        mesh.stats.min.x,
        mesh.stats.min.y,
        mesh.stats.min.z,
        mesh.stats.max.x,
        mesh.stats.max.y,
        mesh.stats.max.z
    );

    Ok(mesh)
}

/// Decide how to decode the byte stream. A `solid` prefix only wins when the
/// binary interpretation is inconsistent with the file size.
fn sniff_format(bytes: &[u8]) -> SourceFormat {
    let says_solid = bytes.len() >= 5 && &bytes[..5] == b"solid";
    if !says_solid {
        return SourceFormat::Binary;
    }
    if bytes.len() >= HEADER_SIZE + 4 {
        let count = facet_count_from_header(bytes) as usize;
        if HEADER_SIZE + 4 + FACET_SIZE * count == bytes.len() {
            return SourceFormat::BinaryWithSolidHeader;
        }
    }
    SourceFormat::Ascii
}

#[inline]
fn facet_count_from_header(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ])
}

fn read_binary(bytes: &[u8]) -> StlResult<Mesh> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(StlError::TruncatedFile {
            details: format!(
                "binary STL needs at least {} bytes, found {}",
                HEADER_SIZE + 4,
                bytes.len()
            ),
        });
    }

    let count = facet_count_from_header(bytes) as usize;
    let expected = HEADER_SIZE + 4 + FACET_SIZE * count;
    if bytes.len() < expected {
        return Err(StlError::TruncatedFile {
            details: format!(
                "facet count {} implies {} bytes, found {}",
                count,
                expected,
                bytes.len()
            ),
        });
    }
    if bytes.len() != expected {
        return Err(StlError::InconsistentFacetCount {
            claimed: count,
            implied: (bytes.len() - HEADER_SIZE - 4) / FACET_SIZE,
            file_size: bytes.len() as u64,
        });
    }

    let mut mesh = Mesh::new();
    mesh.stats.header.copy_from_slice(&bytes[..HEADER_SIZE]);
    mesh.facets.reserve(count);
    for record in bytes[HEADER_SIZE + 4..].chunks_exact(FACET_SIZE) {
        mesh.facets.push(decode_facet(record));
    }
    Ok(mesh)
}

fn decode_facet(record: &[u8]) -> Facet {
    #[inline]
    fn f32_at(record: &[u8], i: usize) -> f32 {
        f32::from_le_bytes([record[i], record[i + 1], record[i + 2], record[i + 3]])
    }
    #[inline]
    fn vec_at(record: &[u8], i: usize) -> Vertex {
        Vertex::new(f32_at(record, i), f32_at(record, i + 4), f32_at(record, i + 8))
    }
    Facet {
        normal: vec_at(record, 0),
        vertices: [vec_at(record, 12), vec_at(record, 24), vec_at(record, 36)],
        attr: u16::from_le_bytes([record[48], record[49]]),
    }
}

/// Whitespace-delimited token scanner that remembers byte offsets so parse
/// errors can point at the offending token.
struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Next token and its starting offset, or `None` at end of input.
    fn next_token(&mut self) -> Option<(usize, &'a str)> {
        self.skip_whitespace();
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let token = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        Some((start, token))
    }

    /// Peek at the next token without consuming it.
    fn peek_token(&mut self) -> Option<&'a str> {
        let saved = self.pos;
        let token = self.next_token().map(|(_, t)| t);
        self.pos = saved;
        token
    }

    /// Consume the rest of the current line (e.g. the solid name).
    fn skip_line(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> StlResult<()> {
        match self.next_token() {
            Some((_, token)) if token.eq_ignore_ascii_case(keyword) => Ok(()),
            Some((offset, token)) => Err(StlError::Parse {
                offset,
                expected: keyword,
                found: token.to_string(),
            }),
            None => Err(StlError::TruncatedFile {
                details: format!("end of stream while expecting `{keyword}`"),
            }),
        }
    }

    fn expect_float(&mut self) -> StlResult<f32> {
        match self.next_token() {
            Some((offset, token)) => token.parse::<f32>().map_err(|_| StlError::Parse {
                offset,
                expected: "number",
                found: token.to_string(),
            }),
            None => Err(StlError::TruncatedFile {
                details: "end of stream while expecting a number".to_string(),
            }),
        }
    }

    fn expect_vector(&mut self) -> StlResult<Vertex> {
        Ok(Vertex::new(
            self.expect_float()?,
            self.expect_float()?,
            self.expect_float()?,
        ))
    }
}

fn read_ascii(bytes: &[u8]) -> StlResult<Mesh> {
    let mut mesh = Mesh::new();
    mesh.stats.format = SourceFormat::Ascii;

    let mut tok = Tokenizer::new(bytes);
    tok.expect_keyword("solid")?;
    tok.skip_line();

    // Keep the opening line as the header, the way the binary path keeps
    // the raw 80 bytes.
    let line_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(bytes.len());
    let header_len = line_end.min(HEADER_SIZE);
    mesh.stats.header[..header_len].copy_from_slice(&bytes[..header_len]);

    loop {
        match tok.next_token() {
            Some((_, token)) if token.eq_ignore_ascii_case("facet") => {
                // `facet normal nx ny nz` is canonical, but a bare `facet`
                // with no normal occurs in the wild; the normal fixer
                // recomputes zeros later either way.
                let normal = if tok
                    .peek_token()
                    .is_some_and(|t| t.eq_ignore_ascii_case("normal"))
                {
                    tok.next_token();
                    tok.expect_vector()?
                } else {
                    Normal::zeros()
                };

                tok.expect_keyword("outer")?;
                tok.expect_keyword("loop")?;
                let mut vertices = [Vertex::zeros(); 3];
                for v in &mut vertices {
                    tok.expect_keyword("vertex")?;
                    *v = tok.expect_vector()?;
                }
                tok.expect_keyword("endloop")?;
                tok.expect_keyword("endfacet")?;

                mesh.facets.push(Facet {
                    normal,
                    vertices,
                    attr: 0,
                });
            }
            Some((_, token)) if token.eq_ignore_ascii_case("endsolid") => {
                tok.skip_line();
                break;
            }
            Some((offset, token)) => {
                return Err(StlError::Parse {
                    offset,
                    expected: "facet or endsolid",
                    found: token.to_string(),
                });
            }
            None => {
                return Err(StlError::TruncatedFile {
                    details: "end of stream while expecting `facet` or `endsolid`".to_string(),
                });
            }
        }
    }

    Ok(mesh)
}

/// Write the mesh in binary form. The stored header is emitted verbatim, so
/// a binary read/write round-trip is byte-identical.
pub fn write_binary(mesh: &Mesh, path: &Path) -> StlResult<()> {
    let io_err = |e| StlError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&mesh.stats.header).map_err(io_err)?;
    writer
        .write_all(&(mesh.facet_count() as u32).to_le_bytes())
        .map_err(io_err)?;

    let mut record = [0u8; FACET_SIZE];
    for facet in &mesh.facets {
        encode_facet(facet, &mut record);
        writer.write_all(&record).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    info!("Wrote {} facets to {:?} (binary)", mesh.facet_count(), path);
    Ok(())
}

fn encode_facet(facet: &Facet, record: &mut [u8; FACET_SIZE]) {
    #[inline]
    fn put_vec(record: &mut [u8], i: usize, v: &Vertex) {
        record[i..i + 4].copy_from_slice(&v.x.to_le_bytes());
        record[i + 4..i + 8].copy_from_slice(&v.y.to_le_bytes());
        record[i + 8..i + 12].copy_from_slice(&v.z.to_le_bytes());
    }
    put_vec(record, 0, &facet.normal);
    put_vec(record, 12, &facet.vertices[0]);
    put_vec(record, 24, &facet.vertices[1]);
    put_vec(record, 36, &facet.vertices[2]);
    record[48..50].copy_from_slice(&facet.attr.to_le_bytes());
}

/// Write the mesh in ASCII form under the given solid label.
pub fn write_ascii(mesh: &Mesh, path: &Path, label: &str) -> StlResult<()> {
    let io_err = |e| StlError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "solid  {label}").map_err(io_err)?;
    for facet in &mesh.facets {
        writeln!(
            writer,
            "  facet normal {} {} {}",
            fmt_coord(facet.normal.x),
            fmt_coord(facet.normal.y),
            fmt_coord(facet.normal.z)
        )
        .map_err(io_err)?;
        writeln!(writer, "    outer loop").map_err(io_err)?;
        for v in &facet.vertices {
            writeln!(
                writer,
                "      vertex {} {} {}",
                fmt_coord(v.x),
                fmt_coord(v.y),
                fmt_coord(v.z)
            )
            .map_err(io_err)?;
        }
        writeln!(writer, "    endloop").map_err(io_err)?;
        writeln!(writer, "  endfacet").map_err(io_err)?;
    }
    writeln!(writer, "endsolid  {label}").map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    info!("Wrote {} facets to {:?} (ASCII)", mesh.facet_count(), path);
    Ok(())
}

/// Render one coordinate in the `% .8E` notation traditional for ASCII STL:
/// a sign or a padding space, eight fractional digits, and a signed
/// two-digit exponent. Nine significant digits round-trip any finite `f32`.
fn fmt_coord(value: f32) -> String {
    let s = format!("{value:.8E}");
    let (mantissa, exp) = s.split_once('E').expect("exponential format");
    let (exp_sign, exp_digits) = match exp.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exp),
    };
    let pad = if value.is_sign_negative() { "" } else { " " };
    format!("{pad}{mantissa}E{exp_sign}{exp_digits:0>2}")
}
