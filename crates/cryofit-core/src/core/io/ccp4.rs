use super::atomic::write_atomically;
use crate::core::xtal::cell::{CrystalSymmetry, UnitCell};
use crate::core::xtal::error::XtalError;
use crate::core::xtal::grid::DensityGrid;
use crate::core::xtal::map::TargetMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const HEADER_SIZE: usize = 1024;
const WORD: usize = 4;
const LABEL_SIZE: usize = 80;

#[derive(Debug, Error)]
pub enum Ccp4Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid CCP4/MRC header: {0}")]
    InvalidHeader(String),
    #[error("Unsupported CCP4/MRC data mode {0}")]
    UnsupportedMode(i32),
    #[error("Map data is truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("Invalid map geometry: {0}")]
    Geometry(#[from] XtalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

struct HeaderWords<'a> {
    bytes: &'a [u8],
    endian: Endian,
}

impl HeaderWords<'_> {
    fn raw(&self, index: usize) -> [u8; 4] {
        let offset = index * WORD;
        [
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ]
    }

    fn int(&self, index: usize) -> i32 {
        match self.endian {
            Endian::Little => i32::from_le_bytes(self.raw(index)),
            Endian::Big => i32::from_be_bytes(self.raw(index)),
        }
    }

    fn float(&self, index: usize) -> f32 {
        match self.endian {
            Endian::Little => f32::from_le_bytes(self.raw(index)),
            Endian::Big => f32::from_be_bytes(self.raw(index)),
        }
    }
}

/// Byte order from the machine stamp, falling back to whichever order gives
/// a plausible data mode.
fn detect_endian(header: &[u8]) -> Endian {
    match header[53 * WORD] {
        0x44 => Endian::Little,
        0x11 => Endian::Big,
        _ => {
            let mode = i32::from_le_bytes([header[12], header[13], header[14], header[15]]);
            if (0..=16).contains(&mode) {
                Endian::Little
            } else {
                Endian::Big
            }
        }
    }
}

fn positive(value: i32, name: &str) -> Result<usize, Ccp4Error> {
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| Ccp4Error::InvalidHeader(format!("{} must be positive, got {}", name, value)))
}

fn decode_values(
    data: &[u8],
    mode: i32,
    count: usize,
    endian: Endian,
) -> Result<Vec<f64>, Ccp4Error> {
    let width = match mode {
        0 => 1,
        1 | 6 => 2,
        2 => 4,
        other => return Err(Ccp4Error::UnsupportedMode(other)),
    };
    let expected = count.checked_mul(width).ok_or_else(|| {
        Ccp4Error::InvalidHeader(format!(
            "{} values of {} bytes overflow the address space",
            count, width
        ))
    })?;
    if data.len() < expected {
        return Err(Ccp4Error::Truncated {
            expected,
            found: data.len(),
        });
    }
    let values = data[..expected]
        .chunks_exact(width)
        .map(|b| match (mode, endian) {
            (0, _) => b[0] as i8 as f64,
            (1, Endian::Little) => i16::from_le_bytes([b[0], b[1]]) as f64,
            (1, Endian::Big) => i16::from_be_bytes([b[0], b[1]]) as f64,
            (6, Endian::Little) => u16::from_le_bytes([b[0], b[1]]) as f64,
            (6, Endian::Big) => u16::from_be_bytes([b[0], b[1]]) as f64,
            (_, Endian::Little) => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            (_, Endian::Big) => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
        })
        .collect();
    Ok(values)
}

/// Reader and writer for CCP4/MRC density maps.
pub struct Ccp4File;

impl Ccp4File {
    /// Reads a map and expands it to a full unit-cell grid.
    ///
    /// The stored box may cover any part of the cell, in any axis order; each
    /// value is placed at its periodic position in the cell and unsampled
    /// points are zero.
    pub fn read_from(reader: &mut impl Read) -> Result<TargetMap, Ccp4Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() < HEADER_SIZE {
            return Err(Ccp4Error::InvalidHeader(format!(
                "file has {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let words = HeaderWords {
            bytes: &bytes[..HEADER_SIZE],
            endian: detect_endian(&bytes),
        };
        let counts = [
            positive(words.int(0), "NC")?,
            positive(words.int(1), "NR")?,
            positive(words.int(2), "NS")?,
        ];
        let mode = words.int(3);
        let starts = [words.int(4) as i64, words.int(5) as i64, words.int(6) as i64];

        let mut axes = [words.int(16), words.int(17), words.int(18)];
        if axes == [0, 0, 0] {
            axes = [1, 2, 3];
        }
        let mut sorted = axes;
        sorted.sort_unstable();
        if sorted != [1, 2, 3] {
            return Err(Ccp4Error::InvalidHeader(format!(
                "MAPC/MAPR/MAPS must be a permutation of 1, 2, 3, got {:?}",
                axes
            )));
        }
        // Crystal axis (0 = x) stored along file dimension k.
        let axis_of = axes.map(|a| (a - 1) as usize);

        let mut sampling = [0usize; 3];
        for (k, &axis) in axis_of.iter().enumerate() {
            let m = words.int(7 + axis);
            sampling[axis] = if m > 0 { m as usize } else { counts[k] };
        }

        let cell = UnitCell::new([
            words.float(10) as f64,
            words.float(11) as f64,
            words.float(12) as f64,
            words.float(13) as f64,
            words.float(14) as f64,
            words.float(15) as f64,
        ])?;
        let space_group = match words.int(22) {
            0 | 1 => "P 1".to_string(),
            n => {
                debug!(ispg = n, "Map declares a space group; only P1 is applied");
                n.to_string()
            }
        };

        let mut start_xyz = [0i64; 3];
        for (k, &axis) in axis_of.iter().enumerate() {
            start_xyz[axis] = starts[k];
        }
        if start_xyz == [0, 0, 0] {
            let origin = [words.float(49), words.float(50), words.float(51)];
            if origin.iter().all(|o| o.is_finite()) && origin.iter().any(|&o| o != 0.0) {
                let lengths = cell.parameters();
                for axis in 0..3 {
                    let spacing = lengths[axis] / sampling[axis] as f64;
                    start_xyz[axis] = (origin[axis] as f64 / spacing).round() as i64;
                }
                debug!(?origin, ?start_xyz, "Placing map box from its origin record");
            }
        }

        let symbol_bytes = usize::try_from(words.int(23)).unwrap_or(0);
        let data_start = HEADER_SIZE + symbol_bytes;
        let data = bytes.get(data_start..).unwrap_or(&[]);
        let count = counts
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| {
                Ccp4Error::InvalidHeader(format!("box of {:?} points is too large", counts))
            })?;
        let values = decode_values(data, mode, count, words.endian)?;

        let mut grid = DensityGrid::zeros(sampling)?;
        let mut position = [0i64; 3];
        let mut values = values.into_iter();
        for s in 0..counts[2] {
            for r in 0..counts[1] {
                for c in 0..counts[0] {
                    let value = values.next().unwrap_or_default();
                    let file_index = [c as i64, r as i64, s as i64];
                    for k in 0..3 {
                        let axis = axis_of[k];
                        position[axis] = start_xyz[axis] + file_index[k];
                    }
                    let wrap = |axis: usize| position[axis].rem_euclid(sampling[axis] as i64) as usize;
                    grid.set(wrap(0), wrap(1), wrap(2), value);
                }
            }
        }

        Ok(TargetMap::new(grid, CrystalSymmetry::new(cell, &space_group)))
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<TargetMap, Ccp4Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes the full-cell grid as a little-endian mode 2 map with X, Y, Z
    /// as columns, rows and sections.
    pub fn write_to(map: &TargetMap, writer: &mut impl Write) -> Result<(), Ccp4Error> {
        let grid = map.grid();
        let dims = grid.dims();
        let [a, b, c, alpha, beta, gamma] = map.unit_cell().parameters();

        let (min, max) = grid
            .data()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let mut header = Vec::with_capacity(HEADER_SIZE);
        for n in dims {
            header.extend_from_slice(&(n as i32).to_le_bytes());
        }
        header.extend_from_slice(&2i32.to_le_bytes());
        for _ in 0..3 {
            header.extend_from_slice(&0i32.to_le_bytes());
        }
        for n in dims {
            header.extend_from_slice(&(n as i32).to_le_bytes());
        }
        for value in [a, b, c, alpha, beta, gamma] {
            header.extend_from_slice(&(value as f32).to_le_bytes());
        }
        for axis in [1i32, 2, 3] {
            header.extend_from_slice(&axis.to_le_bytes());
        }
        for value in [min, max, grid.mean()] {
            header.extend_from_slice(&(value as f32).to_le_bytes());
        }
        header.extend_from_slice(&1i32.to_le_bytes()); // ISPG
        header.extend_from_slice(&0i32.to_le_bytes()); // NSYMBT
        header.resize(52 * WORD, 0);
        header.extend_from_slice(b"MAP ");
        header.extend_from_slice(&[0x44, 0x44, 0x00, 0x00]);
        header.extend_from_slice(&(grid.standard_deviation() as f32).to_le_bytes());
        header.extend_from_slice(&1i32.to_le_bytes()); // NLABL

        let mut label = [b' '; LABEL_SIZE];
        let text = b"cryofit map";
        label[..text.len()].copy_from_slice(text);
        header.extend_from_slice(&label);
        header.resize(HEADER_SIZE, 0);

        writer.write_all(&header)?;
        let mut writer = BufWriter::new(writer);
        for &value in grid.data() {
            writer.write_all(&(value as f32).to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// All-or-nothing variant of [`Ccp4File::write_to`].
    pub fn write_to_path<P: AsRef<Path>>(map: &TargetMap, path: P) -> Result<(), Ccp4Error> {
        write_atomically(path, |mut writer| Self::write_to(map, &mut writer))
    }
}
