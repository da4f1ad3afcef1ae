//! Reading and writing of compressed numpy archives ('.npz') holding named float vectors.
//!
//! An archive is a ZIP file with one member `<name>.npy` per vector, each stored as a version 1.0 NPY
//! array of little-endian 32 bit floats ('<f4') with shape `(n,)`.

use byteordered::ByteOrdered;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{FsStatsError, Result};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_DTYPE_F32: &str = "<f4";


/// Write the vectors into a deflate compressed archive, one member per key.
pub fn write_npz<P: AsRef<Path>>(path: P, arrays: &BTreeMap<String, Vec<f32>>) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, values) in arrays {
        zip.start_file(format!("{}.npy", name), options)?;
        write_npy(&mut zip, values)?;
    }
    zip.finish()?.flush()?;
    Ok(())
}


/// Read all float vectors from an archive written by [`write_npz`].
pub fn read_npz<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, Vec<f32>>> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut arrays = BTreeMap::new();
    for idx in 0..archive.len() {
        let mut member = archive.by_index(idx)?;
        let name = member.name().trim_end_matches(".npy").to_string();
        let mut raw = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut raw)?;
        arrays.insert(name, read_npy(&raw)?);
    }
    Ok(arrays)
}


/// The NPY header dictionary for a 1D float vector, padded so that the data starts at a multiple of 16 bytes.
fn npy_header(len: usize) -> String {
    let dict = format!("{{'descr': '{}', 'fortran_order': False, 'shape': ({},), }}", NPY_DTYPE_F32, len);
    // magic (6) + version (2) + header length (2) + dict + newline
    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let pad = (16 - unpadded % 16) % 16;
    format!("{}{}\n", dict, " ".repeat(pad))
}

fn write_npy<W: Write>(output: &mut W, values: &[f32]) -> Result<()> {
    let header = npy_header(values.len());
    output.write_all(NPY_MAGIC)?;
    output.write_all(&[1, 0])?;
    output.write_all(&(header.len() as u16).to_le_bytes())?;
    output.write_all(header.as_bytes())?;
    let mut output = ByteOrdered::le(output);
    for v in values {
        output.write_f32(*v)?;
    }
    Ok(())
}

fn read_npy(raw: &[u8]) -> Result<Vec<f32>> {
    let invalid = |msg: &str| FsStatsError::InvalidNpyFormat(msg.to_string());
    if raw.len() < 10 || &raw[..6] != NPY_MAGIC {
        return Err(invalid("bad magic"));
    }
    let header_len = u16::from_le_bytes([raw[8], raw[9]]) as usize;
    let data_start = 10 + header_len;
    if raw.len() < data_start {
        return Err(invalid("truncated header"));
    }
    let header = String::from_utf8_lossy(&raw[10..data_start]);
    if !header.contains(NPY_DTYPE_F32) {
        return Err(invalid("only '<f4' data is supported"));
    }
    let data = &raw[data_start..];
    if data.len() % 4 != 0 {
        return Err(invalid("data size is not a multiple of 4"));
    }
    let mut input = ByteOrdered::le(data);
    let mut values = Vec::with_capacity(data.len() / 4);
    for _ in 0..data.len() / 4 {
        values.push(input.read_f32()?);
    }
    Ok(values)
}


#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn the_header_aligns_data_to_16_bytes() {
        for len in &[0, 1, 163842, 10242] {
            let header = npy_header(*len);
            assert_eq!(0, (10 + header.len()) % 16);
            assert!(header.ends_with('\n'));
        }
    }

    #[test]
    fn archives_hold_one_member_per_subject() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lh.thickness.npz");
        let mut arrays = BTreeMap::new();
        arrays.insert(String::from("subject2"), vec![2.5f32, 3.0]);
        arrays.insert(String::from("subject1"), vec![1.0f32, -1.0]);
        write_npz(&path, &arrays).unwrap();

        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(vec!["subject1.npy", "subject2.npy"], names);

        assert_eq!(arrays, read_npz(&path).unwrap());
    }

    #[test]
    fn malformed_members_are_format_errors() {
        assert!(matches!(read_npy(b"not an npy member"), Err(FsStatsError::InvalidNpyFormat(_))));

        let mut raw = Vec::new();
        write_npy(&mut raw, &[1.0, 2.0]).unwrap();
        raw.pop();
        assert!(matches!(read_npy(&raw), Err(FsStatsError::InvalidNpyFormat(_))));
    }
}
