//! Functions for managing FreeSurfer brain volumes in binary 'MGH' files.
//!
//! Resampled surface textures written by `mri_surf2surf` are stored as MGH volumes with one voxel per vertex.


use byteordered::{ByteOrdered};
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array, Array4, Ix4, Shape, ShapeBuilder};

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path};

use crate::error::{FsStatsError, Result};
use crate::util::is_gz_file;

pub const MGH_VERSION: i32 = 1;

pub const MGH_DATATYPE_NAMES : [&str; 4] = ["MRI_UCHAR", "MRI_INT", "MRI_FLOAT", "MRI_SHORT"];
pub const MGH_DATATYPE_CODES : [i32; 4] = [0, 1, 3, 4];
pub const MRI_UCHAR: i32 = 0;
pub const MRI_INT: i32 = 1;
pub const MRI_FLOAT: i32 = 3;
pub const MRI_SHORT: i32 = 4;
pub const MGH_DATA_START : usize = 284; // The index in bytes where the data part starts in an MGH file.

// Upper bound for preallocating voxel buffers, larger volumes grow while they are read.
const MAX_PREALLOC_VALUES: usize = 1 << 20;

/// Models the header of a FreeSurfer MGH file containing a brain volume.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMghHeader {
    pub mgh_format_version: i32,
    pub dim1len: i32,
    pub dim2len: i32,
    pub dim3len: i32,
    pub dim4len: i32,  // aka "num_frames"
    pub dtype: i32,
    pub dof: i32,
    pub is_ras_good: i16,
    pub delta: [f32; 3],
    pub mdc_raw: [f32; 9],
    pub p_xyz_c: [f32; 3],
}


/// Models a FreeSurfer MGH file. Exactly one of the data fields is set, depending on `header.dtype`.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMgh {
    pub header: FsMghHeader,
    pub data_mri_uchar: Option<Array4<u8>>,
    pub data_mri_float: Option<Array4<f32>>,
    pub data_mri_int: Option<Array4<i32>>,
    pub data_mri_short: Option<Array4<i16>>,
}


impl Default for FsMghHeader {
    fn default() -> FsMghHeader {
        FsMghHeader {
            mgh_format_version: MGH_VERSION,
            dim1len: 0,
            dim2len: 0,
            dim3len: 0,
            dim4len: 0,
            dtype: MRI_INT,
            dof: 0,
            is_ras_good: 0,
            delta: [0.; 3],
            mdc_raw: [0.; 9],
            p_xyz_c: [0.; 3],
        }
    }
}

/// The header of an MGH/MGZ file.
impl FsMghHeader {

    /// Read an MGH header from a file.
    /// If the file's name ends with ".mgz" or ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsMghHeader> {
        let gz = is_gz_file(&path);
        let file = BufReader::new(File::open(path)?);
        if gz {
            FsMghHeader::from_reader(&mut GzDecoder::new(file))
        } else {
            let mut file = file;
            FsMghHeader::from_reader(&mut file)
        }
    }


    /// Read an MGH header from the given byte stream.
    /// It is assumed that the input is currently at the start of the
    /// header. The complete header block is consumed, so the input is at the start of the data afterwards.
    pub fn from_reader<S>(input: &mut S) -> Result<FsMghHeader>
    where
        S: Read,
    {
        let mut block = vec![0u8; MGH_DATA_START];
        input.read_exact(&mut block)?;

        let mut hdr = FsMghHeader::default();
        let mut input = ByteOrdered::be(Cursor::new(block));

        hdr.mgh_format_version = input.read_i32()?;

        if hdr.mgh_format_version != MGH_VERSION {
            return Err(FsStatsError::InvalidFsMghFormat);
        }

        hdr.dim1len = input.read_i32()?;
        hdr.dim2len = input.read_i32()?;
        hdr.dim3len = input.read_i32()?;
        hdr.dim4len = input.read_i32()?;

        if [hdr.dim1len, hdr.dim2len, hdr.dim3len, hdr.dim4len].iter().any(|d| *d < 0) {
            return Err(FsStatsError::InvalidFsMghFormat);
        }

        hdr.dtype = input.read_i32()?;
        hdr.dof = input.read_i32()?;

        hdr.is_ras_good = input.read_i16()?;

        if hdr.is_ras_good == 1 {
            for idx in 0..3 { hdr.delta[idx] = input.read_f32()?; }
            for idx in 0..9 { hdr.mdc_raw[idx] = input.read_f32()?; }
            for idx in 0..3 { hdr.p_xyz_c[idx] = input.read_f32()?; }
        }
        Ok(hdr)
    }

    /// The four dimension lengths, as usize.
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        (self.dim1len as usize, self.dim2len as usize, self.dim3len as usize, self.dim4len as usize)
    }

    /// Number of voxels over all frames, or `None` if that does not fit into a usize.
    pub fn num_values(&self) -> Option<usize> {
        let (d1, d2, d3, d4) = self.dim();
        d1.checked_mul(d2)?.checked_mul(d3)?.checked_mul(d4)
    }

    /// Write this header, followed by zero padding up to the start of the data block.
    pub fn to_writer<W>(&self, output: &mut W) -> Result<()>
    where
        W: Write,
    {
        let mut block: Vec<u8> = Vec::with_capacity(MGH_DATA_START);
        {
            let mut out = ByteOrdered::be(&mut block);
            out.write_i32(self.mgh_format_version)?;
            out.write_i32(self.dim1len)?;
            out.write_i32(self.dim2len)?;
            out.write_i32(self.dim3len)?;
            out.write_i32(self.dim4len)?;
            out.write_i32(self.dtype)?;
            out.write_i32(self.dof)?;
            out.write_i16(self.is_ras_good)?;
            for v in self.delta.iter() { out.write_f32(*v)?; }
            for v in self.mdc_raw.iter() { out.write_f32(*v)?; }
            for v in self.p_xyz_c.iter() { out.write_f32(*v)?; }
        }
        block.resize(MGH_DATA_START, 0);
        output.write_all(&block)?;
        Ok(())
    }
}


impl FsMgh {

    /// Read an MGH or MGZ file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsMgh> {
        let gz = is_gz_file(&path);
        let file = BufReader::new(File::open(path)?);
        if gz {
            FsMgh::from_reader(GzDecoder::new(file))
        } else {
            FsMgh::from_reader(file)
        }
    }

    /// Read an MGH volume from the given byte stream, which must be at the start of the header.
    ///
    /// Voxel values are stored in column-major order, i.e., the first dimension varies fastest.
    pub fn from_reader<S>(mut input: S) -> Result<FsMgh>
    where
        S: Read,
    {
        let hdr = FsMghHeader::from_reader(&mut input)?;
        let shape = hdr.dim().f();
        let num_values = hdr.num_values().ok_or(FsStatsError::InvalidFsMghFormat)?;
        let capacity = num_values.min(MAX_PREALLOC_VALUES);
        let mut input = ByteOrdered::be(input);

        let mut mgh = FsMgh {
            header : hdr.clone(),
            data_mri_uchar : None,
            data_mri_int : None,
            data_mri_float : None,
            data_mri_short : None,
        };

        match hdr.dtype {
            MRI_UCHAR => {
                let mut data = Vec::with_capacity(capacity);
                for _ in 0..num_values { data.push(input.read_u8()?); }
                mgh.data_mri_uchar = Some(to_array(shape, data)?);
            }
            MRI_INT => {
                let mut data = Vec::with_capacity(capacity);
                for _ in 0..num_values { data.push(input.read_i32()?); }
                mgh.data_mri_int = Some(to_array(shape, data)?);
            }
            MRI_FLOAT => {
                let mut data = Vec::with_capacity(capacity);
                for _ in 0..num_values { data.push(input.read_f32()?); }
                mgh.data_mri_float = Some(to_array(shape, data)?);
            }
            MRI_SHORT => {
                let mut data = Vec::with_capacity(capacity);
                for _ in 0..num_values { data.push(input.read_i16()?); }
                mgh.data_mri_short = Some(to_array(shape, data)?);
            }
            other => return Err(FsStatsError::UnsupportedMriDataType(other)),
        }
        Ok(mgh)
    }

    /// The data shape, with the frame dimension dropped if there is only a single frame.
    ///
    /// A per-vertex surface texture stored as a volume thus has shape `[num_vertices, 1, 1]`.
    pub fn data_shape(&self) -> Vec<usize> {
        let (d1, d2, d3, d4) = self.header.dim();
        if d4 == 1 {
            vec![d1, d2, d3]
        } else {
            vec![d1, d2, d3, d4]
        }
    }

    /// The voxel values converted to f32, whatever the stored data type.
    pub fn to_f32(&self) -> Array4<f32> {
        if let Some(data) = &self.data_mri_float {
            data.clone()
        } else if let Some(data) = &self.data_mri_int {
            data.mapv(|v| v as f32)
        } else if let Some(data) = &self.data_mri_short {
            data.mapv(f32::from)
        } else if let Some(data) = &self.data_mri_uchar {
            data.mapv(f32::from)
        } else {
            Array4::zeros((0, 0, 0, 0))
        }
    }

    /// All voxel values in file order (first dimension fastest), converted to f32.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.to_f32().t().iter().cloned().collect()
    }
}


fn to_array<T>(shape: Shape<Ix4>, data: Vec<T>) -> Result<Array4<T>> {
    Array::from_shape_vec(shape, data).map_err(|_| FsStatsError::InvalidFsMghFormat)
}


/// Read an MGH or MGZ file.
///
/// # Examples
///
/// ```no_run
/// let mgh = fsstats::read_mgh("/path/to/subjects_dir/textures/lh.thickness/subject1_lh.thickness.mgz").unwrap();
/// println!("shape: {:?}", mgh.data_shape());
/// ```
pub fn read_mgh<P: AsRef<Path>>(path: P) -> Result<FsMgh> {
    FsMgh::from_file(path)
}


/// Write float data to an MGH file, or to a GZip compressed MGZ file if the name ends with ".mgz" or ".gz".
pub fn write_mgh<P: AsRef<Path>>(path: P, data: &Array4<f32>) -> Result<()> {
    let shape = data.shape();
    let hdr = FsMghHeader {
        dim1len: shape[0] as i32,
        dim2len: shape[1] as i32,
        dim3len: shape[2] as i32,
        dim4len: shape[3] as i32,
        dtype: MRI_FLOAT,
        ..FsMghHeader::default()
    };

    let gz = is_gz_file(&path);
    let file = BufWriter::new(File::create(path)?);
    if gz {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_mgh_body(&mut encoder, &hdr, data)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        write_mgh_body(&mut file, &hdr, data)?;
        file.flush()?;
    }
    Ok(())
}

fn write_mgh_body<W: Write>(output: &mut W, hdr: &FsMghHeader, data: &Array4<f32>) -> Result<()> {
    hdr.to_writer(output)?;
    let mut output = ByteOrdered::be(output);
    // The transposed view iterates the first axis fastest, matching the on-disk order.
    for v in data.t().iter() {
        output.write_f32(*v)?;
    }
    Ok(())
}
