//! Payload → dataset decoding.

use crate::error::FetchError;
use bytes::Bytes;

/// On-disk flavor of a netCDF dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatasetFormat {
    /// netCDF classic (`CDF\x01`)
    Classic,
    /// netCDF 64-bit offset (`CDF\x02`)
    Offset64,
    /// CDF-5 64-bit data (`CDF\x05`)
    Cdf5,
    /// netCDF-4, stored as HDF5
    Hdf5,
}

impl std::fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DatasetFormat::Classic => "netCDF classic",
            DatasetFormat::Offset64 => "netCDF 64-bit offset",
            DatasetFormat::Cdf5 => "netCDF CDF-5",
            DatasetFormat::Hdf5 => "netCDF-4/HDF5",
        })
    }
}

/// A downloaded dataset held in memory
#[derive(Clone, Debug)]
pub struct Dataset {
    /// Task name the payload was fetched for
    pub name: String,
    /// Detected format
    pub format: DatasetFormat,
    /// Raw file contents
    pub bytes: Bytes,
}

impl Dataset {
    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty (never true for a decoded dataset)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Turns downloaded bytes into a domain artifact
pub trait Decoder: Send + Sync {
    /// Decode the payload downloaded for `name`
    fn decode(&self, name: &str, bytes: Bytes) -> Result<Dataset, FetchError>;
}

/// Accepts any netCDF flavor by signature
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetDecoder;

const HDF5_SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// HDF5 allows a user block before the superblock, so the signature may sit
/// at 0 or any power of two from 512
fn hdf5_signature_at(bytes: &[u8]) -> Option<usize> {
    std::iter::once(0)
        .chain((9..usize::BITS).map(|shift| 1usize << shift))
        .take_while(|offset| offset + HDF5_SIGNATURE.len() <= bytes.len())
        .find(|&offset| &bytes[offset..offset + HDF5_SIGNATURE.len()] == HDF5_SIGNATURE)
}

impl Decoder for DatasetDecoder {
    fn decode(&self, name: &str, bytes: Bytes) -> Result<Dataset, FetchError> {
        let failure = |reason: String| FetchError::Decode { reason };

        if bytes.is_empty() {
            return Err(failure(format!("{} is empty", name)));
        }

        let format = match bytes.get(..4) {
            Some([b'C', b'D', b'F', 1]) => DatasetFormat::Classic,
            Some([b'C', b'D', b'F', 2]) => DatasetFormat::Offset64,
            Some([b'C', b'D', b'F', 5]) => DatasetFormat::Cdf5,
            Some([b'C', b'D', b'F', version]) => {
                return Err(failure(format!(
                    "{} has unsupported netCDF version byte {}",
                    name, version
                )));
            }
            _ if hdf5_signature_at(&bytes).is_some() => DatasetFormat::Hdf5,
            _ => {
                return Err(failure(format!(
                    "{} is not a netCDF dataset ({} bytes, no known signature)",
                    name,
                    bytes.len()
                )));
            }
        };

        Ok(Dataset {
            name: name.to_string(),
            format,
            bytes,
        })
    }
}
