// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use crate::{fubar::{Fubar, Result},
            native::NativeDecoder,
            storage::CalibrationKind};
use std::{fmt, path::Path};


/// Failure reported by a decoder call: the library's return code and the
/// message it left in its last error slot, fetched right after the call.
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderFault {
  pub code:    i32,
  pub message: String,
}

impl DecoderFault {
  pub fn new(code: i32, message: impl Into<String>) -> Self {
    Self { code,
           message: message.into() }
  }
}

impl fmt::Display for DecoderFault {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "({}) {}", self.code, self.message)
  }
}

pub type DecodeResult<T> = std::result::Result<T, DecoderFault>;


/// File level information as returned by the decoder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawInfo {
  pub instrument:    String,
  pub serial:        String,
  pub epoch:         String,
  pub v_group:       f64,
  pub sampling_time: f64,
  pub flags:         u16,
  pub num_facets:    u16,
}

/// Version of a decoder library: the API it implements and its build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LibraryVersion {
  pub api_major:     u16,
  pub api_minor:     u16,
  pub build_version: String,
  pub build_tag:     String,
}

impl fmt::Display for LibraryVersion {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f,
           "{}.{} (build {}, {})",
           self.api_major, self.api_minor, self.build_version, self.build_tag)
  }
}

/// One sampling block descriptor, samples already copied out of decoder owned
/// memory. `channel` is unchecked, the decoder promises 0..=3.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawBlock {
  pub time_sosbl: f64,
  pub channel:    u32,
  pub samples:    Vec<u16>,
}

/// One decoded shot with its sampling blocks in decode order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawShot {
  pub time_sorg:     f64,
  pub time_external: f64,
  pub origin:        [f64; 3],
  pub direction:     [f64; 3],
  pub flags:         u16,
  pub facet:         u16,
  pub blocks:        Vec<RawBlock>,
}


/// The call contract of a full waveform decoder bound to (at most) one open
/// file.
///
/// Every call returns a self-contained result: implementations fetch the
/// library's last error message themselves. Anything handed out must be owned
/// by the caller; buffers of the library are only valid during the call.
pub trait Decoder {
  fn library_version(&mut self) -> DecodeResult<LibraryVersion>;
  fn open(&mut self, path: &Path) -> DecodeResult<()>;
  fn close(&mut self) -> DecodeResult<()>;
  fn info(&mut self) -> DecodeResult<RawInfo>;
  fn set_sosbl_relative(&mut self, relative: bool) -> DecodeResult<()>;
  /// `Ok(None)` at the end of data.
  fn read(&mut self) -> DecodeResult<Option<RawShot>>;
  fn seek(&mut self, record: u32) -> DecodeResult<()>;
  fn seek_time(&mut self, time: f64) -> DecodeResult<()>;
  fn seek_time_external(&mut self, time: f64) -> DecodeResult<()>;
  fn tell(&mut self) -> DecodeResult<u32>;
  fn reindex(&mut self) -> DecodeResult<()>;
  fn calib(&mut self,
           kind: CalibrationKind)
           -> DecodeResult<(Vec<f64>, Vec<f64>)>;
}


/// The two file flavours of the full waveform interface. Each one is served by
/// its own decoder library.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Format {
  Wfm,
  Sdf,
}

impl Format {
  /// Picks the format from the file extension, ignoring case.
  pub fn from_path(path: &Path) -> Result<Self> {
    let extension = path.extension()
                        .and_then(|extension| extension.to_str())
                        .unwrap_or_default();

    match extension.to_ascii_lowercase().as_str() {
      "wfm" => Ok(Self::Wfm),
      "sdf" => Ok(Self::Sdf),
      _ => Err(Fubar::UnsupportedFormat(path.display().to_string())),
    }
  }

  /// Candidate names of the shared library implementing this format, without
  /// platform prefix and suffix, in order of preference.
  pub fn library_names(self) -> &'static [&'static str] {
    match self {
      Self::Wfm => &["wfmifc-mt-s", "wfmifc-mt"],
      Self::Sdf => &["sdfifc"],
    }
  }

  /// Binds a fresh, not yet opened decoder of the vendor library for this
  /// format.
  pub fn bind(self) -> Result<Box<dyn Decoder>> {
    Ok(Box::new(NativeDecoder::bind(self)?))
  }
}

impl fmt::Display for Format {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Wfm => write!(f, "wfm"),
      Self::Sdf => write!(f, "sdf"),
    }
  }
}
