// Copyright 2020 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <jonas@bmc-labs.com>
//   Jannik Schütz <jannik@bmc-labs.com>

use crate::decoder::DecoderFault;
use std::{ffi, path::PathBuf, result, str};
use thiserror::Error;


/// fwifc's result type `Result` always carries a `Fubar` as its error.
pub type Result<T> = result::Result<T, Fubar>;


/// Everything that can go wrong between opening a waveform file and locating
/// the samples of a point.
///
/// Decoder failures always carry the numeric code returned by the library
/// together with the message it reported via its last error slot, so callers
/// never have to go back to the library to find out what happened.
///
/// FUBAR: Fucked Up Beyond All {Recognition, Repair, Reason}
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Fubar {
  #[error("file is not open")]
  NotOpen,

  #[error("unsupported file format '{0}', expected .wfm or .sdf")]
  UnsupportedFormat(String),

  #[error("decoder library unavailable: {0}")]
  LibraryUnavailable(String),

  #[error("could not open '{}' ({code}): {message}", .path.display())]
  OpenFailed {
    path:    PathBuf,
    code:    i32,
    message: String,
  },

  #[error("seek failed ({code}): {message}")]
  SeekFailed { code: i32, message: String },

  #[error("read failed ({code}): {message}")]
  ReadFailed { code: i32, message: String },

  #[error("{call} failed ({code}): {message}")]
  CallFailed {
    call:    &'static str,
    code:    i32,
    message: String,
  },

  #[error("decoder delivered sampling block for channel {channel}")]
  InvalidChannel { channel: u32 },

  #[error("no sampling block contains t = {t_point} s")]
  PointNotFound { t_point: f64 },

  #[error("reference channel {channel} holds no sampling block")]
  MissingReference { channel: usize },

  #[error("invalid point descriptor: {0}")]
  InvalidPoint(String),

  #[error("invalid string: {0}")]
  InvalidString(String),
}

impl Fubar {
  pub(crate) fn open_failed(path: PathBuf, fault: DecoderFault) -> Self {
    Self::OpenFailed { path,
                       code: fault.code,
                       message: fault.message }
  }

  pub(crate) fn seek_failed(fault: DecoderFault) -> Self {
    Self::SeekFailed { code:    fault.code,
                       message: fault.message, }
  }

  pub(crate) fn read_failed(fault: DecoderFault) -> Self {
    Self::ReadFailed { code:    fault.code,
                       message: fault.message, }
  }

  pub(crate) fn call_failed(call: &'static str, fault: DecoderFault) -> Self {
    Self::CallFailed { call,
                       code: fault.code,
                       message: fault.message }
  }

  /// The decoder's numeric code, for the variants that have one.
  pub fn code(&self) -> Option<i32> {
    match self {
      Self::OpenFailed { code, .. }
      | Self::SeekFailed { code, .. }
      | Self::ReadFailed { code, .. }
      | Self::CallFailed { code, .. } => Some(*code),
      _ => None,
    }
  }
}


/// This macro - internal use only - generates the implementation of the
/// `From` trait for `Fubar` for the string conversion errors of the FFI
/// boundary.
macro_rules! implement_from {
  ($($ErrType:ty),*) => {$(
    impl From<$ErrType> for Fubar {
      fn from(error: $ErrType) -> Self {
        Self::InvalidString(error.to_string())
      }
    }
  )*}
}

implement_from!(str::Utf8Error, ffi::NulError);

impl From<serde_json::Error> for Fubar {
  fn from(error: serde_json::Error) -> Self {
    Self::InvalidPoint(error.to_string())
  }
}
