// Copyright 2020 bmc::labs Gmbh. All rights reserved.
//
// Author: Florian Eich <florian@bmc-labs.com>

#![allow(dead_code, non_camel_case_types)]

use libloading::Library;
use std::os::raw::{c_char, c_void};


// ERROR CODES ------------------------------------------------------------- //
pub const FWIFC_END_OF_FILE: i32 = -1;
pub const FWIFC_NO_ERROR: i32 = 0;
pub const FWIFC_ERR_BAD_ARG: i32 = 1;
pub const FWIFC_ERR_UNSUPPORTED_FORMAT: i32 = 2;
pub const FWIFC_ERR_MISSING_INDEX: i32 = 3;
pub const FWIFC_ERR_UNKNOWN_EXCEPTION: i32 = 4;
pub const FWIFC_ERR_NOT_IMPLEMENTED: i32 = 5;
pub const FWIFC_ERR_RUNTIME: i32 = 6;
pub const FWIFC_ERR_NOT_LICENSED: i32 = 7;

// CALIBRATION TABLE INDICES (get_calib) ----------------------------------- //
pub const FWIFC_CALIB_AMPL_CH0: u16 = 0;
pub const FWIFC_CALIB_AMPL_CH1: u16 = 1;
pub const FWIFC_CALIB_RNG_CH0: u16 = 2;
pub const FWIFC_CALIB_RNG_CH1: u16 = 3;


/// Opaque file handle of the library (`struct fwifc_file_t *`).
pub type fwifc_file = *mut c_void;

/// Binding to the sampling block descriptor (`fwifc_sbl_t`).
#[repr(C)]
#[derive(Debug, Copy, Clone)]
#[doc(hidden)]
pub struct fwifc_sbl_t {
  pub time_sosbl:   f64,      // start of sample block in s
  pub channel:      u32,      // 0:high, 1:low, 2:shp, 3:reference
  pub sample_count: u32,
  pub sample_size:  u32,      // bytes per sample
  pub sample:       *mut u16, // valid until the next call into the library
}


/// Table of the entry points of one full waveform library.
///
/// Both flavours (WFM and SDF) export the very same symbols, which is why they
/// can't be linked side by side and are resolved at run time instead.
#[doc(hidden)]
pub struct FwifcApi {
  /// API version the library implements, plus its build version and tag.
  pub get_library_version: unsafe extern "C" fn(api_major: *mut u16,
                                                api_minor: *mut u16,
                                                build_version: *mut *const c_char,
                                                build_tag: *mut *const c_char)
                                                -> i32,

  /// Fetch the message of the last error that occurred in the library.
  pub get_last_error: unsafe extern "C" fn(message: *mut *const c_char) -> i32,

  /// Open a file, writing the handle to `file`.
  pub open: unsafe extern "C" fn(path: *const c_char,
                                 file: *mut fwifc_file)
                                 -> i32,

  pub close: unsafe extern "C" fn(file: fwifc_file) -> i32,

  /// Create or re-create the index needed for time based seeking.
  pub reindex: unsafe extern "C" fn(file: fwifc_file) -> i32,

  pub seek_time: unsafe extern "C" fn(file: fwifc_file, time: f64) -> i32,

  pub seek_time_external: unsafe extern "C" fn(file: fwifc_file,
                                               time: f64)
                                               -> i32,

  /// Seek to a 1-based record number.
  pub seek: unsafe extern "C" fn(file: fwifc_file, record: u32) -> i32,

  pub tell: unsafe extern "C" fn(file: fwifc_file, record: *mut u32) -> i32,

  /// `epoch` is a datetime like "2010-11-16T00:00:00" if known, or "DAYSEC",
  /// "WEEKSEC" or "UNKNOWN".
  pub get_info: unsafe extern "C" fn(file: fwifc_file,
                                     instrument: *mut *const c_char,
                                     serial: *mut *const c_char,
                                     epoch: *mut *const c_char,
                                     v_group: *mut f64,
                                     sampling_time: *mut f64,
                                     flags: *mut u16,
                                     num_facets: *mut u16)
                                     -> i32,

  /// Tables are valid until the next call into the library.
  pub get_calib: unsafe extern "C" fn(file: fwifc_file,
                                      table_kind: u16,
                                      count: *mut u32,
                                      abscissa: *mut *mut f64,
                                      ordinate: *mut *mut f64)
                                      -> i32,

  /// Returns `FWIFC_END_OF_FILE` (negative) when there is nothing left.
  pub read: unsafe extern "C" fn(file: fwifc_file,
                                 time_sorg: *mut f64,
                                 time_external: *mut f64,
                                 origin: *mut f64,
                                 direction: *mut f64,
                                 flags: *mut u16,
                                 facet: *mut u16,
                                 sbl_count: *mut u32,
                                 sbl_size: *mut u32,
                                 sbl: *mut *mut fwifc_sbl_t)
                                 -> i32,

  /// `value`: 1 = relative to time_sorg, 0 = absolute (default)
  pub set_sosbl_relative: unsafe extern "C" fn(file: fwifc_file,
                                               value: i32)
                                               -> i32,
}

impl FwifcApi {
  /// Resolves all entry points from `library`.
  ///
  /// # Safety
  /// The symbols must have the signatures of `fwifc.h`, and the returned
  /// table must not outlive `library`.
  pub unsafe fn load(library: &Library) -> Result<Self, libloading::Error> {
    Ok(Self { get_library_version: symbol(library,
                                          b"fwifc_get_library_version\0")?,
              get_last_error:     symbol(library, b"fwifc_get_last_error\0")?,
              open:               symbol(library, b"fwifc_open\0")?,
              close:              symbol(library, b"fwifc_close\0")?,
              reindex:            symbol(library, b"fwifc_reindex\0")?,
              seek_time:          symbol(library, b"fwifc_seek_time\0")?,
              seek_time_external: symbol(library,
                                         b"fwifc_seek_time_external\0")?,
              seek:               symbol(library, b"fwifc_seek\0")?,
              tell:               symbol(library, b"fwifc_tell\0")?,
              get_info:           symbol(library, b"fwifc_get_info\0")?,
              get_calib:          symbol(library, b"fwifc_get_calib\0")?,
              read:               symbol(library, b"fwifc_read\0")?,
              set_sosbl_relative: symbol(library,
                                         b"fwifc_set_sosbl_relative\0")? })
  }
}

unsafe fn symbol<T: Copy>(library: &Library,
                          name: &[u8])
                          -> Result<T, libloading::Error> {
  Ok(*library.get::<T>(name)?)
}
