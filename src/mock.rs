// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

//! In-memory stand-in for the RIEGL libraries, for tests only.

use crate::{decoder::{DecodeResult,
                      Decoder,
                      DecoderFault,
                      Format,
                      LibraryVersion,
                      RawBlock,
                      RawInfo,
                      RawShot},
            fubar::Result,
            fwfile::FwFile,
            fwifcbindings as riegl,
            storage::CalibrationKind};
use std::{cell::Cell, collections::HashMap, path::Path, rc::Rc};


/// Decoder over a list of shots held in memory.
///
/// Positions are 1-based like the library's: `seek(r)` moves to record `r`,
/// `read` hands out the record at the position and moves on, `tell` reports
/// the position. A seek past the data ends up behind the last record, or on
/// it for a decoder built with `clamping_seeks`. Time based seeks fail with
/// `FWIFC_ERR_MISSING_INDEX` until `reindex` has been called.
#[derive(Clone, Debug)]
pub struct MemoryDecoder {
  info:       RawInfo,
  shots:      Vec<RawShot>,
  calib:      HashMap<CalibrationKind, (Vec<f64>, Vec<f64>)>,
  indexed:    bool,
  clamping:   bool,
  relative:   bool,
  is_open:    bool,
  next:       u32,
  fail_open:  Option<DecoderFault>,
  fail_read:  Option<u32>,
  open_count: Rc<Cell<i32>>,
  reads:      Rc<Cell<usize>>,
}

impl MemoryDecoder {
  pub fn new(info: RawInfo, shots: Vec<RawShot>) -> Self {
    Self { info,
           shots,
           calib: HashMap::new(),
           indexed: true,
           clamping: false,
           relative: false,
           is_open: false,
           next: 1,
           fail_open: None,
           fail_read: None,
           open_count: Rc::new(Cell::new(0)),
           reads: Rc::new(Cell::new(0)) }
  }

  pub fn unindexed(mut self) -> Self {
    self.indexed = false;
    self
  }

  /// Seeks past the data stop at the last record instead of behind it.
  pub fn clamping_seeks(mut self) -> Self {
    self.clamping = true;
    self
  }

  pub fn with_calib(mut self,
                    kind: CalibrationKind,
                    abscissa: Vec<f64>,
                    ordinate: Vec<f64>)
                    -> Self {
    self.calib.insert(kind, (abscissa, ordinate));
    self
  }

  pub fn failing_open(mut self, fault: DecoderFault) -> Self {
    self.fail_open = Some(fault);
    self
  }

  /// Reading the given 1-based record fails with `FWIFC_ERR_RUNTIME`.
  pub fn failing_read_at(mut self, record: u32) -> Self {
    self.fail_read = Some(record);
    self
  }

  /// Number of handles currently open, shared by all clones.
  pub fn open_count(&self) -> Rc<Cell<i32>> {
    Rc::clone(&self.open_count)
  }

  /// Number of successful reads, shared by all clones.
  pub fn reads(&self) -> Rc<Cell<usize>> {
    Rc::clone(&self.reads)
  }

  /// Opens a `FwFile` at `path` on top of clones of this decoder.
  pub fn session(&self, path: &str) -> Result<FwFile> {
    let decoder = self.clone();
    FwFile::open_with(Path::new(path), move |_: Format| {
      Ok(Box::new(decoder.clone()) as Box<dyn Decoder>)
    })
  }

  fn count(&self) -> u32 {
    self.shots.len() as u32
  }

  fn ensure_open(&self) -> DecodeResult<()> {
    if self.is_open {
      Ok(())
    } else {
      Err(DecoderFault::new(riegl::FWIFC_ERR_BAD_ARG, "no file open"))
    }
  }

  fn ensure_indexed(&self) -> DecodeResult<()> {
    if self.indexed {
      Ok(())
    } else {
      Err(DecoderFault::new(riegl::FWIFC_ERR_MISSING_INDEX,
                            "index file missing"))
    }
  }

  /// Positions at the first record matching `pred`, or past the end.
  fn seek_first<P>(&mut self, pred: P) -> DecodeResult<()>
    where P: Fn(&RawShot) -> bool
  {
    self.ensure_open()?;
    self.ensure_indexed()?;
    self.next = self.shots
                    .iter()
                    .position(pred)
                    .map_or(self.count() + 1, |idx| idx as u32 + 1);
    Ok(())
  }
}

impl Decoder for MemoryDecoder {
  fn library_version(&mut self) -> DecodeResult<LibraryVersion> {
    Ok(LibraryVersion { api_major:     1,
                        api_minor:     5,
                        build_version: "2.5.10".to_owned(),
                        build_tag:     "mock".to_owned(), })
  }

  fn open(&mut self, _path: &Path) -> DecodeResult<()> {
    if let Some(fault) = &self.fail_open {
      return Err(fault.clone());
    }
    self.is_open = true;
    self.next = 1;
    self.open_count.set(self.open_count.get() + 1);
    Ok(())
  }

  fn close(&mut self) -> DecodeResult<()> {
    if self.is_open {
      self.is_open = false;
      self.open_count.set(self.open_count.get() - 1);
    }
    Ok(())
  }

  fn info(&mut self) -> DecodeResult<RawInfo> {
    self.ensure_open()?;
    Ok(self.info.clone())
  }

  fn set_sosbl_relative(&mut self, relative: bool) -> DecodeResult<()> {
    self.ensure_open()?;
    self.relative = relative;
    Ok(())
  }

  fn read(&mut self) -> DecodeResult<Option<RawShot>> {
    self.ensure_open()?;
    let record = self.next.max(1);
    if record > self.count() {
      return Ok(None);
    }
    if self.fail_read == Some(record) {
      return Err(DecoderFault::new(riegl::FWIFC_ERR_RUNTIME,
                                   format!("corrupt record {}", record)));
    }

    let mut shot = self.shots[record as usize - 1].clone();
    if !self.relative {
      let time_sorg = shot.time_sorg;
      for block in &mut shot.blocks {
        block.time_sosbl += time_sorg;
      }
    }
    self.next = record + 1;
    self.reads.set(self.reads.get() + 1);
    Ok(Some(shot))
  }

  fn seek(&mut self, record: u32) -> DecodeResult<()> {
    self.ensure_open()?;
    let last = if self.clamping {
      self.count()
    } else {
      self.count() + 1
    };
    self.next = record.min(last);
    Ok(())
  }

  fn seek_time(&mut self, time: f64) -> DecodeResult<()> {
    self.seek_first(|shot| shot.time_sorg >= time)
  }

  fn seek_time_external(&mut self, time: f64) -> DecodeResult<()> {
    self.seek_first(|shot| shot.time_external >= time)
  }

  fn tell(&mut self) -> DecodeResult<u32> {
    self.ensure_open()?;
    Ok(self.next)
  }

  fn reindex(&mut self) -> DecodeResult<()> {
    self.ensure_open()?;
    self.indexed = true;
    Ok(())
  }

  fn calib(&mut self,
           kind: CalibrationKind)
           -> DecodeResult<(Vec<f64>, Vec<f64>)> {
    self.ensure_open()?;
    self.calib.get(&kind).cloned().ok_or_else(|| {
                                    DecoderFault::new(riegl::FWIFC_ERR_BAD_ARG,
                                                      "no such table")
                                  })
  }
}


// FIXTURES ---------------------------------------------------------------- //
pub fn info(sampling_time: f64) -> RawInfo {
  RawInfo { instrument: "VZ-400".to_owned(),
            serial: "S9990001".to_owned(),
            epoch: "DAYSEC".to_owned(),
            v_group: 299_711_000.0,
            sampling_time,
            flags: 1,
            num_facets: 1 }
}

pub fn block(channel: u32, time_sosbl: f64, len: usize) -> RawBlock {
  RawBlock { time_sosbl,
             channel,
             samples: (0..len as u16).map(|s| 100 + s).collect() }
}

pub fn shot(time_sorg: f64, time_external: f64, blocks: Vec<RawBlock>) -> RawShot {
  RawShot { time_sorg,
            time_external,
            origin: [0.0; 3],
            direction: [1.0, 0.0, 0.0],
            flags: 0,
            facet: 0,
            blocks }
}

/// Three shots at `time_sorg` 0, 1 and 2 s with external times 3599 to 3601 s,
/// channel 0 holding one block of 5 samples at the start of each range gate,
/// sampling every 0.1 s.
pub fn three_shots() -> MemoryDecoder {
  let shots = (0..3).map(|idx| {
                      let t = idx as f64;
                      shot(t, 3599.0 + t, vec![block(0, 0.0, 5)])
                    })
                    .collect();
  MemoryDecoder::new(info(0.1), shots)
}
