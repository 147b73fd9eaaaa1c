// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use crate::{fubar::{Fubar, Result},
            fwfile::FwFile,
            storage::{SamplingBlock, ShotRecord}};
use getset::{CopyGetters, Getters};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;


/// Round trip travel time in s of light over `range` m.
pub fn range_to_time(range: f64, v_group: f64) -> f64 {
  range * 2.0 / v_group
}

/// Inverse of `range_to_time`.
pub fn time_to_range(time: f64, v_group: f64) -> f64 {
  time * 0.5 * v_group
}


/// Which digitizer channel plays which part when locating a point.
///
/// The defaults follow the channel layout of the RIEGL instruments:
/// 0 high power, 1 low power, 2 shp, 3 reference (pilot).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ChannelRoles {
  /// channel whose first block marks the time origin of a shot
  pub pilot: usize,
  pub low:   usize,
  pub high:  usize,
}

impl Default for ChannelRoles {
  fn default() -> Self {
    Self { pilot: 3,
           low:   1,
           high:  0, }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelRole {
  Low,
  High,
}

impl fmt::Display for ChannelRole {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Low => write!(f, "low"),
      Self::High => write!(f, "high"),
    }
  }
}


/// A sampling block found to contain the point, together with the shot it
/// belongs to. The block itself is untouched, its `time_sosbl` is still
/// relative to `time_sorg`.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct LocatedBlock {
  #[getset(get = "pub")]
  block:         SamplingBlock,
  #[getset(get_copy = "pub")]
  time_sorg:     f64,
  #[getset(get_copy = "pub")]
  sampling_time: f64,
}

impl LocatedBlock {
  fn new(block: &SamplingBlock, shot: &ShotRecord) -> Self {
    Self { block:         block.clone(),
           time_sorg:     shot.time_sorg(),
           sampling_time: shot.sampling_time(), }
  }

  /// Start of the block on the `time_sorg` clock.
  pub fn absolute_start(&self) -> f64 {
    self.block.time_sosbl() + self.time_sorg
  }

  /// End of the block (exclusive) on the `time_sorg` clock.
  pub fn absolute_end(&self) -> f64 {
    self.absolute_start() + self.block.duration(self.sampling_time)
  }

  /// Whether `t` lies strictly inside the block.
  pub fn contains(&self, t: f64) -> bool {
    self.absolute_start() < t && t < self.absolute_end()
  }

  /// Time stamp of every sample on the `time_sorg` clock.
  pub fn timestamps(&self) -> Vec<f64> {
    let start = self.absolute_start();
    (0..self.block.len()).map(|idx| idx as f64 * self.sampling_time + start)
                         .collect()
  }
}


/// What a search turned up: at most one block per channel role.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchOutcome {
  pub low:           Option<LocatedBlock>,
  pub high:          Option<LocatedBlock>,
  /// number of shots looked at
  pub shots_scanned: usize,
}

impl SearchOutcome {
  pub fn is_empty(&self) -> bool {
    self.low.is_none() && self.high.is_none()
  }

  pub fn get(&self, role: ChannelRole) -> Option<&LocatedBlock> {
    match role {
      ChannelRole::Low => self.low.as_ref(),
      ChannelRole::High => self.high.as_ref(),
    }
  }
}


/// Finds the sampling blocks of the low and high channel containing a point in
/// time, scanning forward shot by shot.
///
/// All blocks of a shot are checked, in decode order, and so are all shots up
/// to the first one whose range gate starts after the point. A later match
/// replaces an earlier one. Running out of shots before that ends the search
/// too; if nothing was found by then, that's `Fubar::PointNotFound`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SegmentSearch {
  roles: ChannelRoles,
}

impl SegmentSearch {
  pub fn new(roles: ChannelRoles) -> Self {
    Self { roles }
  }

  pub fn roles(&self) -> ChannelRoles {
    self.roles
  }

  /// Time origin `t_ref` of a shot on the `time_sorg` clock: the start of the
  /// first block of the pilot channel.
  pub fn reference_time(&self, shot: &ShotRecord) -> Result<f64> {
    let pilot = self.roles.pilot;
    shot.channel(pilot)
        .first()
        .map(|block| block.time_sosbl() + shot.time_sorg())
        .ok_or(Fubar::MissingReference { channel: pilot })
  }

  /// Scans `first` and the shots `next` yields for blocks containing
  /// `t_point` (on the `time_sorg` clock). `next` returns `Ok(None)` once
  /// there are no more shots.
  pub fn scan<N>(&self,
                 first: ShotRecord,
                 t_point: f64,
                 mut next: N)
                 -> Result<SearchOutcome>
    where N: FnMut() -> Result<Option<ShotRecord>>
  {
    let mut outcome = SearchOutcome::default();
    let mut shot = first;

    loop {
      outcome.shots_scanned += 1;
      if let Some(found) = locate(&shot, self.roles.low, t_point) {
        outcome.low = Some(found);
      }
      if let Some(found) = locate(&shot, self.roles.high, t_point) {
        outcome.high = Some(found);
      }

      shot = match next()? {
        Some(shot) => shot,
        None if outcome.is_empty() => {
          return Err(Fubar::PointNotFound { t_point });
        }
        None => break,
      };
      if shot.time_sorg() > t_point {
        break;
      }
    }

    debug!("t = {} s: low {}, high {} after {} shots",
           t_point,
           outcome.low.is_some(),
           outcome.high.is_some(),
           outcome.shots_scanned);
    Ok(outcome)
  }

  /// `scan` over the following shots of `file`.
  pub fn run(&self,
             file: &mut FwFile,
             first: ShotRecord,
             t_point: f64)
             -> Result<SearchOutcome> {
    self.scan(first, t_point, || file.read())
  }
}

/// Last block of `channel` in `shot` containing `t_point`.
fn locate(shot: &ShotRecord,
          channel: usize,
          t_point: f64)
          -> Option<LocatedBlock> {
  shot.channel(channel)
      .iter()
      .map(|block| LocatedBlock::new(block, shot))
      .filter(|located| located.contains(t_point))
      .last()
}


/// Samples of a located block laid out for plotting against the point: time
/// zeroed at the shot's reference time, and the same axis as range in m.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct Trace {
  #[getset(get_copy = "pub")]
  role:    ChannelRole,
  #[getset(get = "pub")]
  times:   Vec<f64>,
  #[getset(get = "pub")]
  ranges:  Vec<f64>,
  #[getset(get = "pub")]
  samples: Vec<u16>,
}

impl Trace {
  pub fn new(role: ChannelRole,
             located: &LocatedBlock,
             t_ref: f64,
             v_group: f64)
             -> Self {
    let times: Vec<f64> =
      located.timestamps().into_iter().map(|t| t - t_ref).collect();
    let ranges = times.iter().map(|&t| time_to_range(t, v_group)).collect();
    Self { role,
           times,
           ranges,
           samples: located.block().samples().clone() }
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// `(range, amplitude)` pairs.
  pub fn rows(&self) -> impl Iterator<Item = (f64, u16)> + '_ {
    self.ranges.iter().copied().zip(self.samples.iter().copied())
  }
}
