// Copyright 2020 bmc::labs Gmbh. All rights reserved.
//
// Author: Florian Eich <florian@bmc-labs.com>

use crate::{clock::{DAY_SECONDS, WEEK_SECONDS},
            decoder::{RawInfo, RawShot},
            fubar::{Fubar, Result},
            fwifcbindings as riegl};
use chrono::NaiveDateTime;
use getset::{CopyGetters, Getters};
use std::fmt;


/// Number of digitizer channels of a shot.
pub const CHANNELS: usize = 4;

/// The epoch `time_external` of a file counts from.
#[derive(Clone, Debug, PartialEq)]
pub enum Epoch {
  DateTime(NaiveDateTime),
  DaySeconds,
  WeekSeconds,
  Unknown,
  /// Anything the library reported that we don't understand.
  Other(String),
}

impl Epoch {
  pub fn parse(epoch: &str) -> Self {
    match epoch.trim() {
      "DAYSEC" => Self::DaySeconds,
      "WEEKSEC" => Self::WeekSeconds,
      "UNKNOWN" | "" => Self::Unknown,
      other => other.parse::<NaiveDateTime>()
                    .map(Self::DateTime)
                    .unwrap_or_else(|_| Self::Other(other.to_owned())),
    }
  }

  /// Length of the period the external clock wraps at, if the epoch says so.
  pub fn period(&self) -> Option<f64> {
    match self {
      Self::DaySeconds => Some(DAY_SECONDS),
      Self::WeekSeconds => Some(WEEK_SECONDS),
      _ => None,
    }
  }
}

impl fmt::Display for Epoch {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::DateTime(datetime) => {
        write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M:%S"))
      }
      Self::DaySeconds => write!(f, "DAYSEC"),
      Self::WeekSeconds => write!(f, "WEEKSEC"),
      Self::Unknown => write!(f, "UNKNOWN"),
      Self::Other(other) => write!(f, "{}", other),
    }
  }
}


/// Metadata of an open waveform file.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct FileInfo {
  #[getset(get = "pub")]
  instrument:    String,
  #[getset(get = "pub")]
  serial:        String,
  #[getset(get = "pub")]
  epoch:         Epoch,
  /// group velocity in m/s
  #[getset(get_copy = "pub")]
  v_group:       f64,
  /// sampling interval in s
  #[getset(get_copy = "pub")]
  sampling_time: f64,
  #[getset(get_copy = "pub")]
  flags:         u16,
  #[getset(get_copy = "pub")]
  num_facets:    u16,
}

impl FileInfo {
  pub fn from_raw(raw: RawInfo) -> Self {
    Self { instrument:    raw.instrument,
           serial:        raw.serial,
           epoch:         Epoch::parse(&raw.epoch),
           v_group:       raw.v_group,
           sampling_time: raw.sampling_time,
           flags:         raw.flags,
           num_facets:    raw.num_facets, }
  }

  pub fn gps_available(&self) -> bool {
    self.flags & 0x0001 != 0
  }
}


/// One contiguous run of digitized samples.
#[derive(Clone, Debug, Default, PartialEq, CopyGetters, Getters)]
pub struct SamplingBlock {
  /// start of the block in s, relative to the shot's `time_sorg`
  #[getset(get_copy = "pub")]
  time_sosbl: f64,
  #[getset(get = "pub")]
  samples:    Vec<u16>,
}

impl SamplingBlock {
  pub fn new(time_sosbl: f64, samples: Vec<u16>) -> Self {
    Self { time_sosbl, samples }
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// Time covered by the block, `sampling_time * len`.
  pub fn duration(&self, sampling_time: f64) -> f64 {
    sampling_time * self.len() as f64
  }

  /// Time stamp of every sample: `index * sampling_time + time_sosbl`.
  pub fn timestamps(&self, sampling_time: f64) -> Vec<f64> {
    (0..self.len()).map(|idx| idx as f64 * sampling_time + self.time_sosbl)
                   .collect()
  }
}


/// Holds the concatenated samples of all blocks of a channel with their time
/// stamps.
#[derive(Clone, Debug, Default, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct ChannelData {
  timestamps: Vec<f64>,
  samples:    Vec<u16>,
}

impl ChannelData {
  pub fn from_ts(timestamps: Vec<f64>, samples: Vec<u16>) -> Self {
    Self { timestamps,
           samples }
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.timestamps.is_empty() && self.samples.is_empty()
  }
}


/// Everything recorded for a single laser shot.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct ShotRecord {
  /// start of range gate in s
  #[getset(get_copy = "pub")]
  time_sorg:     f64,
  /// start of range gate in the external time frame, in s since the epoch
  #[getset(get_copy = "pub")]
  time_external: f64,
  /// beam origin in m
  #[getset(get_copy = "pub")]
  origin:        [f64; 3],
  #[getset(get_copy = "pub")]
  direction:     [f64; 3],
  #[getset(get_copy = "pub")]
  flags:         u16,
  #[getset(get_copy = "pub")]
  facet:         u16,
  /// blocks per channel, in decode order
  #[getset(get = "pub")]
  channels:      [Vec<SamplingBlock>; CHANNELS],
  #[getset(get_copy = "pub")]
  sampling_time: f64,
}

impl ShotRecord {
  /// Groups the blocks of a decoded shot by channel. A channel index the
  /// decoder isn't supposed to deliver fails the whole shot.
  pub fn from_raw(raw: RawShot, sampling_time: f64) -> Result<Self> {
    let mut channels: [Vec<SamplingBlock>; CHANNELS] = Default::default();
    for block in raw.blocks {
      let slot = channels.get_mut(block.channel as usize)
                         .ok_or(Fubar::InvalidChannel { channel: block.channel })?;
      slot.push(SamplingBlock::new(block.time_sosbl, block.samples));
    }

    Ok(Self { time_sorg: raw.time_sorg,
              time_external: raw.time_external,
              origin: raw.origin,
              direction: raw.direction,
              flags: raw.flags,
              facet: raw.facet,
              channels,
              sampling_time })
  }

  /// The blocks of channel `n`; empty for channels that don't exist.
  pub fn channel(&self, n: usize) -> &[SamplingBlock] {
    self.channels.get(n).map(Vec::as_slice).unwrap_or(&[])
  }

  /// All samples of channel `n`, blocks concatenated in decode order.
  pub fn channel_series(&self, n: usize) -> ChannelData {
    let (mut timestamps, mut samples) = (Vec::new(), Vec::new());
    for block in self.channel(n) {
      timestamps.extend(block.timestamps(self.sampling_time));
      samples.extend_from_slice(block.samples());
    }
    ChannelData::from_ts(timestamps, samples)
  }
}


/// The calibration tables a file may carry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CalibrationKind {
  AmplitudeHigh,
  AmplitudeLow,
  RangeHigh,
  RangeLow,
}

impl CalibrationKind {
  pub const ALL: [Self; 4] = [Self::AmplitudeHigh,
                              Self::AmplitudeLow,
                              Self::RangeHigh,
                              Self::RangeLow];

  pub fn table_index(self) -> u16 {
    match self {
      Self::AmplitudeHigh => riegl::FWIFC_CALIB_AMPL_CH0,
      Self::AmplitudeLow => riegl::FWIFC_CALIB_AMPL_CH1,
      Self::RangeHigh => riegl::FWIFC_CALIB_RNG_CH0,
      Self::RangeLow => riegl::FWIFC_CALIB_RNG_CH1,
    }
  }
}

impl fmt::Display for CalibrationKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let name = match self {
      Self::AmplitudeHigh => "amplitude ch0",
      Self::AmplitudeLow => "amplitude ch1",
      Self::RangeHigh => "range ch0",
      Self::RangeLow => "range ch1",
    };
    write!(f, "{}", name)
  }
}


/// A lookup curve, abscissa and ordinate of equal length.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct CalibrationTable {
  #[getset(get_copy = "pub")]
  kind:     CalibrationKind,
  #[getset(get = "pub")]
  abscissa: Vec<f64>,
  #[getset(get = "pub")]
  ordinate: Vec<f64>,
}

impl CalibrationTable {
  /// Builds the table; surplus values of the longer sequence are dropped.
  pub fn new(kind: CalibrationKind,
             mut abscissa: Vec<f64>,
             mut ordinate: Vec<f64>)
             -> Self {
    let len = abscissa.len().min(ordinate.len());
    abscissa.truncate(len);
    ordinate.truncate(len);
    Self { kind,
           abscissa,
           ordinate }
  }

  pub fn len(&self) -> usize {
    self.abscissa.len()
  }

  pub fn is_empty(&self) -> bool {
    self.abscissa.is_empty()
  }

  /// Piecewise linear lookup, clamped to the first and last entry. Expects an
  /// ascending abscissa.
  pub fn interpolate(&self, x: f64) -> Option<f64> {
    let (xs, ys) = (&self.abscissa, &self.ordinate);
    let last = self.len().checked_sub(1)?;

    if x <= xs[0] {
      return Some(ys[0]);
    }
    if x >= xs[last] {
      return Some(ys[last]);
    }

    let upper = xs.iter().position(|&xi| xi >= x)?;
    let (x0, x1, y0, y1) = (xs[upper - 1], xs[upper], ys[upper - 1], ys[upper]);
    if x1 == x0 {
      return Some(y0);
    }
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::decoder::RawBlock;
  use chrono::NaiveDate;
  use pretty_assertions::assert_eq;


  fn raw_shot(blocks: Vec<RawBlock>) -> RawShot {
    RawShot { time_sorg: 1.0,
              time_external: 3600.5,
              origin: [0.0, 0.0, 1.5],
              direction: [0.0, 1.0, 0.0],
              flags: 1,
              facet: 2,
              blocks }
  }

  fn raw_block(channel: u32, time_sosbl: f64, samples: Vec<u16>) -> RawBlock {
    RawBlock { time_sosbl,
               channel,
               samples }
  }

  #[test]
  fn epoch_test() {
    assert_eq!(Epoch::DaySeconds, Epoch::parse("DAYSEC"));
    assert_eq!(Epoch::WeekSeconds, Epoch::parse("WEEKSEC"));
    assert_eq!(Epoch::Unknown, Epoch::parse("UNKNOWN"));
    assert_eq!(Epoch::Other("GPS".to_owned()), Epoch::parse("GPS"));

    let datetime = NaiveDate::from_ymd_opt(2010, 11, 16).unwrap()
                                                        .and_hms_opt(0, 0, 0)
                                                        .unwrap();
    let epoch = Epoch::parse("2010-11-16T00:00:00");
    assert_eq!(Epoch::DateTime(datetime), epoch);
    assert_eq!("2010-11-16T00:00:00", &epoch.to_string());

    assert_eq!(Some(86400.0), Epoch::DaySeconds.period());
    assert_eq!(Some(604800.0), Epoch::WeekSeconds.period());
    assert_eq!(None, epoch.period());
  }

  #[test]
  fn file_info_test() {
    let info = FileInfo::from_raw(RawInfo { instrument:    "VQ-580".to_owned(),
                                            serial:        "S2221234".to_owned(),
                                            epoch:         "DAYSEC".to_owned(),
                                            v_group:       299_700_000.0,
                                            sampling_time: 0.5e-9,
                                            flags:         1,
                                            num_facets:    4, });

    assert_eq!("VQ-580", info.instrument().as_str());
    assert_eq!(&Epoch::DaySeconds, info.epoch());
    assert_eq!(0.5e-9, info.sampling_time());
    assert_eq!(4, info.num_facets());
    assert!(info.gps_available());
  }

  #[test]
  fn shot_from_raw_test() {
    let raw = raw_shot(vec![raw_block(3, 0.1, vec![1, 2]),
                            raw_block(0, 0.4, vec![5]),
                            raw_block(0, 0.2, vec![6, 7, 8])]);
    let shot = ShotRecord::from_raw(raw, 0.1).unwrap();

    assert_eq!(1.0, shot.time_sorg());
    assert_eq!(3600.5, shot.time_external());
    assert_eq!([0.0, 0.0, 1.5], shot.origin());
    assert_eq!(2, shot.facet());
    assert_eq!(CHANNELS, shot.channels().len());

    // decode order is kept, not time order
    assert_eq!(&[SamplingBlock::new(0.4, vec![5]),
                 SamplingBlock::new(0.2, vec![6, 7, 8])],
               shot.channel(0));
    assert!(shot.channel(1).is_empty());
    assert!(shot.channel(2).is_empty());
    assert_eq!(1, shot.channel(3).len());
    assert!(shot.channel(4).is_empty());
  }

  #[test]
  fn shot_from_raw_invalid_channel_test() {
    let raw = raw_shot(vec![raw_block(0, 0.1, vec![1]),
                            raw_block(4, 0.2, vec![2])]);

    assert_eq!(Err(Fubar::InvalidChannel { channel: 4 }),
               ShotRecord::from_raw(raw, 0.1));
  }

  #[test]
  fn block_timestamps_test() {
    let sampling_time = 0.25;
    let block = SamplingBlock::new(2.0, vec![10, 11, 12, 13, 14]);
    let timestamps = block.timestamps(sampling_time);

    assert_eq!(vec![2.0, 2.25, 2.5, 2.75, 3.0], timestamps);
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!((block.len() - 1) as f64 * sampling_time,
               timestamps[timestamps.len() - 1] - timestamps[0]);
    assert_eq!(1.25, block.duration(sampling_time));
  }

  #[test]
  fn channel_series_test() {
    let raw = raw_shot(vec![raw_block(1, 0.5, vec![4, 5]),
                            raw_block(1, 0.0, vec![]),
                            raw_block(1, 1.0, vec![6])]);
    let shot = ShotRecord::from_raw(raw, 0.25).unwrap();
    let series = shot.channel_series(1);

    assert_eq!(&vec![0.5, 0.75, 1.0], series.timestamps());
    assert_eq!(&vec![4_u16, 5, 6], series.samples());
    assert!(shot.channel_series(2).is_empty());
  }

  #[test]
  fn calibration_table_test() {
    let table = CalibrationTable::new(CalibrationKind::RangeLow,
                                      vec![0.0, 10.0, 20.0],
                                      vec![1.0, 2.0, 4.0, 99.0]);

    assert_eq!(3, table.len());
    assert_eq!(3, CalibrationKind::RangeLow.table_index());
    assert_eq!(Some(1.0), table.interpolate(-5.0));
    assert_eq!(Some(1.5), table.interpolate(5.0));
    assert_eq!(Some(3.0), table.interpolate(15.0));
    assert_eq!(Some(2.0), table.interpolate(10.0));
    assert_eq!(Some(4.0), table.interpolate(25.0));

    let empty = CalibrationTable::new(CalibrationKind::AmplitudeHigh,
                                      vec![],
                                      vec![]);
    assert!(empty.is_empty());
    assert_eq!(None, empty.interpolate(1.0));
  }
}
