// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Author: Florian Eich <florian@bmc-labs.com>

mod clock;
mod decoder;
mod fubar;
mod fwfile;
mod fwifcbindings;
mod inspect;
mod native;
mod search;
mod service;
mod storage;

#[cfg(test)]
mod mock;

pub use clock::{ClockPolicy, DAY_SECONDS, WEEK_SECONDS};
pub use decoder::{DecodeResult,
                  Decoder,
                  DecoderFault,
                  Format,
                  LibraryVersion,
                  RawBlock,
                  RawInfo,
                  RawShot};
pub use fubar::{Fubar, Result};
pub use fwfile::{FwFile, Shots};
pub use inspect::{Inspection, Inspector, InspectorConfig, PointOfInterest};
pub use search::{range_to_time,
                 time_to_range,
                 ChannelRole,
                 ChannelRoles,
                 LocatedBlock,
                 SearchOutcome,
                 SegmentSearch,
                 Trace};
pub use storage::{CalibrationKind,
                  CalibrationTable,
                  ChannelData,
                  Epoch,
                  FileInfo,
                  SamplingBlock,
                  ShotRecord,
                  CHANNELS};
