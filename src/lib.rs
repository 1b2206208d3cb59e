/*
 * lib.rs
 * ------
 * Author: Chris Kennedy
 *
 * ATSC A/53 closed-caption extraction: EIA-608 line-21 captions and CEA-708
 * (DTVCC) captions, demuxed from H.264 (Annex B / AVCC) and MPEG-2 video.
 */

pub mod args;
pub mod bitreader;
pub mod caption;
pub mod context;
pub mod decoder608;
pub mod decoder708;
pub mod demux_h264;
pub mod demux_mpeg2;
pub mod error;
pub mod logging;
pub mod options;
pub mod render;
pub mod reorder;
pub mod timing;

pub use caption::{Caption, Field, LiveEvent, Triplet};
pub use context::Context;
pub use error::{CeaError, CeaResult};
pub use logging::{set_log_callback, CaptionLogger, LogLevel};
pub use options::{CcChannel, Codec, DemuxerConfig, Options, Packaging};
