//! Public configuration surface: [`Options`] and [`DemuxerConfig`].

use serde::{Deserialize, Serialize};

/// Which 608 channel (CC1/CC2 within a field) to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CcChannel {
    Cc1,
    Cc2,
}

/// Container codec the compressed packets are carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    Mpeg2,
    H264,
}

/// NAL/packet framing used by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packaging {
    AnnexB,
    Avcc,
}

/// Options controlling a [`crate::context::Context`], the Rust analogue of
/// `cea_options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub cc_channel: CcChannel,
    pub enable_708: bool,
    /// Which of the 63 708 service numbers (1-indexed) to decode.
    pub services_708: Vec<u8>,
    /// If true, roll-up captions are emitted one line at a time instead of
    /// accumulating multiple visible rows.
    pub no_rollup: bool,
    /// 0 means auto (derived from the demuxer / SPS / B-frame hints).
    pub reorder_window: u8,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cc_channel: CcChannel::Cc1,
            enable_708: true,
            services_708: vec![1],
            no_rollup: false,
            reorder_window: 0,
        }
    }
}

/// Demuxer configuration, required before `feed_packet` (see `set_demuxer`).
#[derive(Debug, Clone)]
pub struct DemuxerConfig {
    pub codec: Codec,
    pub packaging: Packaging,
    /// SPS-derived reorder window, if extradata contained one. -1 = not yet known.
    pub sps_reorder_window: i32,
    /// Cached AVCC NAL length size; 0 until auto-detected.
    pub nal_length_size: u8,
}

impl DemuxerConfig {
    pub fn new(codec: Codec, packaging: Packaging) -> Self {
        DemuxerConfig {
            codec,
            packaging,
            sps_reorder_window: -1,
            nal_length_size: 0,
        }
    }
}
