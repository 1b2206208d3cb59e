//! Public output data model: `Caption` and the raw `cc_data` triplet.

use serde::{Deserialize, Serialize};

/// One 3-byte ATSC A/53 `cc_data` unit.
///
/// `marker` packs `cc_valid` at bit 2 and `cc_type` at bits 1..0, matching the
/// wire format `(0xF8|cc_valid<<2|cc_type, b1, b2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triplet {
    pub marker: u8,
    pub b1: u8,
    pub b2: u8,
}

impl Triplet {
    pub fn new(marker: u8, b1: u8, b2: u8) -> Self {
        Triplet { marker, b1, b2 }
    }

    pub fn cc_valid(&self) -> bool {
        (self.marker & 0x04) != 0
    }

    pub fn cc_type(&self) -> u8 {
        self.marker & 0x03
    }
}

/// Which field/service a caption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Field1 = 1,
    Field2 = 2,
    Dtvcc = 3,
}

/// The 608 display mode a caption was produced under, or the 708 fixed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTag {
    Pop,
    Ru2,
    Ru3,
    Ru4,
    Paint,
    Text,
}

impl ModeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeTag::Pop => "POP",
            ModeTag::Ru2 => "RU2",
            ModeTag::Ru3 => "RU3",
            ModeTag::Ru4 => "RU4",
            ModeTag::Paint => "PAI",
            ModeTag::Text => "TXT",
        }
    }
}

/// A completed, renderable caption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    #[serde(skip)]
    pub field: FieldValue,
    pub base_row: i32,
    pub mode_tag: String,
    /// "608" for line-21 captions, "7NN" (NN = zero-padded service number) for 708.
    pub info_tag: String,
}

/// Plain numeric mirror of [`Field`] that derives `Default`/serde without fuss.
pub type FieldValue = i32;

impl Caption {
    pub fn new608(
        text: String,
        start_ms: i64,
        end_ms: i64,
        field: Field,
        base_row: i32,
        mode: ModeTag,
    ) -> Self {
        Caption {
            text,
            start_ms,
            end_ms,
            field: field as i32,
            base_row,
            mode_tag: mode.as_str().to_string(),
            info_tag: "608".to_string(),
        }
    }

    pub fn new708(
        text: String,
        start_ms: i64,
        end_ms: i64,
        service_number: u8,
        base_row: i32,
    ) -> Self {
        Caption {
            text,
            start_ms,
            end_ms,
            field: Field::Dtvcc as i32,
            base_row,
            mode_tag: "POP".to_string(),
            info_tag: format!("7{service_number:02}"),
        }
    }
}

/// An event fired through the live-callback delivery mode: either a "show"
/// (new text visible) or a "clear" (previously shown text ended).
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Show { field: FieldValue, text: String, start_ms: i64 },
    Clear { field: FieldValue, end_ms: i64 },
}
