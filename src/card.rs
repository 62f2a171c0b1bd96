//! Card representation and tag-standard classification

use bytes::Bytes;

/// Tag standard selected from the card's ATR
///
/// The classification looks at a single ATR byte and is intentionally coarse,
/// not a full card-type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStandard {
    /// ISO/IEC 14443-3 tags (MIFARE family and friends)
    Iso14443_3,
    /// ISO/IEC 14443-4 tags (application-level cards)
    Iso14443_4,
}

impl TagStandard {
    /// Classify a card by its ATR
    ///
    /// Byte index 5 equal to `0x4f` selects ISO 14443-3; anything else,
    /// including a too-short or missing ATR, selects ISO 14443-4.
    pub fn from_atr(atr: &[u8]) -> Self {
        match atr.get(5) {
            Some(0x4f) => Self::Iso14443_3,
            _ => Self::Iso14443_4,
        }
    }
}

/// A card currently present in a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Answer To Reset reported by the driver; empty when the status
    /// notification carried none
    atr: Bytes,

    /// Tag standard classified from the ATR
    standard: TagStandard,
}

impl Card {
    /// Build a card record from a status notification's ATR
    pub fn from_atr(atr: Option<Bytes>) -> Self {
        let atr = atr.unwrap_or_default();
        let standard = TagStandard::from_atr(&atr);
        Self { atr, standard }
    }

    /// Get the card's ATR
    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    /// Get the classified tag standard
    pub const fn standard(&self) -> TagStandard {
        self.standard
    }
}
