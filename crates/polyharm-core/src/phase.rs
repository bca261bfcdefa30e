use serde::{Deserialize, Serialize};

use crate::special::minus_one_pow;

/// Sign convention for the azimuthal eigenfunction.
///
/// Encoded as two bits: bit 1 selects absolute-order (negative-Legendre)
/// sign handling, bit 2 the Condon-Shortley factor. Both set reproduces the
/// usual `Y_l^m` convention of scientific libraries.
///
/// The numbering is our own: some libraries assign these two bits the other
/// way round. The value returned by [`Phase::bits`] is persisted as the
/// `phase` field of the wire format, so files from a tool with the swapped
/// numbering must have bits 1 and 2 exchanged before import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phase {
    pub absolute_order: bool,
    pub condon_shortley: bool,
}

impl Phase {
    pub const NONE: Phase = Phase {
        absolute_order: false,
        condon_shortley: false,
    };

    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits <= 3).then_some(Self {
            absolute_order: bits & 1 != 0,
            condon_shortley: bits & 2 != 0,
        })
    }

    pub fn bits(self) -> u8 {
        u8::from(self.absolute_order) | (u8::from(self.condon_shortley) << 1)
    }

    /// The four conventions, in bit order.
    pub fn all() -> [Phase; 4] {
        [0, 1, 2, 3].map(|b| Self {
            absolute_order: b & 1 != 0,
            condon_shortley: b & 2 != 0,
        })
    }

    /// Real sign multiplying the azimuthal eigenfunction of signed order `m`.
    pub fn factor(self, m: i64) -> f64 {
        let abs = m.abs();
        match (self.absolute_order, self.condon_shortley) {
            (false, false) => 1.0,
            (true, false) => minus_one_pow((abs - m) / 2),
            (false, true) => minus_one_pow(m),
            (true, true) => minus_one_pow((abs + m) / 2),
        }
    }
}
