// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 8086 FLAGS register.

use bitflags::bitflags;

use std::collections::BTreeMap;

bitflags! {
    /// The FLAGS word. Bits without a name are architecturally unused but preserved.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Flags: u16 {
        /// Carry.
        const CF = 1 << 0;
        /// Parity.
        const PF = 1 << 2;
        /// Auxiliary carry.
        const AF = 1 << 4;
        /// Zero.
        const ZF = 1 << 6;
        /// Sign.
        const SF = 1 << 7;
        /// Trap.
        const TF = 1 << 8;
        /// Interrupt enable.
        const IF = 1 << 9;
        /// Direction.
        const DF = 1 << 10;
        /// Overflow.
        const OF = 1 << 11;
    }
}

impl Flags {
    fn o(&self) -> bool {
        self.contains(Self::OF)
    }

    fn no(&self) -> bool {
        !self.contains(Self::OF)
    }

    fn b(&self) -> bool {
        self.contains(Self::CF)
    }

    fn nb(&self) -> bool {
        !self.contains(Self::CF)
    }

    fn e(&self) -> bool {
        self.contains(Self::ZF)
    }

    fn ne(&self) -> bool {
        !self.contains(Self::ZF)
    }

    fn be(&self) -> bool {
        self.intersects(Self::CF.union(Self::ZF))
    }

    fn nbe(&self) -> bool {
        !self.intersects(Self::CF.union(Self::ZF))
    }

    fn s(&self) -> bool {
        self.contains(Self::SF)
    }

    fn ns(&self) -> bool {
        !self.contains(Self::SF)
    }

    fn p(&self) -> bool {
        self.contains(Self::PF)
    }

    fn np(&self) -> bool {
        !self.contains(Self::PF)
    }

    fn l(&self) -> bool {
        self.contains(Self::SF) != self.contains(Self::OF)
    }

    fn nl(&self) -> bool {
        self.contains(Self::SF) == self.contains(Self::OF)
    }

    fn le(&self) -> bool {
        self.contains(Self::ZF) || self.l()
    }

    fn nle(&self) -> bool {
        !self.contains(Self::ZF) && self.nl()
    }

    const CONDITIONS: [fn(&Self) -> bool; 16] = [
        Self::o, Self::no, Self::b, Self::nb, Self::e, Self::ne, Self::be, Self::nbe,
        Self::s, Self::ns, Self::p, Self::np, Self::l, Self::nl, Self::le, Self::nle,
    ];

    /// Evaluates the conditional-jump predicate selected by the low 4 bits of
    /// a `0x70`-`0x7F` opcode.
    pub fn condition(&self, cc: u8) -> bool {
        Self::CONDITIONS[(cc & 0xF) as usize](self)
    }

    /// Mapping from flag name to its current value, 0 or 1.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u16> {
        [
            ("CF", Self::CF),
            ("PF", Self::PF),
            ("AF", Self::AF),
            ("ZF", Self::ZF),
            ("SF", Self::SF),
            ("TF", Self::TF),
            ("IF", Self::IF),
            ("DF", Self::DF),
            ("OF", Self::OF),
        ]
        .into_iter()
        .map(|(name, flag)| (name, self.contains(flag) as u16))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_codes() {
        let f = Flags::ZF;
        assert!(f.condition(0x4)); // JE
        assert!(!f.condition(0x5)); // JNE
        assert!(f.condition(0x6)); // JBE
        assert!(!f.condition(0x7)); // JA

        let f = Flags::SF;
        assert!(f.condition(0x8)); // JS
        assert!(f.condition(0xC)); // JL: SF != OF
        assert!(!f.condition(0xD)); // JGE

        let f = Flags::SF | Flags::OF;
        assert!(f.condition(0xD)); // JGE: SF == OF
        assert!(f.condition(0xF)); // JG
    }

    #[test]
    fn unused_bits_survive_round_trip() {
        let f = Flags::from_bits_retain(0xF002);
        assert_eq!(f.bits(), 0xF002);
        assert!(!f.contains(Flags::CF));
    }

    #[test]
    fn snapshot_names() {
        let snap = (Flags::CF | Flags::OF).snapshot();
        assert_eq!(snap["CF"], 1);
        assert_eq!(snap["OF"], 1);
        assert_eq!(snap["ZF"], 0);
        assert_eq!(snap.len(), 9);
    }
}
