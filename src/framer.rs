//! Byte-stuffing codec and marker-delimited packet extraction.
//!
//! Grounded on `include/core/documents/DocumentPkg.h` and
//! `include/core/admin/ByteStuffing.{h,cpp}`: two ordered `(from, to)` byte
//! rules define both the escaping transform and the packet header marker
//! (`rule[0].from || rule[1].from`). Stuffing and unstuffing scan the input
//! once, checking `rule[0]` before `rule[1]` at every position — this
//! single-pass-with-priority behavior, not a two-pass whole-buffer replace,
//! is what produces the wire forms in the scenarios this module is tested
//! against (a naive double replace would re-stuff bytes rule 0 just
//! inserted).

use parking_lot::Mutex;

use crate::error::{Result, TransitError};

/// One byte-stuffing rule: every occurrence of `from` becomes `to` when
/// stuffing, and vice versa when unstuffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuffingRule {
    pub from: Vec<u8>,
    pub to: Vec<u8>,
}

impl StuffingRule {
    #[must_use]
    pub fn new(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Default table: `0xAA -> 0xBB 0x00`, `0xBB -> 0xBB 0x01`.
#[must_use]
pub fn default_rules() -> [StuffingRule; 2] {
    [
        StuffingRule::new(vec![0xAA], vec![0xBB, 0x00]),
        StuffingRule::new(vec![0xBB], vec![0xBB, 0x01]),
    ]
}

/// Accumulates bytes off the wire and extracts whole marker-delimited
/// packets. One framer is created per receive-side endpoint; it is not
/// shared across sessions.
pub struct PacketFramer {
    rules: [StuffingRule; 2],
    header: Vec<u8>,
    accumulator: Mutex<Vec<u8>>,
}

impl std::fmt::Debug for PacketFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketFramer")
            .field("rules", &self.rules)
            .field("accumulated", &self.accumulator.lock().len())
            .finish()
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new(default_rules()).expect("default stuffing table is always valid")
    }
}

impl PacketFramer {
    /// Builds a framer from a rule table, rejecting configurations that
    /// can't decode unambiguously (see module docs).
    pub fn new(rules: [StuffingRule; 2]) -> Result<Self> {
        Self::validate(&rules)?;
        let mut header = rules[0].from.clone();
        header.extend_from_slice(&rules[1].from);
        Ok(Self {
            rules,
            header,
            accumulator: Mutex::new(Vec::new()),
        })
    }

    fn validate(rules: &[StuffingRule; 2]) -> Result<()> {
        for rule in rules {
            if rule.from.is_empty() || rule.to.is_empty() {
                return Err(TransitError::invalid_framer_config(
                    "stuffing rule `from`/`to` must be non-empty",
                ));
            }
        }
        if rules[0].to == rules[1].to
            || rules[0].to.starts_with(rules[1].to.as_slice())
            || rules[1].to.starts_with(rules[0].to.as_slice())
        {
            return Err(TransitError::invalid_framer_config(
                "stuffing rule `to` values must be self-disjoint",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        Self::validate(&self.rules).is_ok()
    }

    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Applies `rule[0]` then `rule[1]`, single pass, priority order.
    #[must_use]
    pub fn stuff(&self, bytes: &[u8]) -> Vec<u8> {
        Self::transform(bytes, &self.rules, Direction::Stuff)
    }

    /// Inverse of [`PacketFramer::stuff`], applying the rules in the same
    /// order rather than reversed (see DESIGN.md for why).
    #[must_use]
    pub fn unstuff(&self, bytes: &[u8]) -> Vec<u8> {
        Self::transform(bytes, &self.rules, Direction::Unstuff)
    }

    fn transform(bytes: &[u8], rules: &[StuffingRule; 2], direction: Direction) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        'outer: while i < bytes.len() {
            for rule in rules {
                let (needle, replacement) = match direction {
                    Direction::Stuff => (&rule.from, &rule.to),
                    Direction::Unstuff => (&rule.to, &rule.from),
                };
                if bytes[i..].starts_with(needle.as_slice()) {
                    out.extend_from_slice(replacement);
                    i += needle.len();
                    continue 'outer;
                }
            }
            out.push(bytes[i]);
            i += 1;
        }
        out
    }

    /// Appends raw wire bytes to the accumulator.
    pub fn append(&self, bytes: &[u8]) {
        self.accumulator.lock().extend_from_slice(bytes);
    }

    #[must_use]
    pub fn accumulated_len(&self) -> usize {
        self.accumulator.lock().len()
    }

    /// Finds the first occurrence of the header marker at or after
    /// `start_idx`.
    #[must_use]
    pub fn has_header(&self, start_idx: usize) -> Option<usize> {
        let acc = self.accumulator.lock();
        find_subslice(&acc, &self.header, start_idx)
    }

    /// Extracts one complete framed packet (opening header plus stuffed
    /// payload, not including the closing header) from the accumulator, if
    /// present, and consumes the source bytes through the end of the
    /// closing header.
    pub fn get_package(&self) -> Option<Vec<u8>> {
        if !self.is_valid() {
            return None;
        }
        let mut acc = self.accumulator.lock();
        if !acc.starts_with(self.header.as_slice()) {
            return None;
        }
        let p1 = 0;
        let search_from = p1 + self.header.len();
        let p2 = find_subslice(&acc, &self.header, search_from)?;

        let packet = acc[p1..p2].to_vec();
        acc.drain(0..p2 + self.header.len());
        Some(packet)
    }

    /// Drains all complete packets currently buffered.
    pub fn drain_packages(&self) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        while let Some(packet) = self.get_package() {
            packets.push(packet);
        }
        packets
    }
}

enum Direction {
    Stuff,
    Unstuff,
}

fn find_subslice(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuff_unstuff_roundtrip_no_escape() {
        let framer = PacketFramer::default();
        let payload = b"Hi";
        let stuffed = framer.stuff(payload);
        assert_eq!(stuffed, payload);
        assert_eq!(framer.unstuff(&stuffed), payload);
    }

    #[test]
    fn framing_happy_path() {
        let framer = PacketFramer::default();
        let payload = b"Hi";
        let stuffed = framer.stuff(payload);
        let mut wire = vec![0xAA, 0xBB];
        wire.extend_from_slice(&stuffed);
        wire.extend_from_slice(&[0xAA, 0xBB]);

        framer.append(&wire);
        let packet = framer.get_package().expect("complete packet");
        assert_eq!(packet, vec![0xAA, 0xBB, b'H', b'i']);
        assert_eq!(framer.accumulated_len(), 0);
    }

    #[test]
    fn framing_with_escape_sequences() {
        let framer = PacketFramer::default();
        let payload = vec![0xAA, 0xBB];
        let stuffed = framer.stuff(&payload);
        assert_eq!(stuffed, vec![0xBB, 0x00, 0xBB, 0x01]);

        let mut wire = vec![0xAA, 0xBB];
        wire.extend_from_slice(&stuffed);
        wire.extend_from_slice(&[0xAA, 0xBB]);

        framer.append(&wire);
        let packet = framer.get_package().expect("complete packet");
        assert_eq!(packet, vec![0xAA, 0xBB, 0xBB, 0x00, 0xBB, 0x01]);

        let unstuffed = framer.unstuff(&packet[2..]);
        assert_eq!(unstuffed, payload);
    }

    #[test]
    fn get_package_requires_opening_header_at_zero() {
        let framer = PacketFramer::default();
        framer.append(b"garbage");
        framer.append(&[0xAA, 0xBB]);
        assert!(framer.get_package().is_none());
    }

    #[test]
    fn get_package_without_closing_marker_is_none_and_preserves_accumulator() {
        let framer = PacketFramer::default();
        framer.append(&[0xAA, 0xBB, b'H', b'i']);
        assert!(framer.get_package().is_none());
        assert_eq!(framer.accumulated_len(), 4);
    }

    #[test]
    fn get_package_consumes_through_the_closing_marker() {
        let framer = PacketFramer::default();
        framer.append(&[0xAA, 0xBB, b'H', b'i', 0xAA, 0xBB]);
        let packet = framer.get_package().expect("complete packet");
        assert_eq!(packet, vec![0xAA, 0xBB, b'H', b'i']);
        assert_eq!(framer.accumulated_len(), 0);
    }

    #[test]
    fn drain_packages_consumes_back_to_back_packets() {
        let framer = PacketFramer::default();
        framer.append(&[0xAA, 0xBB, b'H', b'i', 0xAA, 0xBB]);
        framer.append(&[0xAA, 0xBB, b'Y', b'o', 0xAA, 0xBB]);
        let packets = framer.drain_packages();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0], vec![0xAA, 0xBB, b'H', b'i']);
        assert_eq!(packets[1], vec![0xAA, 0xBB, b'Y', b'o']);
        assert_eq!(framer.accumulated_len(), 0);
    }

    #[test]
    fn rejects_non_self_disjoint_rules() {
        let rules = [
            StuffingRule::new(vec![0x01], vec![0x02, 0x03]),
            StuffingRule::new(vec![0x04], vec![0x02, 0x03]),
        ];
        assert!(PacketFramer::new(rules).is_err());
    }

    #[test]
    fn rejects_empty_rule() {
        let rules = [
            StuffingRule::new(Vec::new(), vec![0x02]),
            StuffingRule::new(vec![0x04], vec![0x05]),
        ];
        assert!(PacketFramer::new(rules).is_err());
    }
}
