//! Per-step snapshots and their JSON interchange format.
//!
//! A batch goes over the wire as a JSON array of frames:
//!
//! ```json
//! [{"ids": [1, 2], "positions": [0.0, 0.0, 0.0, 5.0, -0.03, 0.0]}]
//! ```
//!
//! `positions` is flat, three values per id, in id order. Frames holding a
//! NaN or infinite coordinate also carry `"degenerate": true`; JSON has no
//! encoding for those values, so they are written as `null`.

use serde::{Deserialize, Serialize};

use crate::simulation::BodyId;
use crate::streaming::StreamingError;

/// Snapshot of every body's position after one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    ids: Vec<BodyId>,
    positions: Vec<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    degenerate: bool,
}

#[derive(Deserialize)]
struct RawFrame {
    ids: Vec<BodyId>,
    // `null` stands for a non-finite coordinate
    positions: Vec<Option<f64>>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = StreamingError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        let positions = raw
            .positions
            .into_iter()
            .map(|p| p.unwrap_or(f64::NAN))
            .collect();
        Frame::new(raw.ids, positions)
    }
}

impl Frame {
    /// Builds a frame, checking that there are three coordinates per id.
    ///
    /// # Errors
    /// - `StreamingError::InvalidFrame` - `positions.len() != 3 * ids.len()`
    pub fn new(ids: Vec<BodyId>, positions: Vec<f64>) -> Result<Self, StreamingError> {
        if positions.len() != ids.len() * 3 {
            return Err(StreamingError::InvalidFrame {
                reason: format!(
                    "{} positions for {} ids, expected {}",
                    positions.len(),
                    ids.len(),
                    ids.len() * 3
                ),
            });
        }
        Ok(Self::from_snapshot(ids, positions))
    }

    /// Length agreement is guaranteed by the caller.
    pub(crate) fn from_snapshot(ids: Vec<BodyId>, positions: Vec<f64>) -> Self {
        let degenerate = positions.iter().any(|p| !p.is_finite());
        Self {
            ids,
            positions,
            degenerate,
        }
    }

    pub fn ids(&self) -> &[BodyId] {
        &self.ids
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Position of the `index`-th body in this frame.
    pub fn position(&self, index: usize) -> Option<[f64; 3]> {
        let start = index.checked_mul(3)?;
        let end = start.checked_add(3)?;
        let slice = self.positions.get(start..end)?;
        Some([slice[0], slice[1], slice[2]])
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when some coordinate is NaN or infinite.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

/// Serializes an ordered batch to one outbound text message.
///
/// # Errors
/// - `StreamingError::Serialization` - JSON encoding failed
pub fn encode_batch(frames: &[Frame]) -> Result<String, StreamingError> {
    Ok(serde_json::to_string(frames)?)
}

/// Parses a batch produced by [`encode_batch`].
///
/// # Errors
/// - `StreamingError::Serialization` - Malformed JSON or a frame whose
///   position count does not match its ids
pub fn decode_batch(text: &str) -> Result<Vec<Frame>, StreamingError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_wire_shape_for_finite_frame() {
        let frame = Frame::new(vec![1, 2], vec![0.0, 0.0, 0.0, 5.0, -0.03, 0.0]).unwrap();
        let json = encode_batch(std::slice::from_ref(&frame)).unwrap();

        assert_eq!(
            json,
            r#"[{"ids":[1,2],"positions":[0.0,0.0,0.0,5.0,-0.03,0.0]}]"#
        );
    }

    #[test]
    fn test_degenerate_frame_is_flagged_on_the_wire() {
        let frame = Frame::new(vec![1], vec![f64::NAN, 0.0, 0.0]).unwrap();
        assert!(frame.is_degenerate());

        let json = encode_batch(&[frame]).unwrap();
        assert_eq!(json, r#"[{"ids":[1],"positions":[null,0.0,0.0],"degenerate":true}]"#);
    }

    #[test]
    fn test_degenerate_frame_decodes_with_nan() {
        let frame = Frame::new(vec![1, 2], vec![f64::NAN, 0.0, 0.0, 5.0, f64::INFINITY, 0.0]).unwrap();

        let decoded = decode_batch(&encode_batch(&[frame]).unwrap()).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].ids(), &[1, 2]);
        assert!(decoded[0].is_degenerate());
        assert!(decoded[0].positions()[0].is_nan());
        assert!(decoded[0].positions()[4].is_nan());
        assert_eq!(decoded[0].position(1).map(|p| p[0]), Some(5.0));
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        assert!(matches!(
            Frame::new(vec![1, 2], vec![0.0; 5]),
            Err(StreamingError::InvalidFrame { .. })
        ));
        assert!(decode_batch(r#"[{"ids":[1],"positions":[1.0]}]"#).is_err());
    }

    #[test]
    fn test_position_lookup() {
        let frame = Frame::new(vec![1, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        assert_eq!(frame.position(1), Some([4.0, 5.0, 6.0]));
        assert_eq!(frame.position(2), None);
        assert_eq!(frame.position(usize::MAX / 3), None);
        assert_eq!(frame.position(usize::MAX), None);
    }

    #[test]
    fn test_empty_batch_encodes_as_empty_array() {
        assert_eq!(encode_batch(&[]).unwrap(), "[]");
        assert!(decode_batch("[]").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn frames_survive_the_wire(
            bodies in prop::collection::vec(
                (any::<u16>(), -1e12f64..1e12, -1e12f64..1e12, -1e12f64..1e12),
                0..16,
            )
        ) {
            let ids: Vec<BodyId> = bodies.iter().map(|b| b.0).collect();
            let positions: Vec<f64> = bodies.iter().flat_map(|b| [b.1, b.2, b.3]).collect();
            let frame = Frame::new(ids, positions).unwrap();

            let decoded = decode_batch(&encode_batch(std::slice::from_ref(&frame)).unwrap()).unwrap();

            prop_assert_eq!(decoded, vec![frame]);
        }

        #[test]
        fn degenerate_frames_survive_the_wire(
            finite in prop::collection::vec(-1e12f64..1e12, 3..15),
            hole in any::<prop::sample::Index>(),
        ) {
            let count = finite.len() / 3;
            let mut positions = finite[..count * 3].to_vec();
            let hole = hole.index(positions.len());
            positions[hole] = f64::NAN;
            let ids: Vec<BodyId> = (1..=count as BodyId).collect();
            let frame = Frame::new(ids.clone(), positions.clone()).unwrap();

            let decoded = decode_batch(&encode_batch(&[frame]).unwrap()).unwrap();

            prop_assert_eq!(decoded.len(), 1);
            prop_assert!(decoded[0].is_degenerate());
            prop_assert_eq!(decoded[0].ids(), &ids[..]);
            for (i, (got, sent)) in decoded[0].positions().iter().zip(&positions).enumerate() {
                if i == hole {
                    prop_assert!(got.is_nan());
                } else {
                    prop_assert_eq!(got, sent);
                }
            }
        }
    }
}
