//! Keyframe resolution
//!
//! Decides which frames must be decoded, in order, to show a target frame
//! given the frame currently materialized. No I/O happens here.

use smallvec::SmallVec;
use vol_format::FrameIndex;

/// Ordered frames to decode; the last entry is the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePlan(SmallVec<[u32; 2]>);

impl DecodePlan {
    fn single(target: u32) -> Self {
        Self(smallvec::smallvec![target])
    }

    fn via_keyframe(keyframe: u32, target: u32) -> Self {
        Self(smallvec::smallvec![keyframe, target])
    }

    pub fn frames(&self) -> &[u32] {
        &self.0
    }

    pub fn target(&self) -> u32 {
        // Plans are never empty
        self.0[self.0.len() - 1]
    }

    /// Keyframe decoded ahead of the target to rebuild the baseline
    pub fn keyframe(&self) -> Option<u32> {
        (self.0.len() == 2).then(|| self.0[0])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a DecodePlan {
    type Item = &'a u32;
    type IntoIter = std::slice::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Why a frame could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("frame {target} is beyond the {frame_count} indexed frames")]
    OutOfRange { target: u32, frame_count: u32 },

    #[error("no keyframe at or before frame {0}")]
    NoKeyframe(u32),
}

/// Resolve the frames needed to reach `target` from `current_loaded` (-1 when nothing is decoded).
///
/// Callers skip the call entirely when `target == current_loaded`.
pub fn resolve(
    current_loaded: i64,
    target: u32,
    index: &FrameIndex,
) -> Result<DecodePlan, ResolveError> {
    if target as usize >= index.len() {
        return Err(ResolveError::OutOfRange {
            target,
            frame_count: index.len() as u32,
        });
    }
    let keyframe = index
        .nearest_keyframe(target)
        .ok_or(ResolveError::NoKeyframe(target))?;

    if current_loaded < keyframe as i64 && !index.is_keyframe(target) {
        Ok(DecodePlan::via_keyframe(keyframe, target))
    } else {
        Ok(DecodePlan::single(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vol_format::{FrameIndexEntry, KeyframeKind};

    fn index(count: u32, keyframes: &[u32]) -> FrameIndex {
        FrameIndex::from_entries((0..count).map(|i| {
            let is_keyframe = keyframes.contains(&i);
            FrameIndexEntry {
                frame_index: i,
                is_keyframe,
                kind: if is_keyframe {
                    KeyframeKind::Keyframe
                } else {
                    KeyframeKind::Tracked
                },
                byte_offset: 0,
                byte_length: 13,
                mesh_data_size: 0,
            }
        }))
    }

    #[test]
    fn test_fresh_stream_to_delta_decodes_keyframe_first() {
        let idx = index(10, &[0, 5]);
        let plan = resolve(-1, 7, &idx).unwrap();
        assert_eq!(plan.frames(), &[5, 7]);
        assert_eq!(plan.keyframe(), Some(5));
        assert_eq!(plan.target(), 7);
    }

    #[test]
    fn test_keyframe_target_stands_alone() {
        let idx = index(10, &[0, 5]);
        assert_eq!(resolve(-1, 5, &idx).unwrap().frames(), &[5]);
        assert_eq!(resolve(-1, 0, &idx).unwrap().frames(), &[0]);
        assert_eq!(resolve(2, 5, &idx).unwrap().frames(), &[5]);
    }

    #[test]
    fn test_incremental_within_segment() {
        let idx = index(10, &[0, 5]);
        assert_eq!(resolve(6, 7, &idx).unwrap().frames(), &[7]);
        assert_eq!(resolve(5, 9, &idx).unwrap().frames(), &[9]);
        assert_eq!(resolve(0, 3, &idx).unwrap().frames(), &[3]);
    }

    #[test]
    fn test_crossing_a_keyframe() {
        let idx = index(10, &[0, 5]);
        let plan = resolve(3, 7, &idx).unwrap();
        assert_eq!(plan.frames(), &[5, 7]);
    }

    #[test]
    fn test_backward_seek_uses_same_rule() {
        let idx = index(10, &[0, 5]);
        // Still at or past the target's keyframe: continue from what is loaded
        assert_eq!(resolve(8, 6, &idx).unwrap().frames(), &[6]);
        assert_eq!(resolve(8, 2, &idx).unwrap().frames(), &[2]);
        assert_eq!(resolve(8, 5, &idx).unwrap().frames(), &[5]);
    }

    #[test]
    fn test_out_of_range() {
        let idx = index(4, &[0]);
        assert_eq!(
            resolve(-1, 4, &idx),
            Err(ResolveError::OutOfRange {
                target: 4,
                frame_count: 4
            })
        );
    }

    #[test]
    fn test_missing_keyframe() {
        let idx = index(4, &[2]);
        assert_eq!(resolve(-1, 1, &idx), Err(ResolveError::NoKeyframe(1)));
    }

    #[test]
    fn test_fresh_resolution_always_leads_with_nearest_keyframe() {
        let layouts: [&[u32]; 4] = [&[0], &[0, 5], &[0, 1, 2, 3], &[0, 3, 4, 11]];
        for keyframes in layouts {
            let idx = index(16, keyframes);
            for target in 0..16 {
                let plan = resolve(-1, target, &idx).unwrap();
                let nearest = idx.nearest_keyframe(target).unwrap();
                if idx.is_keyframe(target) {
                    assert_eq!(plan.frames(), &[target]);
                } else {
                    assert_eq!(plan.frames(), &[nearest, target]);
                    assert!(nearest < target);
                }
            }
        }
    }
}
