// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing tags for storyboard commands.

use serde::{Deserialize, Serialize};

/// Easing applied across a command's duration.
///
/// Values follow the `.osb` numbering. The coordinator never evaluates
/// easing curves; the tag is carried through fusion unchanged, with the
/// earliest command winning when a merged group disagrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Easing {
    /// Linear (no easing)
    #[default]
    None,
    /// Decelerate
    Out,
    /// Accelerate
    In,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
    InQuint,
    OutQuint,
    InOutQuint,
    InSine,
    OutSine,
    InOutSine,
    InExpo,
    OutExpo,
    InOutExpo,
    InCirc,
    OutCirc,
    InOutCirc,
    InElastic,
    OutElastic,
    OutElasticHalf,
    OutElasticQuarter,
    InOutElastic,
    InBack,
    OutBack,
    InOutBack,
    InBounce,
    OutBounce,
    InOutBounce,
}

impl Easing {
    /// The `.osb` numeric index for this easing
    pub fn osb_index(self) -> u8 {
        self as u8
    }
}
