//! Change tracking for the processing stages.
//!
//! Every preset parameter feeds exactly one [`Stage`]. Setting a parameter
//! marks its stage dirty; a recompute pass drains the flags in the fixed
//! order `Keyword -> Lut -> Blur -> Normal`. Each stage that runs also marks
//! the stages reading its output, looked up in [`CASCADE`]:
//!
//! ```text
//! Keyword -> Lut | Blur | Normal   (kernel variant used by every later stage)
//! Lut     -> Blur | Normal         (blur reads the remapped input)
//! Blur    -> Normal                (normal reads the blurred field)
//! Normal  -> none
//! ```
//!
//! A stage is never re-run because a *later* stage changed, so a pure LUT
//! edit never recomputes the keyword stage.
//!
//! # Example
//!
//! ```rust
//! use normproc_core::{DirtyFlags, Stage};
//!
//! let mut flags = DirtyFlags::NONE;
//! flags |= DirtyFlags::LUT;
//! let plan = flags.drain();
//! assert_eq!(plan.stages(), &[Stage::Lut, Stage::Blur, Stage::Normal]);
//! assert!(flags.is_empty());
//! ```

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Pipeline stage in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Kernel variant selection (tiling, gradient operator).
    Keyword = 0,
    /// Curve lookup table.
    Lut = 1,
    /// LUT remap and Gaussian blur.
    Blur = 2,
    /// Gradient to normal map.
    Normal = 3,
}

impl Stage {
    /// All stages in recompute order.
    pub const ORDER: [Stage; 4] = [Stage::Keyword, Stage::Lut, Stage::Blur, Stage::Normal];

    /// The flag bit for this stage.
    #[inline]
    pub const fn flag(self) -> DirtyFlags {
        DirtyFlags(1 << self as u8)
    }

    /// Stages forced dirty when this stage runs.
    #[inline]
    pub const fn cascade(self) -> DirtyFlags {
        CASCADE[self as usize]
    }

    /// Short lowercase name, used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Lut => "lut",
            Self::Blur => "blur",
            Self::Normal => "normal",
        }
    }
}

/// Bit set over [`Stage`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirtyFlags(u8);

impl DirtyFlags {
    /// Nothing to recompute.
    pub const NONE: DirtyFlags = DirtyFlags(0);
    /// Kernel keywords changed.
    pub const KEYWORD: DirtyFlags = Stage::Keyword.flag();
    /// Response curve changed.
    pub const LUT: DirtyFlags = Stage::Lut.flag();
    /// Smoothness changed.
    pub const BLUR: DirtyFlags = Stage::Blur.flag();
    /// Intensity changed.
    pub const NORMAL: DirtyFlags = Stage::Normal.flag();
    /// Every stage; the initial state.
    pub const ALL: DirtyFlags = DirtyFlags(0b1111);

    /// True when no stage is dirty.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: DirtyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when `stage` is dirty.
    #[inline]
    pub const fn has(self, stage: Stage) -> bool {
        self.contains(stage.flag())
    }

    /// Marks `other` dirty.
    #[inline]
    pub fn insert(&mut self, other: DirtyFlags) {
        self.0 |= other.0;
    }

    /// Dirty stages in recompute order, without cascading.
    pub fn stages(self) -> impl Iterator<Item = Stage> {
        Stage::ORDER.into_iter().filter(move |s| self.has(*s))
    }

    /// Builds the recompute plan and resets the flags to [`DirtyFlags::NONE`].
    pub fn drain(&mut self) -> RecomputePlan {
        let plan = RecomputePlan::from_flags(*self);
        *self = Self::NONE;
        plan
    }
}

/// Cascade lookup table, indexed by `Stage as usize`.
pub const CASCADE: [DirtyFlags; 4] = [
    DirtyFlags(DirtyFlags::LUT.0 | DirtyFlags::BLUR.0 | DirtyFlags::NORMAL.0),
    DirtyFlags(DirtyFlags::BLUR.0 | DirtyFlags::NORMAL.0),
    DirtyFlags::NORMAL,
    DirtyFlags::NONE,
];

impl BitOr for DirtyFlags {
    type Output = DirtyFlags;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        DirtyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirtyFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DirtyFlags {
    type Output = DirtyFlags;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        DirtyFlags(self.0 & rhs.0)
    }
}

impl From<Stage> for DirtyFlags {
    fn from(stage: Stage) -> Self {
        stage.flag()
    }
}

impl std::fmt::Display for DirtyFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<_> = self.stages().map(Stage::name).collect();
        f.write_str(&names.join("|"))
    }
}

/// Ordered list of stages to run for one recompute pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecomputePlan {
    stages: Vec<Stage>,
}

impl RecomputePlan {
    /// Expands `flags` through [`CASCADE`] in stage order.
    pub fn from_flags(flags: DirtyFlags) -> Self {
        let mut pending = flags;
        let mut stages = Vec::with_capacity(Stage::ORDER.len());
        for stage in Stage::ORDER {
            if pending.has(stage) {
                stages.push(stage);
                pending |= stage.cascade();
            }
        }
        Self { stages }
    }

    /// Stages in execution order.
    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// True when nothing needs to run.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// True when `stage` is part of the plan.
    pub fn runs(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

impl IntoIterator for RecomputePlan {
    type Item = Stage;
    type IntoIter = std::vec::IntoIter<Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}
