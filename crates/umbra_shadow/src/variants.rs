//! Shadow quality variants
//!
//! Each group is a set of mutually exclusive shader keywords. A
//! selection enables exactly one keyword of its group, or none.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{CascadeBlendMode, FilterMode, ShadowMaskMode};

const DIRECTIONAL_FILTER_KEYWORDS: &[&str] = &[
    "_DIRECTIONAL_PCF2",
    "_DIRECTIONAL_PCF3",
    "_DIRECTIONAL_PCF5",
    "_DIRECTIONAL_PCF7",
];

const OTHER_FILTER_KEYWORDS: &[&str] = &[
    "_OTHER_PCF2",
    "_OTHER_PCF3",
    "_OTHER_PCF5",
    "_OTHER_PCF7",
];

const CASCADE_BLEND_KEYWORDS: &[&str] = &[
    "_CASCADE_BLEND_HARD",
    "_CASCADE_BLEND_SOFT",
    "_CASCADE_BLEND_DITHER",
];

const SHADOW_MASK_KEYWORDS: &[&str] = &[
    "_SHADOW_MASK_ALWAYS",
    "_SHADOW_MASK_DISTANCE",
];

/// An enum whose variants map one-to-one onto an ordered keyword group
pub trait ShaderVariantGroup: Copy {
    /// Position of this value inside the group
    fn variant_index(self) -> usize;
}

impl ShaderVariantGroup for FilterMode {
    fn variant_index(self) -> usize {
        self.filter_quality_index() as usize
    }
}

impl ShaderVariantGroup for CascadeBlendMode {
    fn variant_index(self) -> usize {
        match self {
            Self::Hard => 0,
            Self::Soft => 1,
            Self::Dither => 2,
        }
    }
}

impl ShaderVariantGroup for ShadowMaskMode {
    fn variant_index(self) -> usize {
        match self {
            Self::Always => 0,
            Self::Distance => 1,
        }
    }
}

/// Exactly-one-of-N keyword selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariantSelection {
    keywords: &'static [&'static str],
    active: Option<usize>,
}

impl VariantSelection {
    /// Select `index` within `keywords`; `None` or an out-of-range index disables all
    pub fn new(keywords: &'static [&'static str], index: Option<usize>) -> Self {
        Self {
            keywords,
            active: index.filter(|&i| i < keywords.len()),
        }
    }

    /// Select from an integer index where `-1` means "none"
    pub fn from_signed(keywords: &'static [&'static str], index: i32) -> Self {
        Self::new(keywords, usize::try_from(index).ok())
    }

    pub fn directional_filter(filter: Option<FilterMode>) -> Self {
        Self::new(DIRECTIONAL_FILTER_KEYWORDS, filter.map(ShaderVariantGroup::variant_index))
    }

    pub fn other_filter(filter: Option<FilterMode>) -> Self {
        Self::new(OTHER_FILTER_KEYWORDS, filter.map(ShaderVariantGroup::variant_index))
    }

    pub fn cascade_blend(mode: Option<CascadeBlendMode>) -> Self {
        Self::new(CASCADE_BLEND_KEYWORDS, mode.map(ShaderVariantGroup::variant_index))
    }

    pub fn shadow_mask(mode: Option<ShadowMaskMode>) -> Self {
        Self::new(SHADOW_MASK_KEYWORDS, mode.map(ShaderVariantGroup::variant_index))
    }

    /// Ordered keyword names of the group
    pub fn keywords(&self) -> &'static [&'static str] {
        self.keywords
    }

    /// Index of the enabled keyword, if any
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.active == Some(index)
    }

    pub fn enabled_keyword(&self) -> Option<&'static str> {
        self.active.map(|i| self.keywords[i])
    }

    /// Every keyword of the group paired with its enabled state
    pub fn states(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.keywords
            .iter()
            .enumerate()
            .map(move |(i, name)| (*name, self.is_enabled(i)))
    }

    /// Preprocessor directive for the enabled keyword
    pub fn directive(&self) -> Option<String> {
        self.enabled_keyword().map(|name| format!("#define {}", name))
    }
}

/// The full set of shadow keyword selections for one frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowVariants {
    pub directional_filter: VariantSelection,
    pub other_filter: VariantSelection,
    pub cascade_blend: VariantSelection,
    pub shadow_mask: VariantSelection,
}

impl Default for ShadowVariants {
    fn default() -> Self {
        Self {
            directional_filter: VariantSelection::directional_filter(None),
            other_filter: VariantSelection::other_filter(None),
            cascade_blend: VariantSelection::cascade_blend(None),
            shadow_mask: VariantSelection::shadow_mask(None),
        }
    }
}

impl ShadowVariants {
    /// All four groups in a fixed order
    pub fn groups(&self) -> [&VariantSelection; 4] {
        [
            &self.directional_filter,
            &self.other_filter,
            &self.cascade_blend,
            &self.shadow_mask,
        ]
    }

    /// Names of every enabled keyword
    pub fn enabled_keywords(&self) -> Vec<&'static str> {
        self.groups()
            .iter()
            .filter_map(|g| g.enabled_keyword())
            .collect()
    }

    /// Shader header enabling the selected keywords
    pub fn generate_header(&self) -> String {
        let mut header = String::new();
        for directive in self.groups().iter().filter_map(|g| g.directive()) {
            header.push_str(&directive);
            header.push('\n');
        }
        header
    }
}
