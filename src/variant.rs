//! The normalized variant record and its supporting types.

use strum_macros::{Display, EnumString};

use crate::chrom::Chromosome;

/// Internal dispatch tag used by the variant factory to decide which
/// per-category creator builds a given alt allele. Never exposed on the
/// resulting [`Variant`]; see [`VariantType`] for the observable tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum VariantCategory {
    Reference,
    SmallVariant,
    #[strum(serialize = "SV")]
    Sv,
    Cnv,
    RepeatExpansion,
}

/// The observable type of a normalized variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum VariantType {
    #[strum(serialize = "SNV")]
    Snv,
    Insertion,
    Deletion,
    #[strum(serialize = "MNV")]
    Mnv,
    Indel,
    Reference,
    TranslocationBreakend,
    TandemDuplication,
    Duplication,
    Inversion,
    CopyNumberVariation,
    ShortTandemRepeatVariation,
    ComplexStructuralAlteration,
}

/// A single junction of a structural variant: two coordinates and two
/// orientation flags.
///
/// `is_suffix` means "the joined piece continues in the reference-forward
/// direction starting at this coordinate" — the base at `position` is the
/// first base of the adjacent piece.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BreakEnd {
    pub chromosome1: Chromosome,
    pub chromosome2: Chromosome,
    pub position1: i64,
    pub position2: i64,
    pub is_suffix1: bool,
    pub is_suffix2: bool,
}

impl BreakEnd {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chromosome1: Chromosome,
        chromosome2: Chromosome,
        position1: i64,
        position2: i64,
        is_suffix1: bool,
        is_suffix2: bool,
    ) -> Self {
        Self {
            chromosome1,
            chromosome2,
            position1,
            position2,
            is_suffix1,
            is_suffix2,
        }
    }
}

/// A single normalized genomic variant, immutable after construction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Variant {
    pub chromosome: Chromosome,
    /// 1-based, inclusive.
    pub start: i64,
    pub end: i64,
    pub reference_allele: String,
    pub alternate_allele: String,
    pub variant_type: VariantType,
    pub break_ends: Option<Vec<BreakEnd>>,
    /// Set only for `VariantType::Reference` at ref-minor sites.
    pub global_major_allele: Option<String>,
}

impl Variant {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chromosome: Chromosome,
        start: i64,
        end: i64,
        reference_allele: impl Into<String>,
        alternate_allele: impl Into<String>,
        variant_type: VariantType,
    ) -> Self {
        Self {
            chromosome,
            start,
            end,
            reference_allele: reference_allele.into(),
            alternate_allele: alternate_allele.into(),
            variant_type,
            break_ends: None,
            global_major_allele: None,
        }
    }

    pub fn with_break_ends(mut self, break_ends: Vec<BreakEnd>) -> Self {
        self.break_ends = Some(break_ends);
        self
    }

    pub fn with_global_major_allele(mut self, allele: Option<String>) -> Self {
        self.global_major_allele = allele;
        self
    }
}
