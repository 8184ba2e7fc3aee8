//! Variant classification and construction (C3).
//!
//! The factory never touches storage: it consumes a [`ChromosomeLookup`]
//! and a [`RefMinorProvider`] as abstract, read-only collaborators and
//! returns plain [`Variant`] values.

use lazy_static::lazy_static;
use regex::Regex;

use crate::chrom::{Chromosome, ChromosomeLookup, RefMinorProvider};
use crate::err::AppError;
use crate::info::{InfoData, SvType};
use crate::variant::{BreakEnd, Variant, VariantCategory, VariantType};

/// Alts that carry no information of their own and are skipped when
/// constructing non-`Reference` variants.
const NON_INFORMATIVE_ALTS: &[&str] = &["*", "<NON_REF>", "<*>"];

fn is_non_informative(alt: &str) -> bool {
    NON_INFORMATIVE_ALTS.contains(&alt)
}

fn is_symbolic(alt: &str) -> bool {
    alt.starts_with('<') && alt.ends_with('>')
}

/// Classify a call line's alt alleles into a single shared [`VariantCategory`].
///
/// The first matching rule (in the order given in §4.3.1) wins; all alts on
/// one line share the resulting category.
pub fn classify(alts: &[&str]) -> VariantCategory {
    if alts.len() == 1 && (alts[0] == "." || alts[0] == "<NON_REF>") {
        return VariantCategory::Reference;
    }
    if alts.iter().any(|a| a.contains('[') || a.contains(']')) {
        return VariantCategory::Sv;
    }
    if !alts
        .iter()
        .filter(|a| !is_non_informative(a))
        .any(|a| is_symbolic(a))
    {
        return VariantCategory::SmallVariant;
    }
    if alts.iter().any(|a| a.starts_with("<STR")) {
        return VariantCategory::RepeatExpansion;
    }
    if alts.iter().any(|a| a.starts_with("<CN")) {
        return VariantCategory::Cnv;
    }
    VariantCategory::Sv
}

/// Derive the small-variant [`VariantType`] from the ref/alt allele lengths,
/// after stripping the single shared leading base VCF's indel-anchoring
/// convention requires (e.g. `ref=AT,alt=A` anchors on the shared `A`).
fn small_variant_type(reference_allele: &str, alternate_allele: &str) -> VariantType {
    let shares_leading_base = reference_allele.as_bytes().first().is_some()
        && reference_allele.as_bytes().first() == alternate_allele.as_bytes().first();
    let (r, a) = if shares_leading_base {
        (&reference_allele[1..], &alternate_allele[1..])
    } else {
        (reference_allele, alternate_allele)
    };
    match (r.len(), a.len()) {
        (rl, al) if rl == al => {
            if rl == 1 {
                VariantType::Snv
            } else {
                VariantType::Mnv
            }
        }
        (0, _) => VariantType::Insertion,
        (_, 0) => VariantType::Deletion,
        _ => VariantType::Indel,
    }
}

/// Breakend pair derivation for a symbolic SV type, per the §4.3.2 table.
/// Returns `None` for unrecognized SV types, for which breakends are
/// omitted entirely.
fn symbolic_breakends(
    chromosome: &Chromosome,
    start: i64,
    end: i64,
    sv_type: SvType,
    is_inv3: bool,
    is_inv5: bool,
) -> Option<Vec<BreakEnd>> {
    let c = chromosome.clone();
    match sv_type {
        SvType::Del => Some(vec![
            BreakEnd::new(c.clone(), c.clone(), start, end + 1, false, true),
            BreakEnd::new(c.clone(), c, end + 1, start, true, false),
        ]),
        SvType::Dup | SvType::Tdup => Some(vec![
            BreakEnd::new(c.clone(), c.clone(), end, start, false, true),
            BreakEnd::new(c.clone(), c, start, end, true, false),
        ]),
        SvType::Inv if is_inv3 => Some(vec![
            BreakEnd::new(c.clone(), c.clone(), start, end, false, false),
            BreakEnd::new(c.clone(), c, end, start, false, false),
        ]),
        SvType::Inv if is_inv5 => Some(vec![
            BreakEnd::new(c.clone(), c.clone(), start + 1, end + 1, true, true),
            BreakEnd::new(c.clone(), c, end + 1, start + 1, true, true),
        ]),
        SvType::Inv => Some(vec![
            BreakEnd::new(c.clone(), c.clone(), start, end, false, false),
            BreakEnd::new(c.clone(), c, end + 1, start + 1, true, true),
        ]),
        _ => None,
    }
}

lazy_static! {
    /// `<seq>[CHR:POS[` or `<seq>]CHR:POS]`.
    static ref RE_BND_FORWARD: Regex =
        Regex::new(r"^\w+([\[\]])([^:]+):(\d+)([\[\]])$").expect("invalid regex in source code");
    /// `[CHR:POS[<seq>` or `]CHR:POS]<seq>`.
    static ref RE_BND_REVERSE: Regex =
        Regex::new(r"^([\[\]])([^:]+):(\d+)([\[\]])\w+$").expect("invalid regex in source code");
}

/// Parse an explicit breakend alt allele (one that contains `[` or `]`)
/// into a single [`BreakEnd`], per §4.3.3.
///
/// `chromosome1`/`position1` are the call line's own chromosome/position;
/// `chromosome2` is resolved through `lookup`.
pub fn parse_breakend_allele(
    reference_allele: &str,
    alternate_allele: &str,
    chromosome1: Chromosome,
    position1: i64,
    lookup: &dyn ChromosomeLookup,
) -> Result<BreakEnd, AppError> {
    // The ref-prefix test picks which grammar to try first, but either
    // shape is accepted regardless: some callers emit one form even when
    // the naive prefix test doesn't hold.
    let try_forward = |alt: &str| -> Option<BreakEnd> {
        let caps = RE_BND_FORWARD.captures(alt)?;
        let position2 = caps[3].parse::<i64>().ok()?;
        Some(BreakEnd::new(
            chromosome1.clone(),
            lookup.lookup(&caps[2]),
            position1,
            position2,
            false,
            &caps[4] == "[",
        ))
    };
    let try_reverse = |alt: &str| -> Option<BreakEnd> {
        let caps = RE_BND_REVERSE.captures(alt)?;
        let position2 = caps[3].parse::<i64>().ok()?;
        Some(BreakEnd::new(
            chromosome1.clone(),
            lookup.lookup(&caps[2]),
            position1,
            position2,
            true,
            &caps[1] == "[",
        ))
    };

    let result = if alternate_allele.starts_with(reference_allele) {
        try_forward(alternate_allele).or_else(|| try_reverse(alternate_allele))
    } else {
        try_reverse(alternate_allele).or_else(|| try_forward(alternate_allele))
    };

    result.ok_or_else(|| AppError::BreakendParse {
        allele: alternate_allele.to_string(),
    })
}

/// Construct the normalized variants for a single call line's alt allele
/// array. Returns `None` ("undefined", not an empty vec) if every alt is
/// non-informative.
#[allow(clippy::too_many_arguments)]
pub fn build_variants(
    chromosome_name: &str,
    start: i64,
    reference_allele: &str,
    alts: &[&str],
    info: &InfoData,
    lookup: &dyn ChromosomeLookup,
    ref_minor: &dyn RefMinorProvider,
) -> Result<Option<Vec<Variant>>, AppError> {
    let chromosome = lookup.lookup(chromosome_name);
    let category = classify(alts);

    if category == VariantCategory::Reference {
        let global_major_allele = ref_minor.global_major_allele(&chromosome, start);
        let variant = Variant::new(
            chromosome,
            start,
            start,
            reference_allele,
            alts[0],
            VariantType::Reference,
        )
        .with_global_major_allele(global_major_allele);
        return Ok(Some(vec![variant]));
    }

    let mut variants = Vec::new();
    for &alt in alts {
        if is_non_informative(alt) {
            continue;
        }

        let variant = match category {
            VariantCategory::SmallVariant => {
                let variant_type = small_variant_type(reference_allele, alt);
                let end = start + reference_allele.len() as i64 - 1;
                Variant::new(chromosome.clone(), start, end, reference_allele, alt, variant_type)
            }
            VariantCategory::Sv if alt.contains('[') || alt.contains(']') => {
                let break_end =
                    parse_breakend_allele(reference_allele, alt, chromosome.clone(), start, lookup)?;
                Variant::new(
                    chromosome.clone(),
                    start,
                    start,
                    reference_allele,
                    alt,
                    VariantType::TranslocationBreakend,
                )
                .with_break_ends(vec![break_end])
            }
            VariantCategory::Sv => {
                let variant_type = match info.sv_type {
                    Some(SvType::Inv) => VariantType::Inversion,
                    Some(SvType::Dup) => VariantType::Duplication,
                    Some(SvType::Tdup) => VariantType::TandemDuplication,
                    Some(SvType::Del) => VariantType::Deletion,
                    Some(SvType::Ins) => VariantType::Insertion,
                    // Recognized-but-uncategorized SVTYPE, or none at all
                    // (e.g. a bare symbolic alt with no SVTYPE key): the
                    // symbolic breakend table has no entry either way, so
                    // breakends are simply omitted below.
                    _ => VariantType::ComplexStructuralAlteration,
                };
                let mut variant =
                    Variant::new(chromosome.clone(), start, info.end.unwrap_or(start), reference_allele, alt, variant_type);
                if let Some(end) = info.end {
                    if let Some(sv_type) = info.sv_type {
                        if let Some(break_ends) =
                            symbolic_breakends(&chromosome, start, end, sv_type, info.is_inv3, info.is_inv5)
                        {
                            variant = variant.with_break_ends(break_ends);
                        }
                    }
                }
                variant
            }
            VariantCategory::Cnv => Variant::new(
                chromosome.clone(),
                start,
                info.end.unwrap_or(start),
                reference_allele,
                alt,
                VariantType::CopyNumberVariation,
            ),
            VariantCategory::RepeatExpansion => Variant::new(
                chromosome.clone(),
                start,
                info.end.unwrap_or(start),
                reference_allele,
                alt,
                VariantType::ShortTandemRepeatVariation,
            ),
            VariantCategory::Reference => unreachable!("handled above"),
        };
        variants.push(variant);
    }

    if variants.is_empty() {
        Ok(None)
    } else {
        Ok(Some(variants))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chrom::{InMemoryChromosomeLookup, InMemoryRefMinorProvider};
    use crate::info::parse_info;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn lookup() -> InMemoryChromosomeLookup {
        InMemoryChromosomeLookup::canonical_grch37()
    }

    #[test]
    fn reference_category_single_dot_alt() {
        assert_eq!(classify(&["."]), VariantCategory::Reference);
        assert_eq!(classify(&["<NON_REF>"]), VariantCategory::Reference);
    }

    #[test]
    fn small_variant_category() {
        assert_eq!(classify(&["G"]), VariantCategory::SmallVariant);
        assert_eq!(classify(&["G", "<NON_REF>"]), VariantCategory::SmallVariant);
    }

    #[test]
    fn mixed_literal_and_symbolic_sv_alt_is_sv_not_small_variant() {
        // A literal sequence alt sharing a line with a genuine symbolic SV
        // tag must not make the whole line SmallVariant: rule 3 requires
        // *every* remaining alt to be non-symbolic.
        assert_eq!(classify(&["T", "<DEL>"]), VariantCategory::Sv);
        assert_eq!(classify(&["<DEL>", "T"]), VariantCategory::Sv);
    }

    #[test]
    fn explicit_breakend_wins_over_symbolic() {
        assert_eq!(classify(&["A[chr3:500["]), VariantCategory::Sv);
    }

    #[test]
    fn repeat_expansion_and_cnv_categories() {
        assert_eq!(classify(&["<STR123>"]), VariantCategory::RepeatExpansion);
        assert_eq!(classify(&["<CNV>"]), VariantCategory::Cnv);
        assert_eq!(classify(&["<DUP>"]), VariantCategory::Sv);
    }

    #[test]
    fn category_is_stable_under_alt_permutation() {
        assert_eq!(classify(&["G", "T"]), classify(&["T", "G"]));
        assert_eq!(classify(&["<DEL>", "<DUP>"]), classify(&["<DUP>", "<DEL>"]));
    }

    #[test]
    fn scenario_1_small_variant() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info(".").unwrap();
        let variants = build_variants("chr1", 100, "A", &["G"], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].variant_type, VariantType::Snv);
        assert_eq!(variants[0].start, 100);
        assert_eq!(variants[0].reference_allele, "A");
        assert_eq!(variants[0].alternate_allele, "G");
    }

    #[rstest]
    #[case("A", "G", VariantType::Snv)]
    #[case("AT", "AC", VariantType::Snv)]
    #[case("GG", "CC", VariantType::Mnv)]
    #[case("AGG", "ACC", VariantType::Mnv)]
    #[case("A", "AT", VariantType::Insertion)]
    #[case("AT", "A", VariantType::Deletion)]
    #[case("ATCG", "A", VariantType::Deletion)]
    #[case("ATG", "ATCC", VariantType::Indel)]
    fn small_variant_type_policy(#[case] reference: &str, #[case] alt: &str, #[case] expected: VariantType) {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info(".").unwrap();
        let variants = build_variants("chr1", 100, reference, &[alt], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants[0].variant_type, expected);
    }

    #[test]
    fn symbolic_insertion_svtype_maps_to_insertion_variant_type() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info("SVTYPE=INS;END=1001").unwrap();
        let variants = build_variants("chr1", 1000, "N", &["<INS>"], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants[0].variant_type, VariantType::Insertion);
        // INS has no entry in the symbolic breakend table.
        assert!(variants[0].break_ends.is_none());
    }

    #[test]
    fn scenario_2_deletion_breakends() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info("SVTYPE=DEL;END=2000").unwrap();
        let variants = build_variants("chr1", 1000, "N", &["<DEL>"], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants.len(), 1);
        let bes = variants[0].break_ends.as_ref().unwrap();
        assert_eq!(bes.len(), 2);
        assert_eq!(bes[0].position1, 1000);
        assert_eq!(bes[0].position2, 2001);
        assert!(!bes[0].is_suffix1);
        assert!(bes[0].is_suffix2);
        assert_eq!(bes[1].position1, 2001);
        assert_eq!(bes[1].position2, 1000);
        assert!(bes[1].is_suffix1);
        assert!(!bes[1].is_suffix2);
    }

    #[test]
    fn scenario_3_inversion_inv3() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info("SVTYPE=INV;END=2000;INV3").unwrap();
        let variants = build_variants("chr1", 1000, "N", &["<INV>"], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        let bes = variants[0].break_ends.as_ref().unwrap();
        assert_eq!(bes[0].position1, 1000);
        assert_eq!(bes[0].position2, 2000);
        assert!(!bes[0].is_suffix1 && !bes[0].is_suffix2);
        assert_eq!(bes[1].position1, 2000);
        assert_eq!(bes[1].position2, 1000);
        assert!(!bes[1].is_suffix1 && !bes[1].is_suffix2);
    }

    #[test]
    fn missing_end_omits_breakends() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info("SVTYPE=DEL").unwrap();
        let variants = build_variants("chr1", 1000, "N", &["<DEL>"], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert!(variants[0].break_ends.is_none());
    }

    #[test]
    fn symbolic_sv_without_svtype_is_complex_alteration_not_fatal() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info("END=2000").unwrap();
        let variants = build_variants("chr1", 1000, "N", &["<DUP>"], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants[0].variant_type, VariantType::ComplexStructuralAlteration);
        assert!(variants[0].break_ends.is_none());
    }

    #[test]
    fn scenario_4_breakend_forward() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info(".").unwrap();
        let variants = build_variants("chr1", 500, "A", &["A[chr3:500["], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].variant_type, VariantType::TranslocationBreakend);
        let bes = variants[0].break_ends.as_ref().unwrap();
        assert_eq!(bes.len(), 1);
        assert_eq!(bes[0].chromosome2.ensembl_name(), "3");
        assert_eq!(bes[0].position2, 500);
        assert!(!bes[0].is_suffix1);
        assert!(bes[0].is_suffix2);
    }

    #[test]
    fn breakend_reverse_form() {
        let lookup = lookup();
        let chrom1 = lookup.lookup("chr1");
        let be = parse_breakend_allele("A", "]chr3:500]A", chrom1, 700, &lookup).unwrap();
        assert!(be.is_suffix1);
        assert!(!be.is_suffix2);
        assert_eq!(be.position2, 500);
    }

    #[test]
    fn non_matching_breakend_allele_is_an_error() {
        let lookup = lookup();
        let chrom1 = lookup.lookup("chr1");
        let err = parse_breakend_allele("A", "A[garbage", chrom1, 700, &lookup).unwrap_err();
        assert!(matches!(err, AppError::BreakendParse { allele } if allele == "A[garbage"));
    }

    #[test]
    fn reference_variant_carries_global_major_allele() {
        let lookup = lookup();
        let mut ref_minor = InMemoryRefMinorProvider::new();
        let chrom = lookup.lookup("chr1");
        ref_minor.insert(&chrom, 100, "G");
        let info = parse_info(".").unwrap();
        let variants = build_variants("chr1", 100, "A", &["."], &info, &lookup, &ref_minor)
            .unwrap()
            .unwrap();
        assert_eq!(variants[0].variant_type, VariantType::Reference);
        assert_eq!(variants[0].global_major_allele.as_deref(), Some("G"));
    }

    #[test]
    fn all_non_informative_alts_yield_no_variants() {
        let lookup = lookup();
        let ref_minor = InMemoryRefMinorProvider::new();
        let info = parse_info("SVTYPE=DEL;END=2000").unwrap();
        let variants = build_variants("chr1", 1000, "N", &["*"], &info, &lookup, &ref_minor).unwrap();
        assert_eq!(variants, None);
    }
}
