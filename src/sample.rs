//! `FORMAT`/per-sample column parsing (C2).
//!
//! This module intentionally does not lean on a generic VCF genotype
//! parser: the whole point of the sample field extractor is to reconcile a
//! handful of mutually exclusive, caller-specific conventions (Strelka
//! tier-1/tier-2 counts, Canvas/Manta `NR`/`NV`, Pisces' per-line `DP`
//! override, …) that a generic library has no reason to know about.

/// Positional index of every recognized `FORMAT` tag within a `FORMAT`
/// descriptor. Absent tags are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatIndices {
    pub gt: Option<usize>,
    pub gq: Option<usize>,
    pub gqx: Option<usize>,
    pub dp: Option<usize>,
    pub dpi: Option<usize>,
    pub dpf: Option<usize>,
    pub ad: Option<usize>,
    pub vf: Option<usize>,
    pub tir: Option<usize>,
    pub tar: Option<usize>,
    pub nr: Option<usize>,
    pub nv: Option<usize>,
    pub au: Option<usize>,
    pub cu: Option<usize>,
    pub gu: Option<usize>,
    pub tu: Option<usize>,
    pub ft: Option<usize>,
    pub pr: Option<usize>,
    pub sr: Option<usize>,
    pub dq: Option<usize>,
    pub cn: Option<usize>,
    pub mcc: Option<usize>,
    pub dst: Option<usize>,
    pub did: Option<usize>,
    pub dcs: Option<usize>,
    pub sch: Option<usize>,
    pub pcn: Option<usize>,
    pub plg: Option<usize>,
    pub mad: Option<usize>,
    pub chc: Option<usize>,
    pub pch: Option<usize>,
}

/// Parse the `FORMAT` column into a [`FormatIndices`]. A null `FORMAT`
/// (`None`) yields all-`None` indices. Unrecognized tags are skipped
/// silently.
pub fn parse_format_indices(format: Option<&str>) -> FormatIndices {
    let mut indices = FormatIndices::default();
    let Some(format) = format else {
        return indices;
    };

    for (pos, tag) in format.split(':').enumerate() {
        match tag {
            "GT" => indices.gt = Some(pos),
            "GQ" => indices.gq = Some(pos),
            "GQX" => indices.gqx = Some(pos),
            "DP" => indices.dp = Some(pos),
            "DPI" => indices.dpi = Some(pos),
            "DPF" => indices.dpf = Some(pos),
            "AD" => indices.ad = Some(pos),
            "VF" => indices.vf = Some(pos),
            "TIR" => indices.tir = Some(pos),
            "TAR" => indices.tar = Some(pos),
            "NR" => indices.nr = Some(pos),
            "NV" => indices.nv = Some(pos),
            "AU" => indices.au = Some(pos),
            "CU" => indices.cu = Some(pos),
            "GU" => indices.gu = Some(pos),
            "TU" => indices.tu = Some(pos),
            "FT" => indices.ft = Some(pos),
            "PR" => indices.pr = Some(pos),
            "SR" => indices.sr = Some(pos),
            "DQ" => indices.dq = Some(pos),
            "CN" => indices.cn = Some(pos),
            "MCC" => indices.mcc = Some(pos),
            "DST" => indices.dst = Some(pos),
            "DID" => indices.did = Some(pos),
            "DCS" => indices.dcs = Some(pos),
            "SCH" => indices.sch = Some(pos),
            "PCN" => indices.pcn = Some(pos),
            "PLG" => indices.plg = Some(pos),
            "MAD" => indices.mad = Some(pos),
            "CHC" => indices.chc = Some(pos),
            "PCH" => indices.pch = Some(pos),
            _ => {
                // unrecognized tag: skipped, not an error
            }
        }
    }

    indices
}

/// A single per-sample record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub is_empty: bool,
    pub genotype: Option<String>,
    pub genotype_quality: Option<i32>,
    pub total_depth: Option<i32>,
    pub allele_depths: Option<Vec<i32>>,
    pub variant_frequency: Option<f64>,
    pub failed_filter: Option<bool>,
    pub paired_end_counts: Option<(i32, i32)>,
    pub split_read_counts: Option<(i32, i32)>,
    pub de_novo_quality: Option<i32>,
    pub copy_number: Option<i32>,
    pub major_chromosome_copy: Option<i32>,
    pub is_loss_of_heterozygosity: bool,
    pub disease_affected_status: Option<String>,
    pub disease_ids: Option<Vec<String>>,
    pub disease_classification_sources: Option<Vec<String>>,
    pub silent_carrier_haplotype: Option<String>,
    pub paralogous_gene_copy_numbers: Option<Vec<i32>>,
    pub paralogous_entrez_gene_ids: Option<Vec<i32>>,
    pub mpileup_allele_depths: Option<Vec<i32>>,
    pub clinical_classification: Option<String>,
    pub paralogous_clinical_classification: Option<String>,
}

impl Sample {
    /// The empty sample: `IsEmpty = true`, every field undefined.
    pub fn empty() -> Self {
        Self {
            is_empty: true,
            ..Default::default()
        }
    }
}

/// Origin of the allele-depth numerator/denominator used to derive
/// `VariantFrequency`; see §4.2.2 for the tie-break policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdSource {
    TarTir,
    NrNv,
    Strelka,
    Ad,
}

/// Raw field lookup: `None` if the tag wasn't in `FORMAT` or the column has
/// fewer cells than the index calls for.
fn raw_field<'a>(idx: Option<usize>, fields: &[&'a str]) -> Option<&'a str> {
    idx.and_then(|i| fields.get(i).copied())
}

/// Field lookup honoring the generic "`.` means undefined" rule.
fn field<'a>(idx: Option<usize>, fields: &[&'a str]) -> Option<&'a str> {
    raw_field(idx, fields).filter(|v| !v.is_empty() && *v != ".")
}

fn parse_tier1(s: &str) -> Option<i32> {
    s.split_once(',').map_or(s, |(tier1, _)| tier1).parse().ok()
}

/// Parse a recognized numeric field, warning when the value is present and
/// non-missing but still fails to parse — that combination suggests a
/// corrupt caller file rather than an expected missing optional field.
fn parse_warn_numeric(tag: &str, raw: &str) -> Option<i32> {
    match raw.parse::<i32>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{tag}={raw:?} is not a valid integer: {e}");
            None
        }
    }
}

fn parse_csv_ints(s: &str) -> Option<Vec<i32>> {
    s.split(',').map(|v| v.parse::<i32>().ok()).collect()
}

fn parse_csv_strings(s: &str) -> Vec<String> {
    s.split(',').map(|v| v.to_string()).collect()
}

fn base_tier1(base: &str, au: Option<i32>, cu: Option<i32>, gu: Option<i32>, tu: Option<i32>) -> Option<i32> {
    match base {
        "A" => au,
        "C" => cu,
        "G" => gu,
        "T" => tu,
        _ => None,
    }
}

fn strelka_tier1s(
    idx: &FormatIndices,
    fields: &[&str],
) -> Option<(Option<i32>, Option<i32>, Option<i32>, Option<i32>)> {
    let au = field(idx.au, fields)?;
    let cu = field(idx.cu, fields)?;
    let gu = field(idx.gu, fields)?;
    let tu = field(idx.tu, fields)?;
    Some((parse_tier1(au), parse_tier1(cu), parse_tier1(gu), parse_tier1(tu)))
}

fn allele_depth_source(
    idx: &FormatIndices,
    fields: &[&str],
    is_single_alt: bool,
    ref_allele: &str,
    alt_allele: &str,
) -> Option<(Vec<i32>, AdSource)> {
    if is_single_alt {
        if let (Some(tar), Some(tir)) = (raw_field(idx.tar, fields), raw_field(idx.tir, fields)) {
            if tar == "." || tir == "." {
                return None;
            }
            return match (parse_tier1(tar), parse_tier1(tir)) {
                (Some(tar1), Some(tir1)) => Some((vec![tar1, tir1], AdSource::TarTir)),
                _ => None,
            };
        }

        if let (Some(nr), Some(nv)) = (raw_field(idx.nr, fields), raw_field(idx.nv, fields)) {
            if nr == "." || nv == "." {
                return None;
            }
            return match (nr.parse::<i32>().ok(), nv.parse::<i32>().ok()) {
                (Some(nr), Some(nv)) => Some((vec![nr - nv, nv], AdSource::NrNv)),
                _ => None,
            };
        }

        if let Some((au, cu, gu, tu)) = strelka_tier1s(idx, fields) {
            let ref_tier1 = base_tier1(ref_allele, au, cu, gu, tu);
            let alt_tier1 = base_tier1(alt_allele, au, cu, gu, tu);
            if let (Some(ref_tier1), Some(alt_tier1)) = (ref_tier1, alt_tier1) {
                return Some((vec![ref_tier1, alt_tier1], AdSource::Strelka));
            }
            // tier-1 cell for the selected base is "." or unrecognized: fall
            // through to AD below.
        }
    }

    field(idx.ad, fields).and_then(parse_csv_ints).map(|ad| (ad, AdSource::Ad))
}

fn total_depth(
    idx: &FormatIndices,
    fields: &[&str],
    is_single_alt: bool,
    dp_override: Option<i32>,
) -> Option<i32> {
    // (a) TAR+TIR is an alt-specific tier-1 pair and is disabled on
    // multi-alt records. (b) the AU/CU/GU/TU tier-1 sum is the same total
    // regardless of how many alts are on the line, so unlike (a) it stays
    // enabled for multi-alt records too.
    if is_single_alt {
        if let (Some(tar), Some(tir)) = (raw_field(idx.tar, fields), raw_field(idx.tir, fields)) {
            if tar == "." || tir == "." {
                return None;
            }
            return match (parse_tier1(tar), parse_tier1(tir)) {
                (Some(tar1), Some(tir1)) => Some(tar1 + tir1),
                _ => None,
            };
        }
    }

    if let (Some(au), Some(cu), Some(gu), Some(tu)) = (
        raw_field(idx.au, fields),
        raw_field(idx.cu, fields),
        raw_field(idx.gu, fields),
        raw_field(idx.tu, fields),
    ) {
        if [au, cu, gu, tu].iter().any(|v| *v == ".") {
            return None;
        }
        return match (parse_tier1(au), parse_tier1(cu), parse_tier1(gu), parse_tier1(tu)) {
            (Some(au), Some(cu), Some(gu), Some(tu)) => Some(au + cu + gu + tu),
            _ => None,
        };
    }

    if let Some(dpi) = raw_field(idx.dpi, fields) {
        return if dpi == "." { None } else { dpi.parse().ok() };
    }
    if let Some(dp) = raw_field(idx.dp, fields) {
        return if dp == "." { None } else { dp.parse().ok() };
    }
    dp_override
}

fn variant_frequency(
    source: Option<AdSource>,
    allele_depths: &Option<Vec<i32>>,
    vf_raw: Option<&str>,
) -> Option<f64> {
    if matches!(source, Some(AdSource::TarTir) | Some(AdSource::NrNv)) {
        if let Some(vf) = vf_raw.and_then(|v| v.parse::<f64>().ok()) {
            return Some(round4(vf.clamp(0.0, 1.0)));
        }
    }

    let ad = allele_depths.as_ref()?;
    if ad.is_empty() {
        return None;
    }
    let denominator: i32 = ad.iter().sum();
    let numerator: i32 = ad.iter().skip(1).sum();
    if denominator == 0 && numerator == 0 {
        return Some(0.0);
    }
    if denominator == 0 {
        return None;
    }
    Some(round4((numerator as f64 / denominator as f64).clamp(0.0, 1.0)))
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Parse a single per-sample column.
///
/// `alt_count` is the number of alt alleles on the call line (drives the
/// single-alt/multi-alt tie-break policy); `ref_allele`/`alt_allele` are
/// used for the Strelka per-base mapping and are only consulted when
/// `alt_count == 1`; `dp_override` is the per-line `DP` fallback used for
/// Pisces-style callers that don't emit a per-sample depth tag at all.
pub fn parse_sample(
    indices: &FormatIndices,
    sample_column: &str,
    alt_count: usize,
    ref_allele: &str,
    alt_allele: &str,
    dp_override: Option<i32>,
) -> Sample {
    if sample_column.is_empty() || sample_column == "." {
        return Sample::empty();
    }

    let fields: Vec<&str> = sample_column.split(':').collect();
    let is_single_alt = alt_count == 1;

    let genotype = raw_field(indices.gt, &fields)
        .filter(|v| *v != ".")
        .map(|v| v.to_string());

    let genotype_quality = field(indices.gqx, &fields)
        .map(|v| ("GQX", v))
        .or_else(|| field(indices.gq, &fields).map(|v| ("GQ", v)))
        .and_then(|(tag, v)| parse_warn_numeric(tag, v));

    let failed_filter = raw_field(indices.ft, &fields).map(|v| v != "PASS" && v != "." && !v.is_empty());

    let (allele_depths, ad_source) = match allele_depth_source(indices, &fields, is_single_alt, ref_allele, alt_allele) {
        Some((depths, source)) => (Some(depths), Some(source)),
        None => (None, None),
    };

    let variant_frequency = variant_frequency(ad_source, &allele_depths, field(indices.vf, &fields));

    let total_depth = total_depth(indices, &fields, is_single_alt, dp_override);

    let paired_end_counts = field(indices.pr, &fields)
        .and_then(parse_csv_ints)
        .filter(|v| v.len() == 2)
        .map(|v| (v[0], v[1]));
    let split_read_counts = field(indices.sr, &fields)
        .and_then(parse_csv_ints)
        .filter(|v| v.len() == 2)
        .map(|v| (v[0], v[1]));

    let de_novo_quality = field(indices.dq, &fields).and_then(|v| parse_warn_numeric("DQ", v));

    let copy_number = field(indices.cn, &fields).and_then(|v| parse_warn_numeric("CN", v));
    let major_chromosome_copy = field(indices.mcc, &fields).and_then(|v| parse_warn_numeric("MCC", v));
    let is_loss_of_heterozygosity = matches!(
        (copy_number, major_chromosome_copy),
        (Some(cn), Some(mcc)) if cn == mcc && cn >= 2
    );

    let disease_affected_status = field(indices.dst, &fields).map(|v| v.to_string());
    let disease_ids = field(indices.did, &fields).map(parse_csv_strings);
    let disease_classification_sources = field(indices.dcs, &fields).map(parse_csv_strings);
    let silent_carrier_haplotype = field(indices.sch, &fields).map(|v| v.to_string());
    let paralogous_gene_copy_numbers = field(indices.pcn, &fields).and_then(parse_csv_ints);
    let paralogous_entrez_gene_ids = field(indices.plg, &fields).and_then(parse_csv_ints);
    let mpileup_allele_depths = field(indices.mad, &fields).and_then(parse_csv_ints);
    let clinical_classification = field(indices.chc, &fields).map(|v| v.to_string());
    let paralogous_clinical_classification = field(indices.pch, &fields).map(|v| v.to_string());

    Sample {
        is_empty: false,
        genotype,
        genotype_quality,
        total_depth,
        allele_depths,
        variant_frequency,
        failed_filter,
        paired_end_counts,
        split_read_counts,
        de_novo_quality,
        copy_number,
        major_chromosome_copy,
        is_loss_of_heterozygosity,
        disease_affected_status,
        disease_ids,
        disease_classification_sources,
        silent_carrier_haplotype,
        paralogous_gene_copy_numbers,
        paralogous_entrez_gene_ids,
        mpileup_allele_depths,
        clinical_classification,
        paralogous_clinical_classification,
    }
}

/// Parse every per-sample column on a call line, in column order.
pub fn parse_samples<'a>(
    indices: &FormatIndices,
    sample_columns: impl IntoIterator<Item = &'a str>,
    alt_count: usize,
    ref_allele: &str,
    alt_allele: &str,
    dp_override: Option<i32>,
) -> Vec<Sample> {
    sample_columns
        .into_iter()
        .map(|col| parse_sample(indices, col, alt_count, ref_allele, alt_allele, dp_override))
        .collect()
}
