//! Core variant ingest for a VCF-based annotation pipeline: alt-allele
//! classification and breakend derivation, `FORMAT`/sample column parsing,
//! and BGZF-aware stitching of pre-annotated JSON shards.
//!
//! This crate is deliberately silent on everything around those three
//! engines — chromosome and ref-minor lookups are abstract collaborators
//! ([`chrom::ChromosomeLookup`], [`chrom::RefMinorProvider`]) supplied by
//! the caller, and downstream annotation, HGVS nomenclature, and
//! serialization to the public API are out of scope.

pub mod bgzf;
pub mod chrom;
pub mod err;
pub mod factory;
pub mod info;
pub mod sample;
pub mod stitch;
pub mod variant;

pub use chrom::{Chromosome, ChromosomeLookup, RefMinorProvider};
pub use err::AppError;
pub use factory::build_variants;
pub use info::{parse_info, InfoData, SvType};
pub use sample::{parse_format_indices, parse_sample, parse_samples, FormatIndices, Sample};
pub use stitch::{stitch, StitchInput, StitchReport};
pub use variant::{BreakEnd, Variant, VariantCategory, VariantType};
