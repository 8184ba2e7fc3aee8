//! JSON Stitcher (C5): merges several BGZF-compressed annotated JSON shards
//! into one well-formed stream using the block reader/index from
//! [`crate::bgzf`].

use std::collections::BTreeSet;
use std::io::{Read, Seek, Write};

use crate::bgzf::{BgzfBlockReader, BgzfBlockWriter, SidecarIndex, VirtualOffset};
use crate::err::AppError;

/// One shard to stitch: its JSON stream and companion section index.
pub struct StitchInput<R> {
    pub json: R,
    pub index: SidecarIndex,
}

impl<R> StitchInput<R> {
    pub fn new(json: R, index: SidecarIndex) -> Self {
        Self { json, index }
    }
}

/// Summary counts of a completed stitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchReport {
    pub position_block_count: usize,
    pub total_gene_lines: usize,
    pub unique_gene_line_count: usize,
}

/// Merge `inputs`, in order, into `output`.
///
/// See §4.5: the first input's header block is kept, later inputs' header
/// blocks are dropped, and the trailing `"genes":[...]` sections are
/// deduplicated and re-emitted in lexicographic order.
pub fn stitch<R: Read + Seek, W: Write>(
    inputs: Vec<StitchInput<R>>,
    output: &mut W,
) -> Result<StitchReport, AppError> {
    let mut gene_lines: BTreeSet<String> = BTreeSet::new();
    let mut total_gene_lines = 0usize;
    let mut position_block_count = 0usize;
    let input_count = inputs.len();
    tracing::debug!("stitching {input_count} shard(s)");

    for (i, input) in inputs.into_iter().enumerate() {
        if i > 0 {
            BgzfBlockWriter::new(&mut *output).write_data(b",\n")?;
        }

        let (_positions_begin, positions_end) =
            input.index.section("positions").ok_or_else(|| AppError::BgzfCorrupt {
                offset: 0,
                reason: "shard index has no \"positions\" section".to_string(),
            })?;

        let mut reader = BgzfBlockReader::new(input.json);
        position_block_count += write_position_blocks(&mut reader, positions_end, i == 0, output)?;

        if let Some((genes_begin, _genes_end)) = input.index.section("genes") {
            let (total, lines) = read_gene_lines(&mut reader, genes_begin)?;
            total_gene_lines += total;
            gene_lines.extend(lines);
        } else {
            tracing::debug!("shard {i} of {input_count} has no \"genes\" section");
        }
    }

    tracing::debug!(
        "stitched {position_block_count} position block(s), {} unique gene line(s) of {total_gene_lines} observed",
        gene_lines.len()
    );
    emit_gene_section(output, &gene_lines)?;
    BgzfBlockWriter::new(output).write_eof_marker()?;

    Ok(StitchReport {
        position_block_count,
        total_gene_lines,
        unique_gene_line_count: gene_lines.len(),
    })
}

/// Copy position-section blocks through verbatim: the first file's first
/// (header) block is kept, later files' first blocks are dropped, and
/// copying stops just before the block containing `end`.
fn write_position_blocks<R: Read + Seek, W: Write>(
    reader: &mut BgzfBlockReader<R>,
    end: VirtualOffset,
    is_first_file: bool,
    output: &mut W,
) -> Result<usize, AppError> {
    let mut count = 0;
    let mut block_index = 0usize;
    loop {
        let Some(block) = reader.read_block()? else {
            break;
        };
        if block.start_offset >= end.file_offset() {
            break;
        }
        let is_header_block = block_index == 0;
        block_index += 1;
        if is_header_block && !is_first_file {
            continue;
        }
        output.write_all(block.raw_bytes())?;
        count += 1;
    }
    Ok(count)
}

/// Decompress the gene section starting at `begin`, returning the total
/// number of non-empty lines observed (before dedup) and those lines, each
/// given a trailing comma if it lacked one. Stops at the literal `]}`
/// footer line.
fn read_gene_lines<R: Read + Seek>(
    reader: &mut BgzfBlockReader<R>,
    begin: VirtualOffset,
) -> Result<(usize, Vec<String>), AppError> {
    reader.seek_to_file_offset(begin.file_offset())?;

    let mut carry = String::new();
    let mut total = 0usize;
    let mut lines_out = Vec::new();
    let mut first_block = true;

    'blocks: loop {
        let Some(block) = reader.read_block()? else {
            break;
        };
        if block.is_eof_marker() {
            break;
        }
        let mut decompressed = block.decompress()?;
        if first_block {
            let skip = (begin.within_block_offset() as usize).min(decompressed.len());
            decompressed.drain(0..skip);
            first_block = false;
        }
        carry.push_str(&String::from_utf8_lossy(&decompressed));

        while let Some(pos) = carry.find('\n') {
            let line = carry[..pos].to_string();
            carry.drain(..=pos);
            let trimmed = line.trim_end_matches('\r');
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "]}" {
                break 'blocks;
            }
            total += 1;
            let with_comma = if trimmed.ends_with(',') {
                trimmed.to_string()
            } else {
                format!("{trimmed},")
            };
            lines_out.push(with_comma);
        }
    }

    Ok((total, lines_out))
}

/// Write the deduplicated, lexicographically ordered gene section.
fn emit_gene_section<W: Write>(output: &mut W, gene_lines: &BTreeSet<String>) -> Result<(), AppError> {
    let mut writer = BgzfBlockWriter::new(output);
    if gene_lines.is_empty() {
        writer.write_data(b"]}")?;
        return Ok(());
    }

    writer.write_data(b"\n],\"genes\":[")?;
    let count = gene_lines.len();
    for (i, line) in gene_lines.iter().enumerate() {
        let bytes = if i == count - 1 {
            line.trim_end_matches(',').to_string()
        } else {
            line.clone()
        };
        writer.write_data(bytes.as_bytes())?;
        writer.write_data(b"\n")?;
    }
    writer.write_data(b"]}")?;
    Ok(())
}
