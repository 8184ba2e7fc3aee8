//! INFO column decoding (C1).

use strum_macros::{Display, EnumString};

use crate::err::AppError;

/// The structural variant type named by `SVTYPE`, if recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SvType {
    #[strum(serialize = "DEL")]
    Del,
    #[strum(serialize = "DUP")]
    Dup,
    #[strum(serialize = "TDUP")]
    Tdup,
    #[strum(serialize = "INV")]
    Inv,
    #[strum(serialize = "INS")]
    Ins,
    #[strum(serialize = "CNV")]
    Cnv,
    #[strum(serialize = "BND")]
    Bnd,
    #[strum(serialize = "STR")]
    Str,
}

/// Decoded `INFO` column: SV type, END coordinate, inversion orientation
/// flags, and copy-number hints. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoData {
    pub sv_type: Option<SvType>,
    pub end: Option<i64>,
    pub is_inv3: bool,
    pub is_inv5: bool,
}

/// Parse the `INFO` column (`;`-delimited `key=value` pairs or bare flags)
/// into an [`InfoData`].
///
/// Recognizes `SVTYPE`, `END`, `INV3`, `INV5`; every other key is ignored.
/// A malformed `END` value (non-integer) fails with
/// [`AppError::InfoParse`]; an unrecognized `SVTYPE` value is likewise
/// ignored rather than treated as an error, since the spec only asks us to
/// reject malformed *numeric* values.
pub fn parse_info(info: &str) -> Result<InfoData, AppError> {
    let mut data = InfoData::default();

    if info.is_empty() || info == "." {
        return Ok(data);
    }

    for field in info.split(';') {
        if field.is_empty() {
            continue;
        }
        match field.split_once('=') {
            Some(("SVTYPE", value)) => {
                data.sv_type = value.parse::<SvType>().ok();
            }
            Some(("END", value)) => {
                data.end = Some(value.parse::<i64>().map_err(|e| AppError::InfoParse {
                    key: "END".to_string(),
                    value: value.to_string(),
                    reason: e.to_string(),
                })?);
            }
            Some((_key, _value)) => {
                // unknown key=value pair: pass through silently
            }
            None => match field {
                "INV3" => data.is_inv3 = true,
                "INV5" => data.is_inv5 = true,
                _ => {
                    // unknown flag: pass through silently
                }
            },
        }
    }

    Ok(data)
}
