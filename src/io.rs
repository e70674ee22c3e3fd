//! I/O adapters around the core: pedigree parsing and writing, gzip-or-plain
//! file handling, and the JSON result stream.
//!
//! JSON cannot represent non-finite floats, so the result stream renders
//! NaN as the literal string `"NaN"` and either infinity as `"Infinity"`,
//! and parses both back. The sum type [`JsonFloat`] confines that
//! convention to the serialization boundary; everything in the core works
//! with plain `f64`.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::warn;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::types::{Family, PedigreeRecord, Sex, TdtResult};

// ---------------------------------------------------------------------------
// Pedigree parsing
// ---------------------------------------------------------------------------

/// A malformed pedigree line, independent of its position in the file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PedRecordError {
    #[error("expected at least 6 whitespace-separated fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} value '{value}'")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum PedParseError {
    #[error("pedigree line {line}: {source}")]
    Record {
        line: usize,
        source: PedRecordError,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// True for lines the parser skips outright: empty lines and `#` comments.
pub fn should_skip_ped_line(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Parses one six-field pedigree line: family ID, individual ID, paternal
/// ID, maternal ID, sex code, phenotype. Fields beyond the sixth are
/// ignored.
pub fn parse_ped_record(line: &str) -> Result<PedigreeRecord, PedRecordError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(PedRecordError::FieldCount(fields.len()));
    }
    let sex_code: i64 = fields[4].parse().map_err(|_| PedRecordError::InvalidField {
        field: "sex",
        value: fields[4].to_string(),
    })?;
    let phenotype: i64 = fields[5].parse().map_err(|_| PedRecordError::InvalidField {
        field: "phenotype",
        value: fields[5].to_string(),
    })?;
    Ok(PedigreeRecord {
        family_id: fields[0].to_string(),
        individual_id: fields[1].to_string(),
        paternal_id: fields[2].to_string(),
        maternal_id: fields[3].to_string(),
        sex: Sex::from_code(sex_code),
        phenotype,
    })
}

/// Strict parse: the first malformed line aborts with its line number.
pub fn parse_ped<R: BufRead>(reader: R) -> Result<Vec<PedigreeRecord>, PedParseError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if should_skip_ped_line(&line) {
            continue;
        }
        let record = parse_ped_record(&line).map_err(|source| PedParseError::Record {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Safe parse: malformed lines are logged and dropped instead of aborting
/// the whole file. Only I/O failures are fatal.
pub fn parse_ped_safe<R: BufRead>(reader: R) -> io::Result<Vec<PedigreeRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if should_skip_ped_line(&line) {
            continue;
        }
        match parse_ped_record(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!("dropping pedigree line {}: {e}", index + 1),
        }
    }
    Ok(records)
}

/// Writes records back out as tab-separated six-field lines.
pub fn write_ped<W: Write>(writer: &mut W, records: &[PedigreeRecord]) -> io::Result<()> {
    for record in records {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.family_id,
            record.individual_id,
            record.paternal_id,
            record.maternal_id,
            record.sex.code(),
            record.phenotype,
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Gzip-or-plain file handling
// ---------------------------------------------------------------------------

/// Opens a file for buffered reading, transparently decompressing when the
/// path ends in `.gz`.
pub fn open_maybe_gz(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Creates a file for buffered writing, gzip-compressing when the path ends
/// in `.gz`. The gzip trailer is written when the writer is dropped.
pub fn create_maybe_gz(path: &Path) -> io::Result<Box<dyn Write>> {
    let file = File::create(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

// ---------------------------------------------------------------------------
// JSON result stream
// ---------------------------------------------------------------------------

/// A float at the JSON boundary: finite values serialize as numbers,
/// non-finite ones as the marker strings `"NaN"` and `"Infinity"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonFloat {
    Finite(f64),
    NaN,
    Infinity,
}

impl From<f64> for JsonFloat {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            JsonFloat::NaN
        } else if value.is_infinite() {
            JsonFloat::Infinity
        } else {
            JsonFloat::Finite(value)
        }
    }
}

impl From<JsonFloat> for f64 {
    fn from(value: JsonFloat) -> f64 {
        match value {
            JsonFloat::Finite(v) => v,
            JsonFloat::NaN => f64::NAN,
            JsonFloat::Infinity => f64::INFINITY,
        }
    }
}

impl Serialize for JsonFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonFloat::Finite(v) => serializer.serialize_f64(*v),
            JsonFloat::NaN => serializer.serialize_str("NaN"),
            JsonFloat::Infinity => serializer.serialize_str("Infinity"),
        }
    }
}

struct JsonFloatVisitor;

impl Visitor<'_> for JsonFloatVisitor {
    type Value = JsonFloat;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number, \"NaN\", or \"Infinity\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<JsonFloat, E> {
        Ok(JsonFloat::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<JsonFloat, E> {
        Ok(JsonFloat::from(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<JsonFloat, E> {
        Ok(JsonFloat::from(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<JsonFloat, E> {
        match v {
            "NaN" => Ok(JsonFloat::NaN),
            "Infinity" => Ok(JsonFloat::Infinity),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for JsonFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(JsonFloatVisitor)
    }
}

/// The wire shape of a [`TdtResult`]. Field names match the historical
/// output format so existing background-result files keep parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdtResultJson {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TotalMales")]
    pub total_males: JsonFloat,
    #[serde(rename = "TotalFemales")]
    pub total_females: JsonFloat,
    #[serde(rename = "Nfamilies")]
    pub n_families: JsonFloat,
    #[serde(rename = "MaleProportion")]
    pub male_proportion: JsonFloat,
    #[serde(rename = "MeanMalesPerFam")]
    pub mean_males_per_fam: JsonFloat,
    #[serde(rename = "MeanFemalesPerFam")]
    pub mean_females_per_fam: JsonFloat,
    #[serde(rename = "MeanChildrenPerFam")]
    pub mean_children_per_fam: JsonFloat,
    #[serde(rename = "Chisq")]
    pub chi_squared: JsonFloat,
    #[serde(rename = "P")]
    pub p_value: JsonFloat,
    #[serde(rename = "Orphan")]
    pub orphan: bool,
}

impl From<&TdtResult> for TdtResultJson {
    fn from(result: &TdtResult) -> Self {
        TdtResultJson {
            name: result.name.clone(),
            total_males: result.totals.male_offspring.into(),
            total_females: result.totals.female_offspring.into(),
            n_families: result.family_count.into(),
            male_proportion: result.male_proportion.into(),
            mean_males_per_fam: result.mean_males_per_family.into(),
            mean_females_per_fam: result.mean_females_per_family.into(),
            mean_children_per_fam: result.mean_children_per_family.into(),
            chi_squared: result.chi_squared.into(),
            p_value: result.p_value.into(),
            orphan: result.orphan,
        }
    }
}

impl From<TdtResultJson> for TdtResult {
    fn from(json: TdtResultJson) -> Self {
        TdtResult {
            name: json.name,
            totals: Family::new(json.total_males.into(), json.total_females.into()),
            family_count: json.n_families.into(),
            male_proportion: json.male_proportion.into(),
            mean_males_per_family: json.mean_males_per_fam.into(),
            mean_females_per_family: json.mean_females_per_fam.into(),
            mean_children_per_family: json.mean_children_per_fam.into(),
            chi_squared: json.chi_squared.into(),
            p_value: json.p_value.into(),
            orphan: json.orphan,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResultIoError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("result stream: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads a newline-delimited stream of JSON result objects.
pub fn read_results<R: Read>(reader: R) -> Result<Vec<TdtResult>, ResultIoError> {
    let mut results = Vec::new();
    for json in serde_json::Deserializer::from_reader(reader).into_iter::<TdtResultJson>() {
        results.push(TdtResult::from(json?));
    }
    Ok(results)
}

/// Reads a result stream from a gzip-or-plain file.
pub fn read_results_path(path: &Path) -> Result<Vec<TdtResult>, ResultIoError> {
    read_results(open_maybe_gz(path)?)
}

/// Appends one result to a JSON stream.
pub fn write_result<W: Write>(writer: &mut W, result: &TdtResult) -> Result<(), ResultIoError> {
    serde_json::to_writer_pretty(&mut *writer, &TdtResultJson::from(result))?;
    writeln!(writer)?;
    Ok(())
}

/// Writes a whole result stream.
pub fn write_results<W: Write>(writer: &mut W, results: &[TdtResult]) -> Result<(), ResultIoError> {
    for result in results {
        write_result(writer, result)?;
    }
    Ok(())
}
