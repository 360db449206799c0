//! Mapping of resolved field declarations onto a Tantivy schema.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tantivy::{
    DateTime,
    Index,
    TantivyDocument,
    Term,
    schema::*,
    tokenizer::{
        LowerCaser,
        NgramTokenizer,
        RegexTokenizer,
        TextAnalyzer,
        WhitespaceTokenizer,
    },
};

use crate::{
    error::{Error, Result},
    fields::{FieldDecl, FieldKind},
};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Resolved index schema: the declarations and the Tantivy schema derived
/// from them.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    index: String,
    fields: BTreeMap<String, FieldDecl>,
    schema: Schema,
}

/// A string converted to the native type of its field.
#[derive(Debug, Clone, PartialEq)]
enum Native {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(DateTime),
}

impl IndexSchema {
    pub fn build(
        index: impl Into<String>,
        fields: BTreeMap<String, FieldDecl>,
    ) -> Self {
        let mut builder = Schema::builder();
        for (name, decl) in &fields {
            add_field(&mut builder, name, decl);
        }
        let schema = builder.build();
        Self {
            index: index.into(),
            fields,
            schema,
        }
    }

    /// Name of the index this schema belongs to.
    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldDecl> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.get(name)
    }

    /// Like [`IndexSchema::get`], failing for names this index lacks.
    pub fn decl(&self, name: &str) -> Result<&FieldDecl> {
        self.fields.get(name).ok_or_else(|| self.unknown(name))
    }

    /// Tantivy handle for `name` in `schema`, which may be the schema an
    /// existing index was created with.
    pub fn field(&self, schema: &Schema, name: &str) -> Result<Field> {
        schema.get_field(name).map_err(|_| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> Error {
        Error::UnknownField {
            index: self.index.clone(),
            field: name.to_string(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn tantivy_schema(&self) -> &Schema {
        &self.schema
    }

    /// Register every analyzer the declared fields refer to.
    pub fn register_tokenizers(&self, index: &Index) -> Result<()> {
        for decl in self.fields.values() {
            match decl.kind {
                FieldKind::Keyword {
                    lowercase, commas, ..
                } => {
                    let name = keyword_tokenizer(lowercase, commas);
                    let analyzer = if commas {
                        let tokenizer =
                            RegexTokenizer::new(r"[^,\s](?:[^,]*[^,\s])?")?;
                        if lowercase {
                            TextAnalyzer::builder(tokenizer)
                                .filter(LowerCaser)
                                .build()
                        } else {
                            TextAnalyzer::from(tokenizer)
                        }
                    } else if lowercase {
                        TextAnalyzer::builder(WhitespaceTokenizer::default())
                            .filter(LowerCaser)
                            .build()
                    } else {
                        TextAnalyzer::from(WhitespaceTokenizer::default())
                    };
                    index.tokenizers().register(&name, analyzer);
                }
                FieldKind::NGram { min, max } => {
                    let analyzer = TextAnalyzer::builder(NgramTokenizer::new(
                        min, max, false,
                    )?)
                    .filter(LowerCaser)
                    .build();
                    index
                        .tokenizers()
                        .register(&ngram_tokenizer(min, max), analyzer);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Convert a document into a Tantivy document against `schema`,
    /// dropping keys this index does not declare.
    pub fn to_tantivy(
        &self,
        schema: &Schema,
        doc: &crate::document::Document,
    ) -> Result<TantivyDocument> {
        let mut out = TantivyDocument::new();
        for (name, raw) in doc.iter() {
            let Some(decl) = self.fields.get(name) else {
                tracing::trace!(field = name, "dropping undeclared field");
                continue;
            };
            let field = self.field(schema, name)?;
            match parse(name, decl, raw)? {
                Native::Str(s) => out.add_text(field, s),
                Native::I64(v) => out.add_i64(field, v),
                Native::U64(v) => out.add_u64(field, v),
                Native::F64(v) => out.add_f64(field, v),
                Native::Bool(v) => out.add_bool(field, v),
                Native::Date(v) => out.add_date(field, v),
            }
        }
        Ok(out)
    }

    /// The exact term matching `raw` in field `name`. The value is not
    /// analyzed, so tokenized fields only match single normalized tokens.
    pub fn term(
        &self,
        schema: &Schema,
        name: &str,
        raw: &str,
    ) -> Result<Term> {
        let decl = self.decl(name)?;
        if !decl.kind.is_indexed() {
            return Err(Error::InvalidValue {
                field: name.to_string(),
                value: raw.to_string(),
                reason: "stored-only fields cannot be matched".into(),
            });
        }
        let field = self.field(schema, name)?;
        Ok(match parse(name, decl, raw)? {
            Native::Str(s) => match decl.kind {
                FieldKind::Keyword {
                    lowercase: true, ..
                } => Term::from_field_text(field, &s.trim().to_lowercase()),
                FieldKind::Keyword { .. } => {
                    Term::from_field_text(field, s.trim())
                }
                _ => Term::from_field_text(field, &s),
            },
            Native::I64(v) => Term::from_field_i64(field, v),
            Native::U64(v) => Term::from_field_u64(field, v),
            Native::F64(v) => Term::from_field_f64(field, v),
            Native::Bool(v) => Term::from_field_bool(field, v),
            Native::Date(v) => Term::from_field_date(field, v),
        })
    }

    /// Names of the unique fields, used to find documents to replace.
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, decl)| decl.unique)
            .map(|(name, _)| name.as_str())
    }

    /// String form of the stored value of `name` in `doc`.
    pub fn render(
        &self,
        schema: &Schema,
        doc: &TantivyDocument,
        name: &str,
    ) -> Option<String> {
        let decl = self.fields.get(name)?;
        let field = schema.get_field(name).ok()?;
        let value = doc.get_first(field)?;
        match decl.kind {
            FieldKind::Integer { signed: false, .. } => {
                value.as_u64().map(|v| v.to_string())
            }
            FieldKind::Integer { .. } => value.as_i64().map(|v| v.to_string()),
            FieldKind::Decimal { places } => {
                value.as_i64().map(|v| format_decimal(v, places))
            }
            FieldKind::Float => value.as_f64().map(|v| v.to_string()),
            FieldKind::Boolean => value.as_bool().map(|v| v.to_string()),
            FieldKind::DateTime => value.as_datetime().and_then(|v| {
                chrono::DateTime::from_timestamp(v.into_timestamp_secs(), 0)
                    .map(|dt| dt.to_rfc3339())
            }),
            _ => value.as_str().map(str::to_string),
        }
    }
}

fn add_field(builder: &mut SchemaBuilder, name: &str, decl: &FieldDecl) {
    match decl.kind {
        FieldKind::Integer { signed: false, .. } => {
            builder.add_u64_field(name, numeric_options(decl));
        }
        FieldKind::Integer { .. } | FieldKind::Decimal { .. } => {
            builder.add_i64_field(name, numeric_options(decl));
        }
        FieldKind::Float => {
            builder.add_f64_field(name, numeric_options(decl));
        }
        FieldKind::Boolean => {
            builder.add_bool_field(name, numeric_options(decl));
        }
        FieldKind::DateTime => {
            let mut opts = DateOptions::default()
                .set_indexed()
                .set_precision(DateTimePrecision::Seconds);
            if decl.stored {
                opts = opts.set_stored();
            }
            if decl.sortable {
                opts = opts.set_fast();
            }
            builder.add_date_field(name, opts);
        }
        FieldKind::Stored => {
            builder.add_text_field(name, STORED);
        }
        FieldKind::Id => {
            builder.add_text_field(
                name,
                text_options(decl, "raw", IndexRecordOption::Basic),
            );
        }
        FieldKind::Text { phrase, stemmed } => {
            let tokenizer = if stemmed { "en_stem" } else { "default" };
            let record = if phrase {
                IndexRecordOption::WithFreqsAndPositions
            } else {
                IndexRecordOption::WithFreqs
            };
            builder.add_text_field(name, text_options(decl, tokenizer, record));
        }
        FieldKind::Keyword {
            lowercase,
            commas,
            scorable,
        } => {
            let record = if scorable {
                IndexRecordOption::WithFreqs
            } else {
                IndexRecordOption::Basic
            };
            let tokenizer = keyword_tokenizer(lowercase, commas);
            builder
                .add_text_field(name, text_options(decl, &tokenizer, record));
        }
        FieldKind::NGram { min, max } => {
            let tokenizer = ngram_tokenizer(min, max);
            builder.add_text_field(
                name,
                text_options(decl, &tokenizer, IndexRecordOption::WithFreqs),
            );
        }
    }
}

fn numeric_options(decl: &FieldDecl) -> NumericOptions {
    let mut opts = NumericOptions::default().set_indexed();
    if decl.stored {
        opts = opts.set_stored();
    }
    if decl.sortable {
        opts = opts.set_fast();
    }
    opts
}

fn text_options(
    decl: &FieldDecl,
    tokenizer: &str,
    record: IndexRecordOption,
) -> TextOptions {
    let mut opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(tokenizer)
            .set_index_option(record),
    );
    if decl.stored {
        opts = opts.set_stored();
    }
    if decl.sortable {
        opts = opts.set_fast(Some("raw"));
    }
    opts
}

fn keyword_tokenizer(lowercase: bool, commas: bool) -> String {
    match (commas, lowercase) {
        (false, false) => "need_keyword".into(),
        (false, true) => "need_keyword_lower".into(),
        (true, false) => "need_keyword_commas".into(),
        (true, true) => "need_keyword_commas_lower".into(),
    }
}

fn ngram_tokenizer(min: usize, max: usize) -> String {
    format!("need_ngram_{min}_{max}")
}

fn parse(name: &str, decl: &FieldDecl, raw: &str) -> Result<Native> {
    let invalid = |reason: &str| Error::InvalidValue {
        field: name.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = raw.trim();

    match decl.kind {
        FieldKind::Integer { bits, signed: true } => {
            let v: i64 =
                trimmed.parse().map_err(|_| invalid("not an integer"))?;
            let limit = 1i128 << (bits - 1);
            if (v as i128) < -limit || (v as i128) >= limit {
                return Err(invalid(&format!("out of range for {bits} bits")));
            }
            Ok(Native::I64(v))
        }
        FieldKind::Integer {
            bits,
            signed: false,
        } => {
            let v: u64 = trimmed
                .parse()
                .map_err(|_| invalid("not an unsigned integer"))?;
            if bits < 64 && v >= 1u64 << bits {
                return Err(invalid(&format!("out of range for {bits} bits")));
            }
            Ok(Native::U64(v))
        }
        FieldKind::Float => trimmed
            .parse()
            .map(Native::F64)
            .map_err(|_| invalid("not a number")),
        FieldKind::Decimal { places } => parse_decimal(trimmed, places)
            .map(Native::I64)
            .ok_or_else(|| invalid("not a decimal number")),
        FieldKind::Boolean => parse_bool(trimmed)
            .map(Native::Bool)
            .ok_or_else(|| invalid("not a boolean")),
        FieldKind::DateTime => parse_datetime(trimmed)
            .map(Native::Date)
            .ok_or_else(|| invalid("not a date or date-time")),
        _ => Ok(Native::Str(raw.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "yes" | "1" | "on" => Some(true),
        "f" | "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Parse RFC 3339, naive date-times (taken as UTC) and bare dates.
fn parse_datetime(s: &str) -> Option<DateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(DateTime::from_timestamp_secs(dt.timestamp()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(DateTime::from_timestamp_secs(
                dt.and_utc().timestamp(),
            ));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_timestamp_secs(dt.and_utc().timestamp()))
}

/// Scale a decimal string to an integer with `places` fractional digits.
/// Extra fractional digits are truncated.
fn parse_decimal(s: &str, places: u32) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let scale = 10i64.checked_pow(places)?;
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_value = 0i64;
    for (i, c) in frac.chars().take(places as usize).enumerate() {
        let digit = i64::from(c.to_digit(10)?);
        frac_value += digit * 10i64.pow(places - 1 - i as u32);
    }
    let value = whole.checked_mul(scale)?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}

fn format_decimal(value: i64, places: u32) -> String {
    if places == 0 {
        return value.to_string();
    }
    let scale = 10u64.pow(places);
    let abs = value.unsigned_abs();
    let sign = if value < 0 { "-" } else { "" };
    format!(
        "{sign}{}.{:0width$}",
        abs / scale,
        abs % scale,
        width = places as usize
    )
}
