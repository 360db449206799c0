//! Field declarations: what kind of value a field holds and how it is
//! indexed.

use serde::{Deserialize, Serialize};

/// The kind of value a declared field holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Whole numbers of the given bit width.
    Integer {
        #[serde(default = "default_bits")]
        bits: u8,
        #[serde(default = "default_true")]
        signed: bool,
    },
    /// 64-bit floating point numbers.
    Float,
    /// Fixed-point numbers, indexed as integers scaled by `10^places`.
    Decimal { places: u32 },
    /// Tokenized prose.
    Text {
        #[serde(default = "default_true")]
        phrase: bool,
        #[serde(default)]
        stemmed: bool,
    },
    /// A single untokenized token, matched exactly.
    Id,
    #[serde(rename = "datetime")]
    DateTime,
    Boolean,
    /// Kept with the document but not searchable.
    Stored,
    /// Whitespace (or comma) separated tags.
    Keyword {
        #[serde(default)]
        lowercase: bool,
        #[serde(default)]
        commas: bool,
        #[serde(default)]
        scorable: bool,
    },
    /// Character n-grams, for partial-word matching.
    #[serde(rename = "ngram")]
    NGram {
        #[serde(default = "default_ngram_min")]
        min: usize,
        #[serde(default = "default_ngram_max")]
        max: usize,
    },
}

fn default_bits() -> u8 {
    32
}

fn default_true() -> bool {
    true
}

fn default_ngram_min() -> usize {
    2
}

fn default_ngram_max() -> usize {
    4
}

fn default_boost() -> f32 {
    1.0
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Integer { .. } => "integer",
            FieldKind::Float => "float",
            FieldKind::Decimal { .. } => "decimal",
            FieldKind::Text { .. } => "text",
            FieldKind::Id => "id",
            FieldKind::DateTime => "datetime",
            FieldKind::Boolean => "boolean",
            FieldKind::Stored => "stored",
            FieldKind::Keyword { .. } => "keyword",
            FieldKind::NGram { .. } => "ngram",
        }
    }

    /// Whether values of this kind can be matched by a query or a term.
    pub fn is_indexed(&self) -> bool {
        !matches!(self, FieldKind::Stored)
    }
}

/// A declared index field.
///
/// Built with one of the kind constructors and refined with the option
/// setters:
///
/// ```
/// use need::FieldDecl;
///
/// let title = FieldDecl::text().stored().boost(2.0);
/// assert!(title.stored);
/// assert_eq!(title.boost, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

impl FieldDecl {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            stored: false,
            unique: false,
            sortable: false,
            boost: 1.0,
        }
    }

    /// Signed 32-bit integers.
    pub fn integer() -> Self {
        Self::numeric(32, true)
    }

    /// Signed 64-bit integers.
    pub fn long() -> Self {
        Self::numeric(64, true)
    }

    /// Integers of an explicit width. Only 8, 16, 32 and 64 bits pass
    /// validation.
    pub fn numeric(bits: u8, signed: bool) -> Self {
        Self::new(FieldKind::Integer { bits, signed })
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn decimal(places: u32) -> Self {
        Self::new(FieldKind::Decimal { places })
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text {
            phrase: true,
            stemmed: false,
        })
    }

    pub fn id() -> Self {
        Self::new(FieldKind::Id)
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    /// A field that is stored but never indexed.
    pub fn store_only() -> Self {
        Self::new(FieldKind::Stored).stored()
    }

    pub fn keyword() -> Self {
        Self::new(FieldKind::Keyword {
            lowercase: false,
            commas: false,
            scorable: false,
        })
    }

    pub fn ngram(min: usize, max: usize) -> Self {
        Self::new(FieldKind::NGram { min, max })
    }

    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Check the per-kind constraints, returning a human readable reason
    /// on failure.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.boost.is_finite() || self.boost <= 0.0 {
            return Err(format!(
                "boost must be a positive number, got {}",
                self.boost
            ));
        }

        match self.kind {
            FieldKind::Stored if self.unique => {
                Err("stored-only fields cannot be unique".into())
            }
            FieldKind::Stored if self.boost != 1.0 => {
                Err("stored-only fields cannot be boosted".into())
            }
            FieldKind::Integer { bits, .. }
                if !matches!(bits, 8 | 16 | 32 | 64) =>
            {
                Err(format!("integer bits must be 8, 16, 32 or 64, got {bits}"))
            }
            FieldKind::Decimal { places } if places > 18 => Err(format!(
                "decimal places must be at most 18, got {places}"
            )),
            FieldKind::NGram { min, max } if min == 0 || min > max => {
                Err(format!("invalid n-gram sizes {min}..={max}"))
            }
            _ => Ok(()),
        }
    }
}
