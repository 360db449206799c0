//! need - declarative full-text index bindings for your records.
//!
//! Fields are declared once per definition, inherited and shadowed along a
//! definition chain, resolved against an optional backing model and mapped
//! onto a [Tantivy](https://github.com/quickwit-oss/tantivy) index. A
//! manager then writes and reads documents against that index.
//!
//! # Quick start
//!
//! ```no_run
//! use need::{
//!     Actions, Declaration, FieldDecl, IndexDefinition, ModelFieldKind,
//!     ModelMeta, Need, Settings,
//! };
//! use std::collections::BTreeMap;
//!
//! let settings = Settings::resolve(None).unwrap();
//! let model = ModelMeta::new("Paper", "id")
//!     .field("id", ModelFieldKind::Auto)
//!     .field("title", ModelFieldKind::Char);
//! let def = IndexDefinition::new("paper.need", Declaration::new("PaperNeed"))
//!     .app_label("paper")
//!     .fields(["title"])
//!     .model(model);
//! let need = Need::resolve(&def, &settings).unwrap();
//!
//! let mut paper = BTreeMap::new();
//! paper.insert("id".to_string(), "1".to_string());
//! paper.insert("title".to_string(), "Rust for the impatient".to_string());
//! need.actions().add(&need.document(&paper)).unwrap();
//!
//! need.actions()
//!     .read(&["title"], "rust", |hits| {
//!         for hit in hits.iter().flatten() {
//!             println!("{:?} (score: {:.3})", hit.get("id"), hit.score);
//!         }
//!     })
//!     .unwrap();
//! ```

pub mod blocking;
pub mod config;
pub mod data_dir;
pub mod declaration;
pub mod document;
pub mod error;
pub mod fields;
pub mod manager;
pub mod model;
pub mod need;
pub mod options;
pub mod schema;
pub mod tantivy_index;

pub use blocking::{BlockingManager, IndexRegistry};
pub use config::{ManagerKind, NeedConfig};
pub use data_dir::Settings;
pub use declaration::Declaration;
pub use document::Document;
pub use error::{Error, Result};
pub use fields::{FieldDecl, FieldKind};
pub use manager::{Actions, Manager};
pub use model::{ModelField, ModelFieldKind, ModelMeta, Record};
pub use need::Need;
pub use options::{FieldList, IndexDefinition, IndexOptions};
pub use schema::IndexSchema;
pub use tantivy_index::{Hit, Hits, SearchIndex};
