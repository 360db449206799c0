//! JSON configuration files describing index definitions.
//!
//! ```json
//! {
//!   "indexes": [
//!     {
//!       "name": "Base",
//!       "module": "paper.need",
//!       "abstract": true,
//!       "declared": { "title": { "type": "text", "stored": true } }
//!     },
//!     {
//!       "name": "PaperNeed",
//!       "module": "paper.need",
//!       "extends": ["Base"],
//!       "app_label": "paper",
//!       "fields": ["id", "title"],
//!       "declared": { "id": { "type": "id", "unique": true } },
//!       "manager": "blocking"
//!     }
//!   ]
//! }
//! ```

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    declaration::Declaration,
    error::{Error, Result},
    fields::FieldDecl,
    model::ModelMeta,
    options::{FieldList, IndexDefinition},
};

/// Which manager a definition is served by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    #[default]
    Unlocked,
    Blocking,
}

/// One definition as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionConfig {
    pub name: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub app_label: Option<String>,
    #[serde(default)]
    pub fields: Option<FieldList>,
    /// Field declarations. `null` removes an inherited field.
    #[serde(default)]
    pub declared: BTreeMap<String, Option<FieldDecl>>,
    #[serde(default)]
    pub extends: Vec<String>,
    /// Abstract definitions are only inherited from, never resolved.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub model: Option<ModelMeta>,
    #[serde(default)]
    pub manager: ManagerKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeedConfig {
    pub indexes: Vec<DefinitionConfig>,
}

impl NeedConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        let mut seen = HashSet::new();
        for def in &config.indexes {
            if !seen.insert(def.name.as_str()) {
                return Err(Error::Config(format!(
                    "index class {} is defined twice",
                    def.name
                )));
            }
        }
        Ok(config)
    }

    fn get(&self, name: &str) -> Option<&DefinitionConfig> {
        self.indexes.iter().find(|d| d.name == name)
    }

    /// Collect the declarations of every definition, following `extends`.
    pub fn declarations(&self) -> Result<HashMap<String, Declaration>> {
        let mut done = HashMap::new();
        for def in &self.indexes {
            self.collect(&def.name, &mut done, &mut Vec::new())?;
        }
        Ok(done)
    }

    fn collect(
        &self,
        name: &str,
        done: &mut HashMap<String, Declaration>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        if done.contains_key(name) {
            return Ok(());
        }
        if stack.iter().any(|n| n == name) {
            stack.push(name.to_string());
            return Err(Error::Config(format!(
                "inheritance cycle: {}",
                stack.join(" -> ")
            )));
        }
        let def = self.get(name).ok_or_else(|| Error::NotFound {
            kind: "index class",
            name: name.to_string(),
        })?;

        stack.push(name.to_string());
        for parent in &def.extends {
            self.collect(parent, done, stack)?;
        }
        stack.pop();

        let parents: Vec<&Declaration> =
            def.extends.iter().map(|p| &done[p.as_str()]).collect();
        let declaration = def.declared.iter().fold(
            Declaration::extend(name, &parents),
            |decl, (field, value)| decl.apply(field, value.clone()),
        );
        done.insert(name.to_string(), declaration);
        Ok(())
    }

    /// All concrete definitions, in file order.
    pub fn definitions(&self) -> Result<Vec<(IndexDefinition, ManagerKind)>> {
        let mut declarations = self.declarations()?;
        Ok(self
            .indexes
            .iter()
            .filter(|def| !def.is_abstract)
            .map(|def| {
                let declaration = declarations
                    .remove(&def.name)
                    .unwrap_or_else(|| Declaration::new(&def.name));
                (build(def, declaration), def.manager)
            })
            .collect())
    }

    /// The concrete definition called `name`.
    pub fn definition(
        &self,
        name: &str,
    ) -> Result<(IndexDefinition, ManagerKind)> {
        let def = self
            .get(name)
            .filter(|d| !d.is_abstract)
            .ok_or_else(|| Error::NotFound {
                kind: "index class",
                name: name.to_string(),
            })?;
        let mut declarations = self.declarations()?;
        let declaration = declarations
            .remove(name)
            .unwrap_or_else(|| Declaration::new(name));
        Ok((build(def, declaration), def.manager))
    }
}

fn build(def: &DefinitionConfig, declaration: Declaration) -> IndexDefinition {
    let mut out = IndexDefinition::new(&def.module, declaration)
        .field_list(def.fields.clone());
    if let Some(index) = &def.index {
        out = out.index(index);
    }
    if let Some(label) = &def.app_label {
        out = out.app_label(label);
    }
    if let Some(model) = &def.model {
        out = out.model(model.clone());
    }
    out
}
