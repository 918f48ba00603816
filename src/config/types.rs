//! Raw catalogue types matching the embedded JSON (`src/catalog/*.json`).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Where a table lives: the shared `public` schema or every tenant schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Public,
    Tenant,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Public => "public",
            Scope::Tenant => "tenant",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableCheck {
    pub name: String,
    pub expression: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub primary_key: String,
    /// Rows are marked with `deleted_at` instead of removed; reads skip them.
    #[serde(default)]
    pub soft_delete: bool,
    pub columns: Vec<ColumnConfig>,
    /// Unique column sets. On soft-delete tables they only cover live rows.
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    #[serde(default)]
    pub check: Vec<TableCheck>,
}

/// Column added to every table by the catalogue itself.
pub struct SystemColumn {
    pub name: &'static str,
    pub ddl: &'static str,
    pub nullable: bool,
    pub has_default: bool,
}

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const DELETED_AT: &str = "deleted_at";

impl TableConfig {
    pub fn system_columns(&self) -> Vec<SystemColumn> {
        let mut cols = vec![
            SystemColumn {
                name: CREATED_AT,
                ddl: "TIMESTAMPTZ NOT NULL DEFAULT NOW()",
                nullable: false,
                has_default: true,
            },
            SystemColumn {
                name: UPDATED_AT,
                ddl: "TIMESTAMPTZ NOT NULL DEFAULT NOW()",
                nullable: false,
                has_default: true,
            },
        ];
        if self.soft_delete {
            cols.push(SystemColumn {
                name: DELETED_AT,
                ddl: "TIMESTAMPTZ",
                nullable: true,
                has_default: false,
            });
        }
        cols
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Bool(b) => Ok(ColumnDefaultConfig::Literal(b.to_string())),
            serde_json::Value::Number(n) => Ok(ColumnDefaultConfig::Literal(n.to_string())),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a literal or {{ \"expression\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a literal or {{ \"expression\": \"...\" }}; got {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKeyConfig {
    pub table: String,
    #[serde(default = "default_id_column")]
    pub column: String,
    #[serde(default)]
    pub on_delete: Option<String>,
}

fn default_id_column() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    /// Foreign key to a table in the same scope.
    #[serde(default)]
    pub references: Option<ForeignKeyConfig>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexColumnEntry {
    Name(String),
    Spec { name: String, direction: Option<String> },
    Expression { expression: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub unique: bool,
    pub columns: Vec<IndexColumnEntry>,
    #[serde(default, rename = "where")]
    pub where_: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// `?param=a,b` on list matches rows linked to any of the ids through a join table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkFilterConfig {
    pub param: String,
    pub table: String,
    pub local_column: String,
    pub match_column: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    pub scope: Scope,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub column: String,
}

/// Column whose value must exist as a live row in one of `targets`, probed in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub column: String,
    pub targets: Vec<TargetConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceVariantConfig {
    pub value: String,
    pub column: String,
    pub target: TargetConfig,
}

/// Discriminator column selecting which of several id columns is populated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceSwitchConfig {
    pub column: String,
    pub variants: Vec<SourceVariantConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Request field carrying the clear-text password.
    pub input: String,
    /// Column receiving the bcrypt hash.
    pub column: String,
    #[serde(default = "default_password_min")]
    pub min_length: u32,
}

fn default_password_min() -> u32 {
    8
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEntityConfig {
    pub table: String,
    pub path_segment: String,
    pub operations: Vec<String>,
    /// Column names that must never be exposed in API responses (e.g. password hashes).
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    /// Columns fixed after insert, in addition to the key and timestamps.
    #[serde(default)]
    pub immutable_columns: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub list_filters: Vec<LinkFilterConfig>,
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
    #[serde(default)]
    pub source_switch: Option<SourceSwitchConfig>,
    #[serde(default)]
    pub password: Option<PasswordConfig>,
    /// Creating a row registers a tenant and provisions its schema.
    #[serde(default)]
    pub provisions_tenant: bool,
}

/// One scope's catalogue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub scope: Scope,
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
    #[serde(default)]
    pub api_entities: Vec<ApiEntityConfig>,
}

impl CatalogConfig {
    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Both catalogues, as shipped with the binary.
#[derive(Clone, Debug)]
pub struct FullConfig {
    pub public: CatalogConfig,
    pub tenant: CatalogConfig,
}

impl FullConfig {
    pub fn scope(&self, scope: Scope) -> &CatalogConfig {
        match scope {
            Scope::Public => &self.public,
            Scope::Tenant => &self.tenant,
        }
    }
}
