//! Resolved entity model: catalogue validated and flattened for runtime use.

use crate::config::{Scope, ValidationRule};
use std::collections::{HashMap, HashSet};

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub is_pk: bool,
    pub nullable: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    pub has_default: bool,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding values.
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LinkFilterSpec {
    pub param: String,
    pub table: String,
    pub local_column: String,
    pub match_column: String,
}

/// A table a referenced id may live in.
#[derive(Clone, Debug)]
pub struct TargetSpec {
    pub scope: Scope,
    pub table: String,
    pub column: String,
    pub pg_type: Option<String>,
    pub soft_delete: bool,
}

#[derive(Clone, Debug)]
pub struct ReferenceSpec {
    pub column: String,
    pub targets: Vec<TargetSpec>,
}

#[derive(Clone, Debug)]
pub struct SourceVariant {
    pub value: String,
    pub column: String,
    pub target: TargetSpec,
}

#[derive(Clone, Debug)]
pub struct SourceSwitchSpec {
    pub column: String,
    pub variants: Vec<SourceVariant>,
}

impl SourceSwitchSpec {
    pub fn variant(&self, value: &str) -> Option<&SourceVariant> {
        self.variants.iter().find(|v| v.value == value)
    }

    /// Every column the switch reads: the discriminator and each variant's id column.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.column.as_str()).chain(self.variants.iter().map(|v| v.column.as_str()))
    }
}

#[derive(Clone, Debug)]
pub struct PasswordSpec {
    pub input: String,
    pub column: String,
    pub min_length: u32,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub scope: Scope,
    pub table_name: String,
    pub path_segment: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub operations: Vec<String>,
    pub soft_delete: bool,
    pub order_by: Vec<String>,
    /// Column names to strip from all API responses (sensitive data).
    pub sensitive_columns: HashSet<String>,
    /// Columns an update never writes: key, timestamps and configured extras.
    pub immutable_columns: HashSet<String>,
    pub validation: HashMap<String, ValidationRule>,
    pub list_filters: Vec<LinkFilterSpec>,
    pub references: Vec<ReferenceSpec>,
    pub source_switch: Option<SourceSwitchSpec>,
    pub password: Option<PasswordSpec>,
    pub provisions_tenant: bool,
}

impl ResolvedEntity {
    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub scope: Scope,
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}

/// Public and tenant models side by side.
#[derive(Clone, Debug)]
pub struct ResolvedCatalog {
    pub public: ResolvedModel,
    pub tenant: ResolvedModel,
}

impl ResolvedCatalog {
    pub fn model(&self, scope: Scope) -> &ResolvedModel {
        match scope {
            Scope::Public => &self.public,
            Scope::Tenant => &self.tenant,
        }
    }
}
