//! Build the runtime model from catalogue config.

use crate::config::resolved::{
    ColumnInfo, LinkFilterSpec, PasswordSpec, PkType, ReferenceSpec, ResolvedCatalog, ResolvedEntity,
    ResolvedModel, SourceSwitchSpec, SourceVariant, TargetSpec,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Parse one scope's catalogue from JSON text.
pub fn parse_catalog(json: &str) -> Result<CatalogConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Build resolved model for both scopes (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedCatalog, ConfigError> {
    validate(config)?;
    Ok(ResolvedCatalog {
        public: resolve_scope(config, &config.public)?,
        tenant: resolve_scope(config, &config.tenant)?,
    })
}

fn resolve_scope(config: &FullConfig, catalog: &CatalogConfig) -> Result<ResolvedModel, ConfigError> {
    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for api in &catalog.api_entities {
        let table = catalog.table(&api.table).ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: api.table.clone(),
        })?;
        let pk_col = table
            .columns
            .iter()
            .find(|c| c.name == table.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table: table.name.clone(),
                column: table.primary_key.clone(),
            })?;
        let pk_type = infer_pk_type(pk_col);

        let mut columns: Vec<ColumnInfo> = table
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                is_pk: c.name == table.primary_key,
                nullable: c.nullable,
                has_default: c.default.is_some(),
                pg_type: column_pg_type_name(&c.type_),
            })
            .collect();
        for sc in table.system_columns() {
            columns.push(ColumnInfo {
                name: sc.name.to_string(),
                is_pk: false,
                nullable: sc.nullable,
                has_default: sc.has_default,
                pg_type: Some("timestamptz".into()),
            });
        }

        let mut immutable_columns: HashSet<String> = api.immutable_columns.iter().cloned().collect();
        immutable_columns.insert(table.primary_key.clone());
        for sc in table.system_columns() {
            immutable_columns.insert(sc.name.to_string());
        }

        let order_by = if api.order_by.is_empty() {
            vec![table.primary_key.clone()]
        } else {
            api.order_by.clone()
        };

        let references = api
            .references
            .iter()
            .map(|r| {
                Ok(ReferenceSpec {
                    column: r.column.clone(),
                    targets: r
                        .targets
                        .iter()
                        .map(|t| resolve_target(config, t))
                        .collect::<Result<Vec<_>, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let source_switch = match &api.source_switch {
            Some(sw) => Some(SourceSwitchSpec {
                column: sw.column.clone(),
                variants: sw
                    .variants
                    .iter()
                    .map(|v| {
                        Ok(SourceVariant {
                            value: v.value.clone(),
                            column: v.column.clone(),
                            target: resolve_target(config, &v.target)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?,
            }),
            None => None,
        };

        let entity = ResolvedEntity {
            scope: catalog.scope,
            table_name: table.name.clone(),
            path_segment: api.path_segment.clone(),
            pk_column: table.primary_key.clone(),
            pk_type,
            columns,
            operations: api.operations.clone(),
            soft_delete: table.soft_delete,
            order_by,
            sensitive_columns: api.sensitive_columns.iter().cloned().collect(),
            immutable_columns,
            validation: api.validation.clone(),
            list_filters: api
                .list_filters
                .iter()
                .map(|f| LinkFilterSpec {
                    param: f.param.clone(),
                    table: f.table.clone(),
                    local_column: f.local_column.clone(),
                    match_column: f.match_column.clone(),
                })
                .collect(),
            references,
            source_switch,
            password: api.password.as_ref().map(|p| PasswordSpec {
                input: p.input.clone(),
                column: p.column.clone(),
                min_length: p.min_length,
            }),
            provisions_tenant: api.provisions_tenant,
        };
        entity_by_path.insert(api.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        scope: catalog.scope,
        entities,
        entity_by_path,
    })
}

fn resolve_target(config: &FullConfig, target: &TargetConfig) -> Result<TargetSpec, ConfigError> {
    let table = config
        .scope(target.scope)
        .table(&target.table)
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: target.table.clone(),
        })?;
    let pg_type = table
        .columns
        .iter()
        .find(|c| c.name == target.column)
        .and_then(|c| column_pg_type_name(&c.type_));
    Ok(TargetSpec {
        scope: target.scope,
        table: table.name.clone(),
        column: target.column.clone(),
        pg_type,
        soft_delete: table.soft_delete,
    })
}

/// Base type name used to cast bound parameters (`$1::int4`) and to pick the bind type.
fn column_pg_type_name(ty: &ColumnTypeConfig) -> Option<String> {
    let name = match ty {
        ColumnTypeConfig::Simple(s) => s.as_str(),
        ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
    };
    let lower = name.to_lowercase();
    let base = match lower.as_str() {
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "timestamp" => "timestamp",
        "date" => "date",
        "uuid" => "uuid",
        "smallint" | "int2" => "int2",
        "integer" | "int" | "int4" | "serial" => "int4",
        "bigint" | "int8" | "bigserial" => "int8",
        "numeric" | "decimal" => "numeric",
        "real" | "float4" => "float4",
        "double precision" | "float8" => "float8",
        "boolean" | "bool" => "bool",
        "varchar" | "character varying" => "varchar",
        "text" => "text",
        "jsonb" => "jsonb",
        "json" => "json",
        _ => return None,
    };
    Some(base.into())
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_str = match &col.type_ {
        ColumnTypeConfig::Simple(s) => s.as_str(),
        ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
    };
    let type_lower = type_str.to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}
