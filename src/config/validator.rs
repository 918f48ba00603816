//! Catalogue validation: referential integrity and API consistency.

use crate::config::{CatalogConfig, FullConfig, Scope, TableConfig, TargetConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.public.scope != Scope::Public || config.tenant.scope != Scope::Tenant {
        return Err(ConfigError::Validation("catalogue scopes are swapped".into()));
    }
    validate_scope(config, &config.public)?;
    validate_scope(config, &config.tenant)?;

    let provisioners: Vec<_> = config
        .public
        .api_entities
        .iter()
        .chain(config.tenant.api_entities.iter())
        .filter(|a| a.provisions_tenant)
        .collect();
    if provisioners.len() > 1 {
        return Err(ConfigError::Validation("only one entity may provision tenants".into()));
    }
    if config.tenant.api_entities.iter().any(|a| a.provisions_tenant) {
        return Err(ConfigError::Validation("tenant entities cannot provision tenants".into()));
    }
    Ok(())
}

fn column_names(t: &TableConfig) -> HashSet<&str> {
    let mut names: HashSet<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
    for sc in t.system_columns() {
        names.insert(sc.name);
    }
    names
}

fn require_column(table: &TableConfig, cols: &HashSet<&str>, column: &str) -> Result<(), ConfigError> {
    if cols.contains(column) {
        Ok(())
    } else {
        Err(ConfigError::MissingReference {
            kind: "column",
            id: format!("{}.{}", table.name, column),
        })
    }
}

fn require_target(config: &FullConfig, target: &TargetConfig) -> Result<(), ConfigError> {
    let table = config
        .scope(target.scope)
        .table(&target.table)
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: format!("{}.{}", target.scope.as_str(), target.table),
        })?;
    require_column(table, &column_names(table), &target.column)
}

fn validate_scope(config: &FullConfig, catalog: &CatalogConfig) -> Result<(), ConfigError> {
    let mut seen_tables: HashSet<&str> = HashSet::new();
    for t in &catalog.tables {
        let cols = column_names(t);
        if cols.len() != t.columns.len() + t.system_columns().len() {
            return Err(ConfigError::Validation(format!(
                "table {} declares a duplicate or reserved column",
                t.name
            )));
        }
        if !t.columns.iter().any(|c| c.name == t.primary_key) {
            return Err(ConfigError::InvalidPrimaryKey {
                table: t.name.clone(),
                column: t.primary_key.clone(),
            });
        }
        for set in &t.unique {
            for col in set {
                require_column(t, &cols, col)?;
            }
        }
        for c in &t.columns {
            if let Some(fk) = &c.references {
                // Tables are created in catalogue order, so a foreign key may only point backwards.
                if fk.table != t.name && !seen_tables.contains(fk.table.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "table",
                        id: format!("{} (from {}.{})", fk.table, t.name, c.name),
                    });
                }
            }
        }
        if !seen_tables.insert(t.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate table {}", t.name)));
        }
    }

    for idx in &catalog.indexes {
        if catalog.table(&idx.table).is_none() {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: idx.table.clone(),
            });
        }
    }

    let mut path_segments = HashSet::new();
    for api in &catalog.api_entities {
        let table = catalog.table(&api.table).ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: api.table.clone(),
        })?;
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        let cols = column_names(table);
        for col in api
            .sensitive_columns
            .iter()
            .chain(api.immutable_columns.iter())
            .chain(api.order_by.iter())
            .chain(api.validation.keys())
        {
            require_column(table, &cols, col)?;
        }
        for f in &api.list_filters {
            let link = catalog.table(&f.table).ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: f.table.clone(),
            })?;
            let link_cols = column_names(link);
            require_column(link, &link_cols, &f.local_column)?;
            require_column(link, &link_cols, &f.match_column)?;
        }
        for r in &api.references {
            require_column(table, &cols, &r.column)?;
            if r.targets.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "reference {}.{} has no targets",
                    table.name, r.column
                )));
            }
            for target in &r.targets {
                require_target(config, target)?;
            }
        }
        if let Some(sw) = &api.source_switch {
            require_column(table, &cols, &sw.column)?;
            for v in &sw.variants {
                require_column(table, &cols, &v.column)?;
                require_target(config, &v.target)?;
            }
        }
        if let Some(pw) = &api.password {
            require_column(table, &cols, &pw.column)?;
            if !api.sensitive_columns.contains(&pw.column) {
                return Err(ConfigError::Validation(format!(
                    "{}.{} holds a password hash and must be sensitive",
                    table.name, pw.column
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn shipped_catalogue_is_valid() {
        let config = catalog::load().expect("catalogue parses");
        validate(&config).expect("catalogue validates");
    }

    #[test]
    fn forward_foreign_key_is_rejected() {
        let mut config = catalog::load().unwrap();
        let pos = config
            .public
            .tables
            .iter()
            .position(|t| t.name == "template_block")
            .unwrap();
        let block = config.public.tables.remove(pos);
        config.public.tables.insert(0, block);
        assert!(matches!(validate(&config), Err(ConfigError::MissingReference { .. })));
    }

    #[test]
    fn duplicate_path_segment_is_rejected() {
        let mut config = catalog::load().unwrap();
        let dup = config.tenant.api_entities[0].clone();
        config.tenant.api_entities.push(dup);
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(_))));
    }

    #[test]
    fn unknown_reference_target_is_rejected() {
        let mut config = catalog::load().unwrap();
        let api = config
            .tenant
            .api_entities
            .iter_mut()
            .find(|a| !a.references.is_empty())
            .expect("tenant catalogue has a reference check");
        api.references[0].targets[0].table = "no_such_table".into();
        assert!(matches!(validate(&config), Err(ConfigError::MissingReference { .. })));
    }

    #[test]
    fn password_column_must_be_sensitive() {
        let mut config = catalog::load().unwrap();
        let api = config
            .tenant
            .api_entities
            .iter_mut()
            .find(|a| a.password.is_some())
            .expect("tenant users carry a password");
        api.sensitive_columns.clear();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
