//! OpenAPI document generated from the resolved catalogue, so every entity route is described
//! without per-entity annotations.

use crate::config::{ResolvedCatalog, ResolvedEntity, Scope, CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::extractors::TENANT_ID_HEADER;
use utoipa::openapi::path::{
    HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder,
};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::schema::{KnownFormat, ObjectBuilder, Schema, SchemaFormat, Type};
use utoipa::openapi::{
    ContentBuilder, InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder, Required, ResponseBuilder,
};

pub const API_PREFIX: &str = "/api/v1";

fn scalar(pg_type: Option<&str>) -> Schema {
    let (ty, format) = match pg_type {
        Some("int2" | "int4" | "int8") => (Type::Integer, None),
        Some("float4" | "float8" | "numeric") => (Type::Number, None),
        Some("bool") => (Type::Boolean, None),
        Some("uuid") => (Type::String, Some(KnownFormat::Uuid)),
        Some("timestamptz" | "timestamp") => (Type::String, Some(KnownFormat::DateTime)),
        Some("date") => (Type::String, Some(KnownFormat::Date)),
        Some("json" | "jsonb") => (Type::Object, None),
        _ => (Type::String, None),
    };
    Schema::Object(
        ObjectBuilder::new()
            .schema_type(ty)
            .format(format.map(SchemaFormat::KnownFormat))
            .build(),
    )
}

fn row_schema(entity: &ResolvedEntity) -> Schema {
    let mut obj = ObjectBuilder::new().schema_type(Type::Object);
    for c in &entity.columns {
        if entity.sensitive_columns.contains(&c.name) {
            continue;
        }
        obj = obj.property(&c.name, scalar(c.pg_type.as_deref()));
    }
    Schema::Object(obj.build())
}

fn body_schema(entity: &ResolvedEntity, creating: bool) -> Schema {
    let mut obj = ObjectBuilder::new().schema_type(Type::Object);
    for c in &entity.columns {
        let system = [CREATED_AT, UPDATED_AT, DELETED_AT].contains(&c.name.as_str());
        if system || c.is_pk || entity.sensitive_columns.contains(&c.name) {
            continue;
        }
        if !creating && entity.immutable_columns.contains(&c.name) {
            continue;
        }
        obj = obj.property(&c.name, scalar(c.pg_type.as_deref()));
        let required = entity
            .validation
            .get(&c.name)
            .and_then(|r| r.required)
            .unwrap_or(false);
        if creating && required {
            obj = obj.required(&c.name);
        }
    }
    if let Some(pw) = &entity.password {
        obj = obj.property(&pw.input, scalar(Some("text")));
        if creating {
            obj = obj.required(&pw.input);
        }
    }
    Schema::Object(obj.build())
}

fn tenant_header() -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(TENANT_ID_HEADER)
        .parameter_in(ParameterIn::Header)
        .required(Required::True)
        .description(Some("Gym slug"))
        .schema(Some(scalar(None)))
        .build()
}

fn id_param() -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .schema(Some(scalar(Some("uuid"))))
        .build()
}

fn query_param(name: &str, description: &str, pg_type: Option<&str>) -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .description(Some(description))
        .schema(Some(scalar(pg_type)))
        .build()
}

fn json_content(schema: Schema) -> utoipa::openapi::Content {
    ContentBuilder::new().schema(Some(schema)).build()
}

fn response(description: &str, schema: Option<Schema>) -> utoipa::openapi::Response {
    let mut b = ResponseBuilder::new().description(description);
    if let Some(s) = schema {
        b = b.content("application/json", json_content(s));
    }
    b.build()
}

struct OpBuilder<'a> {
    entity: &'a ResolvedEntity,
    tag: String,
}

impl OpBuilder<'_> {
    fn op(&self, action: &str, summary: String) -> OperationBuilder {
        let mut op = OperationBuilder::new()
            .tag(&self.tag)
            .summary(Some(summary))
            .operation_id(Some(format!(
                "{}_{}_{}",
                action,
                self.entity.scope.as_str(),
                self.entity.path_segment.replace('-', "_")
            )))
            .response("400", response("Invalid input", None));
        if self.entity.scope == Scope::Tenant {
            op = op
                .parameter(tenant_header())
                .response("404", response("Unknown tenant or entity", None));
        }
        op
    }

    fn collection(&self) -> utoipa::openapi::PathItem {
        let e = self.entity;
        let mut item = PathItemBuilder::new();
        if e.allows("read") {
            let mut op = self
                .op("list", format!("List {}", e.path_segment))
                .parameter(query_param("limit", "Maximum rows (default 100, max 1000)", Some("int4")))
                .parameter(query_param("offset", "Rows to skip", Some("int4")));
            for f in &e.list_filters {
                op = op.parameter(query_param(
                    &f.param,
                    &format!("Comma-separated ids linked through {}", f.table),
                    None,
                ));
            }
            op = op.response("200", response("Rows", Some(row_schema(e))));
            item = item.operation(HttpMethod::Get, op.build());
        }
        if e.allows("create") {
            let op = self
                .op("create", format!("Create {}", e.path_segment))
                .request_body(Some(
                    RequestBodyBuilder::new()
                        .content("application/json", json_content(body_schema(e, true)))
                        .required(Some(Required::True))
                        .build(),
                ))
                .response("201", response("Created", Some(row_schema(e))))
                .response("409", response("Duplicate value", None));
            item = item.operation(HttpMethod::Post, op.build());
        }
        item.build()
    }

    fn member(&self) -> utoipa::openapi::PathItem {
        let e = self.entity;
        let mut item = PathItemBuilder::new();
        if e.allows("read") {
            let op = self
                .op("read", format!("Get one {}", e.path_segment))
                .parameter(id_param())
                .response("200", response("Row", Some(row_schema(e))))
                .response("404", response("Not found", None));
            item = item.operation(HttpMethod::Get, op.build());
        }
        if e.allows("update") {
            for (method, action) in [(HttpMethod::Put, "replace"), (HttpMethod::Patch, "update")] {
                let op = self
                    .op(action, format!("Update {}", e.path_segment))
                    .parameter(id_param())
                    .request_body(Some(
                        RequestBodyBuilder::new()
                            .content("application/json", json_content(body_schema(e, false)))
                            .build(),
                    ))
                    .response("200", response("Updated", Some(row_schema(e))))
                    .response("404", response("Not found", None))
                    .response("409", response("Duplicate value", None));
                item = item.operation(method, op.build());
            }
        }
        if e.allows("delete") {
            let op = self
                .op("delete", format!("Delete {}", e.path_segment))
                .parameter(id_param())
                .response("204", response("Deleted", None))
                .response("404", response("Not found", None));
            item = item.operation(HttpMethod::Delete, op.build());
        }
        item.build()
    }
}

/// Path prefix for an entity's collection route.
pub fn collection_path(entity: &ResolvedEntity) -> String {
    match entity.scope {
        Scope::Public => format!("{}/{}", API_PREFIX, entity.path_segment),
        Scope::Tenant => format!("{}/tenant/{}", API_PREFIX, entity.path_segment),
    }
}

pub fn build_openapi(catalog: &ResolvedCatalog) -> OpenApi {
    let mut paths = PathsBuilder::new();
    for entity in catalog.public.entities.iter().chain(catalog.tenant.entities.iter()) {
        let ops = OpBuilder {
            entity,
            tag: format!("{} {}", entity.scope.as_str(), entity.path_segment),
        };
        let base = collection_path(entity);
        paths = paths
            .path(base.clone(), ops.collection())
            .path(format!("{}/{{id}}", base), ops.member());
    }
    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("GymHub API")
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some(
                    "Global catalogue under /api/v1, per-gym data under /api/v1/tenant (X-Tenant-ID: gym slug)",
                ))
                .build(),
        )
        .paths(paths.build())
        .build()
}
