//! Entity CRUD routes. Segments are matched at request time against the catalogue, so one set of
//! routes serves every entity. The static `tenant` segment takes priority over `:path_segment`.

use crate::handlers::entity::{
    create, delete, list, read, tenant_create, tenant_delete, tenant_list, tenant_read, tenant_update, update,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/tenant/:path_segment", get(tenant_list).post(tenant_create))
        .route(
            "/tenant/:path_segment/:id",
            get(tenant_read)
                .put(tenant_update)
                .patch(tenant_update)
                .delete(tenant_delete),
        )
        .route("/:path_segment", get(list).post(create))
        .route("/:path_segment/:id", get(read).put(update).patch(update).delete(delete))
        .with_state(state)
}
