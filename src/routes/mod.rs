pub mod admin;
pub mod identity;
pub mod ticket;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::{AppState, middleware::auth_middleware};

/// 组装全部路由；限流、日志、CORS 这些外层由 main 再包
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        // 身份公开路由；check-phone 同时被对端注册表消费
        .route("/identity/{registry}/check-phone", post(identity::check_phone))
        .route("/identity/{registry}/register", post(identity::register))
        .route("/identity/{registry}/login", post(identity::login))
        // 管理员特权通道，不走手机号注册表
        .route("/admin/register", post(admin::register))
        .route("/admin/login", post(admin::login));

    let protected_routes = Router::new()
        .route("/identity/{registry}/logout", post(identity::logout))
        .route(
            "/identity/{registry}/me",
            patch(identity::update_me).delete(identity::delete_me),
        )
        // 工单路由
        .route(
            "/tickets",
            post(ticket::create_ticket).get(ticket::list_tickets),
        )
        .route(
            "/tickets/{id}",
            get(ticket::get_ticket).delete(ticket::delete_ticket),
        )
        .route("/tickets/{id}/messages", post(ticket::append_message))
        .route("/tickets/{id}/status", post(ticket::transition_status))
        .route("/tickets/{id}/mark-viewed", post(ticket::mark_viewed))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
