use std::sync::Arc;

use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{hub::Hub, sse, Supervisor};
use crate::settings::{parse_domestic, parse_overseas};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchQuery {
    pub domestic: Option<String>,
    pub overseas: Option<String>,
    pub domestic_exchange: Option<String>,
    pub overseas_exchange: Option<String>,
}

/*----- */
// Handlers
/*----- */
#[get("/api/watch")]
pub async fn watch_pair_handler(
    query: web::Query<WatchQuery>,
    supervisor: Data<Arc<Supervisor>>,
    hub: Data<Arc<Hub>>,
) -> impl Responder {
    let (default_domestic, default_overseas) = supervisor.default_pair();
    let domestic = query.domestic.clone().or_else(|| query.domestic_exchange.clone());
    let overseas = query.overseas.clone().or_else(|| query.overseas_exchange.clone());
    let pair = (
        parse_domestic(domestic.map(Value::String).as_ref(), default_domestic),
        parse_overseas(overseas.map(Value::String).as_ref(), default_overseas),
    );
    sse::response(hub.subscribe_pair(pair))
}

#[get("/api/watch-all")]
pub async fn watch_all_handler(hub: Data<Arc<Hub>>) -> impl Responder {
    sse::response(hub.subscribe_auto())
}

#[get("/api/config")]
pub async fn get_config_handler(supervisor: Data<Arc<Supervisor>>) -> impl Responder {
    HttpResponse::Ok().json(supervisor.config())
}

#[post("/api/config")]
pub async fn post_config_handler(body: web::Bytes, supervisor: Data<Arc<Supervisor>>) -> impl Responder {
    let body = match body.is_empty() {
        true => json!({}),
        false => match serde_json::from_slice::<Value>(&body) {
            Ok(body) => body,
            Err(error) => {
                warn!(error = %error, "rejected malformed config body");
                return HttpResponse::BadRequest().json(json!({ "error": error.to_string() }));
            }
        },
    };
    HttpResponse::Ok().json(supervisor.apply_config(&body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(watch_pair_handler)
        .service(watch_all_handler)
        .service(get_config_handler)
        .service(post_config_handler);
}
