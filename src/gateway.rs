//! The one embedded HTTP listener shared by every plugin.
//!
//! Plugins register `(method, path, handler)` triples while they are being loaded; `serve`
//! then freezes the route table, applies the CORS policy to every route, and binds.

use axum::handler::Handler;
use axum::http::{header, Method, StatusCode};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("the HTTP gateway is already serving; routes are frozen")]
    AlreadyStarted,

    #[error("unsupported HTTP method {0}")]
    UnsupportedMethod(Method),

    #[error("failed to bind HTTP gateway: {0}")]
    Bind(#[source] std::io::Error),
}

#[derive(Default)]
struct RouteTable {
    routes: BTreeMap<String, Vec<(Method, MethodRouter)>>,
    started: bool,
}

#[derive(Default)]
pub struct HttpGateway {
    table: Mutex<RouteTable>,
}

impl HttpGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Each method+path pair can be claimed once, and only before `serve`.
    pub fn register<H, T>(&self, method: Method, path: &str, handler: H) -> Result<(), GatewayError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| GatewayError::UnsupportedMethod(method.clone()))?;

        let mut table = self.table.lock().map_err(|_| GatewayError::AlreadyStarted)?;
        if table.started {
            return Err(GatewayError::AlreadyStarted);
        }

        let entry = table.routes.entry(path.to_string()).or_default();
        if entry.iter().any(|(m, _)| *m == method) {
            return Err(GatewayError::DuplicateRoute {
                method,
                path: path.to_string(),
            });
        }

        info!("HTTP gateway: registered {} {}", method, path);
        entry.push((method, on(filter, handler)));
        Ok(())
    }

    /// Registered `(method, path)` pairs in path order.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let Ok(table) = self.table.lock() else {
            return Vec::new();
        };
        table
            .routes
            .iter()
            .flat_map(|(path, methods)| methods.iter().map(move |(m, _)| (m.clone(), path.clone())))
            .collect()
    }

    /// Freezes the route table and starts the listener in the background.
    pub async fn serve(&self, addr: SocketAddr) -> Result<SocketAddr, GatewayError> {
        let router = {
            let mut table = self.table.lock().map_err(|_| GatewayError::AlreadyStarted)?;
            if table.started {
                return Err(GatewayError::AlreadyStarted);
            }
            table.started = true;
            build_router(std::mem::take(&mut table.routes))
        };

        let listener = TcpListener::bind(addr).await.map_err(GatewayError::Bind)?;
        let local = listener.local_addr().map_err(GatewayError::Bind)?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("HTTP gateway stopped: {}", e);
            }
        });

        info!("HTTP gateway listening on {}", local);
        Ok(local)
    }
}

fn build_router(routes: BTreeMap<String, Vec<(Method, MethodRouter)>>) -> Router {
    let mut router = Router::new();

    for (path, methods) in routes {
        let has_options = methods.iter().any(|(m, _)| *m == Method::OPTIONS);
        let mut combined = methods
            .into_iter()
            .map(|(_, r)| r)
            .reduce(|acc, r| acc.merge(r))
            .unwrap_or_default();
        if !has_options {
            combined = combined.options(|| async { StatusCode::OK });
        }
        router = router.route(&path, combined);
    }

    router.layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_private_network(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn start(gateway: &HttpGateway) -> String {
        let addr = gateway.serve("127.0.0.1:0".parse().unwrap()).await.unwrap();
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_routes_dispatch_to_their_own_handler() {
        let gateway = HttpGateway::new();
        gateway.register(Method::POST, "/a", || async { "A" }).unwrap();
        gateway.register(Method::POST, "/b", || async { "B" }).unwrap();
        let base = start(&gateway).await;

        let client = reqwest::Client::new();
        let a = client.post(format!("{base}/a")).send().await.unwrap();
        assert_eq!(a.text().await.unwrap(), "A");
        let b = client.post(format!("{base}/b")).send().await.unwrap();
        assert_eq!(b.text().await.unwrap(), "B");

        let missing = client.post(format!("{base}/c")).send().await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preflight_gets_cors_headers() {
        let gateway = HttpGateway::new();
        gateway.register(Method::POST, "/pause", || async { "ok" }).unwrap();
        let base = start(&gateway).await;

        let client = reqwest::Client::new();
        let res = client
            .request(reqwest::Method::OPTIONS, format!("{base}/pause"))
            .header("Origin", "https://www.youtube.com")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        assert_eq!(
            res.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );

        let bare = client
            .request(reqwest::Method::OPTIONS, format!("{base}/pause"))
            .send()
            .await
            .unwrap();
        assert_eq!(bare.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicate_and_late_registration_fail() {
        let gateway = HttpGateway::new();
        gateway.register(Method::POST, "/a", || async { "A" }).unwrap();
        assert!(matches!(
            gateway.register(Method::POST, "/a", || async { "again" }),
            Err(GatewayError::DuplicateRoute { .. })
        ));
        // Same path, different method is fine
        gateway.register(Method::GET, "/a", || async { "get" }).unwrap();
        assert_eq!(gateway.routes().len(), 2);

        start(&gateway).await;
        assert!(matches!(
            gateway.register(Method::POST, "/late", || async { "late" }),
            Err(GatewayError::AlreadyStarted)
        ));
        assert!(matches!(
            gateway.serve("127.0.0.1:0".parse().unwrap()).await,
            Err(GatewayError::AlreadyStarted)
        ));
    }
}
