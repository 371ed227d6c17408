//! HttpOperatorCatalog against a local operator repository stand-in

use flowrepo_catalog::HttpOperatorCatalog;
use flowrepo_core::{CatalogError, Credential, OperatorCatalog, OperatorMetadata};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use warp::http::StatusCode;
use warp::Filter;

async fn serve() -> SocketAddr {
    let operator = warp::get()
        .and(warp::path!("operator" / String))
        .and(warp::header::optional::<String>("x-userid"))
        .and(warp::header::optional::<String>("authorization"))
        .map(|id: String, user: Option<String>, auth: Option<String>| {
            let reply: Box<dyn warp::Reply> = match id.as_str() {
                "op1" if user.as_deref() == Some("alice") && auth.as_deref() == Some("Bearer t") => {
                    Box::new(warp::reply::json(&json!({
                        "_id": "op1",
                        "name": "Filter",
                        "image": "repo/filter:1",
                        "deploymentType": "cloud",
                        "cost": 5,
                        "pub": true
                    })))
                }
                "op1" => Box::new(StatusCode::UNAUTHORIZED),
                "garbled" => Box::new(warp::reply::json(&json!({"name": 42}))),
                _ => Box::new(StatusCode::NOT_FOUND),
            };
            reply
        });

    let (addr, server) = warp::serve(operator).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn catalog(addr: SocketAddr) -> HttpOperatorCatalog {
    HttpOperatorCatalog::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn forwards_caller_identity() {
    let addr = serve().await;
    let metadata = catalog(addr)
        .get_operator_metadata("op1", "alice", &Credential::bearer("Bearer t"))
        .await
        .unwrap();

    assert_eq!(
        metadata,
        OperatorMetadata {
            name: "Filter".into(),
            image: "repo/filter:1".into(),
            deployment_type: "cloud".into(),
            cost: Some(5),
        }
    );
}

#[tokio::test]
async fn maps_failures() {
    let addr = serve().await;
    let catalog = catalog(addr);
    let alice = Credential::bearer("Bearer t");

    assert_eq!(
        catalog.get_operator_metadata("missing", "alice", &alice).await,
        Err(CatalogError::NotFound("missing".into()))
    );
    assert!(matches!(
        catalog.get_operator_metadata("op1", "bob", &alice).await,
        Err(CatalogError::Transport(_))
    ));
    assert!(matches!(
        catalog.get_operator_metadata("garbled", "alice", &alice).await,
        Err(CatalogError::Decode(_))
    ));
}
