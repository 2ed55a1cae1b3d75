use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use webdav_session::DavError;

use crate::support::*;

/// Server that only creates a collection when its parent already exists.
fn tree_server(existing: &[&str]) -> ScriptedTransport {
    let tree: Arc<Mutex<HashSet<String>>> =
        Arc::new(Mutex::new(existing.iter().map(|s| s.to_string()).collect()));
    ScriptedTransport::new(move |r| {
        let path = r.path();
        let trimmed = path.trim_end_matches('/');
        let parent = match trimmed.rfind('/') {
            Some(idx) => &trimmed[..=idx],
            None => "/",
        };
        let mut tree = tree.lock().unwrap();
        if tree.contains(&path) {
            status(405)
        } else if tree.contains(parent) {
            tree.insert(path.clone());
            status(201)
        } else {
            status(409)
        }
    })
}

#[tokio::test]
async fn test_make_collection_single_request_when_parent_exists() {
    let transport = tree_server(&["/", "/a/"]);
    let s = session("http://dav.test/a/b/", &transport);

    s.make_collection().await.unwrap();
    assert_eq!(transport.calls(), vec!["MKCOL /a/b/"]);
}

#[tokio::test]
async fn test_make_collection_creates_missing_ancestors() {
    let transport = tree_server(&["/"]);
    let s = session("http://dav.test/a/b/c/", &transport);

    s.make_collection().await.unwrap();

    assert_eq!(
        transport.calls(),
        vec![
            "MKCOL /a/b/c/",
            "MKCOL /a/b/",
            "MKCOL /a/",
            "MKCOL /a/b/",
            "MKCOL /a/b/c/",
        ]
    );
}

#[tokio::test]
async fn test_make_collection_stops_at_root() {
    let transport = ScriptedTransport::new(|_| status(409));
    let s = session("http://dav.test/a/b/", &transport);

    let err = s.make_collection().await.unwrap_err();

    match err.downcast_ref::<DavError>() {
        Some(DavError::CollectionCreation(url)) => assert_eq!(url, "http://dav.test/"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.calls(), vec!["MKCOL /a/b/", "MKCOL /a/", "MKCOL /"]);
}

#[tokio::test]
async fn test_make_collection_conflict_after_parent_created() {
    // The parent can be created but the target keeps conflicting (e.g. a file in the way).
    let transport = ScriptedTransport::new(|r| match r.path().as_str() {
        "/a/" => status(201),
        _ => status(409),
    });
    let s = session("http://dav.test/a/b/", &transport);

    let err = s.make_collection().await.unwrap_err();

    match err.downcast_ref::<DavError>() {
        Some(DavError::CollectionCreation(url)) => assert_eq!(url, "http://dav.test/a/b/"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.calls(), vec!["MKCOL /a/b/", "MKCOL /a/", "MKCOL /a/b/"]);
}

#[tokio::test]
async fn test_make_collection_other_failure_propagates() {
    let transport = ScriptedTransport::new(|r| match r.path().as_str() {
        "/a/b/" => status(409),
        _ => status(403),
    });
    let s = session("http://dav.test/a/b/", &transport);

    let err = s.make_collection().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<DavError>().unwrap().status(),
        Some(hyper::StatusCode::FORBIDDEN)
    );
    assert_eq!(transport.count("MKCOL"), 2);
}
