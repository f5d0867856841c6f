use std::sync::Arc;

use server_proxy::config::{RouteConfig, ServerConfig};
use server_proxy::http::Method;
use server_proxy::router::{resolve, DecisionKind};

fn server_with_routes(routes: Vec<RouteConfig>) -> Arc<ServerConfig> {
    let mut s = ServerConfig::default();
    s.routes = routes;
    Arc::new(s)
}

fn route(path: &str) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        ..Default::default()
    }
}

#[test]
fn static_get_resolves_under_location_root() {
    let s = server_with_routes(vec![route("/")]);
    let d = resolve(&Method::GET, "/index.html", 0, &s);
    assert!(matches!(d.kind, DecisionKind::Static));
    assert_eq!(d.fs_path, std::path::PathBuf::from("./www/index.html"));
}

#[test]
fn nested_location_strips_its_own_mount_prefix() {
    let mut sub = route("/assets");
    sub.root = "./static".to_string();
    let s = server_with_routes(vec![route("/"), sub]);

    let d = resolve(&Method::GET, "/assets/app.css", 0, &s);
    assert!(matches!(d.kind, DecisionKind::Static));
    assert_eq!(d.mount_uri, "/assets");
    assert_eq!(d.rel_path, "app.css");
    assert_eq!(d.fs_path, std::path::PathBuf::from("./static/app.css"));
}

#[test]
fn post_without_upload_dir_is_method_not_allowed() {
    let s = server_with_routes(vec![route("/")]);
    let d = resolve(&Method::POST, "/", 0, &s);
    assert!(matches!(d.kind, DecisionKind::Error(405)));
}

#[test]
fn post_with_upload_dir_resolves_to_upload() {
    let mut r = route("/upload");
    r.upload_dir = "incoming".to_string();
    let s = server_with_routes(vec![r]);

    let d = resolve(&Method::POST, "/upload/file.bin", 0, &s);
    match d.kind {
        DecisionKind::Upload { upload_dir } => {
            assert_eq!(upload_dir, std::path::PathBuf::from("./www/incoming"));
        }
        other => panic!("expected Upload decision, got {:?}", other),
    }
}

#[test]
fn delete_resolves_to_delete_decision() {
    let s = server_with_routes(vec![route("/")]);
    let d = resolve(&Method::DELETE, "/file.txt", 0, &s);
    assert!(matches!(d.kind, DecisionKind::Delete));
}

#[test]
fn redirect_location_takes_priority_over_static() {
    let mut r = route("/old");
    r.redirection = Some("/new".to_string());
    r.redirect_code = Some(301);
    let s = server_with_routes(vec![r]);

    let d = resolve(&Method::GET, "/old/page", 0, &s);
    match d.kind {
        DecisionKind::Redirect { url, code } => {
            assert_eq!(url, "/new");
            assert_eq!(code, 301);
        }
        other => panic!("expected Redirect decision, got {:?}", other),
    }
}

#[test]
fn cgi_extension_match_splits_script_and_path_info() {
    let mut r = route("/cgi-bin");
    r.cgi_ext = Some(".py".to_string());
    r.cgi_path = Some("/usr/bin/python3".to_string());
    let s = server_with_routes(vec![r]);

    let d = resolve(&Method::GET, "/cgi-bin/hello.py/more", 0, &s);
    match d.kind {
        DecisionKind::Cgi { script_path, interpreter, path_info } => {
            assert_eq!(script_path, std::path::PathBuf::from("./www/hello.py"));
            assert_eq!(interpreter, "/usr/bin/python3");
            assert_eq!(path_info, "/more");
        }
        other => panic!("expected Cgi decision, got {:?}", other),
    }
}

#[test]
fn traversal_above_location_root_is_rejected() {
    let s = server_with_routes(vec![route("/")]);
    let d = resolve(&Method::GET, "/../../etc/passwd", 0, &s);
    assert!(matches!(d.kind, DecisionKind::Error(400)));
}

#[test]
fn body_size_limit_can_be_overridden_per_location() {
    let mut r = route("/");
    r.client_max_body_size = Some(5);
    let s = server_with_routes(vec![r]);

    let ok = resolve(&Method::POST, "/", 5, &s);
    assert!(!matches!(ok.kind, DecisionKind::Error(413)));

    let too_big = resolve(&Method::POST, "/", 6, &s);
    assert!(matches!(too_big.kind, DecisionKind::Error(413)));
}
