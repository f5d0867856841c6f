use crate::prelude::*;

#[derive(Debug)]
pub enum RoutingError {
    NotFound,
    MethodNotAllowed,
}

/// What a resolved request should do next. Produced by [`resolve`], consumed
/// by the connection's action-setup step, which turns it into an `ActiveAction`
/// and/or an immediate `HttpResponse`.
#[derive(Debug, Clone)]
pub enum DecisionKind {
    Static,
    Redirect { url: String, code: u16 },
    Upload { upload_dir: PathBuf },
    Delete,
    Cgi {
        script_path: PathBuf,
        interpreter: String,
        path_info: String,
    },
    Error(u16),
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub kind: DecisionKind,
    pub location: RouteConfig,
    pub mount_uri: String,
    pub rel_path: String,
    pub fs_path: PathBuf,
}

impl Decision {
    fn error(code: u16, location: RouteConfig) -> Self {
        Self {
            kind: DecisionKind::Error(code),
            location,
            mount_uri: String::new(),
            rel_path: String::new(),
            fs_path: PathBuf::new(),
        }
    }
}

/// Resolves a path against a server's locations using longest `/`-aligned
/// prefix match, falling back to a synthetic `/` location when nothing
/// configured actually matches (so every request always resolves *some*
/// location).
pub fn find_location<'a>(s_cfg: &'a ServerConfig, path: &str) -> Option<&'a RouteConfig> {
    let mut best: Option<&RouteConfig> = None;
    for route in &s_cfg.routes {
        if is_prefix_match(&route.path, path) {
            match best {
                Some(b) if b.path.len() >= route.path.len() => {}
                _ => best = Some(route),
            }
        }
    }
    best
}

fn is_prefix_match(mount: &str, path: &str) -> bool {
    if mount == "/" {
        return true;
    }
    if !path.starts_with(mount) {
        return false;
    }
    // require a '/'-aligned boundary: either an exact match or the next
    // character in `path` is '/', so `/ab` never matches location `/a`.
    path.len() == mount.len() || path[mount.len()..].starts_with('/')
}

/// Normalizes a URI path: resolves `.`/`..` segments, collapses repeated
/// slashes, and refuses to ascend above the root. Returns `None` on traversal.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return None;
                }
            }
            s => segments.push(s),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// Resolves the method/path/body-size/location gates and decides what the
/// connection should do. Filesystem disposition (directory vs file,
/// autoindex vs 403) for the `Static` case is left to the GET handler, which
/// already owns that logic.
pub fn resolve(method: &Method, url: &str, content_length: usize, s_cfg: &Arc<ServerConfig>) -> Decision {
    let path = url.split('?').next().unwrap_or(url);

    let location = match find_location(s_cfg, path) {
        Some(r) => r.clone(),
        None => RouteConfig::synthetic_root(s_cfg),
    };

    if !location.methods.contains(&method.to_string()) {
        return Decision::error(HTTP_METHOD_NOT_ALLOWED, location);
    }

    let limit = location.client_max_body_size.unwrap_or(s_cfg.client_max_body_size);
    if content_length > limit {
        return Decision::error(HTTP_PAYLOAD_TOO_LARGE, location);
    }

    let mount_uri = location.path.clone();
    let raw_rel_path = if mount_uri == "/" {
        path.trim_start_matches('/').to_string()
    } else {
        path.strip_prefix(&mount_uri)
            .unwrap_or(path)
            .trim_start_matches('/')
            .to_string()
    };

    // Traversal rejection happens here, before any filesystem access: the
    // normalized relative path is what every downstream producer (static,
    // CGI script lookup, upload) is built from.
    let Some(normalized) = normalize_path(&format!("/{}", raw_rel_path)) else {
        return Decision::error(HTTP_BAD_REQUEST, location);
    };
    let rel_path = normalized.trim_start_matches('/').to_string();
    let fs_path = PathBuf::from(&location.root).join(&rel_path);

    if let Some(ref redirect_url) = location.redirection {
        return Decision {
            kind: DecisionKind::Redirect {
                url: redirect_url.clone(),
                code: location.redirect_code.unwrap_or(HTTP_FOUND),
            },
            location,
            mount_uri,
            rel_path,
            fs_path,
        };
    }

    if let Some(ext) = &location.cgi_ext {
        if rel_path.contains(ext.as_str()) {
            let (script_part, path_info) = split_path_info(&rel_path, ext);
            let script_path = PathBuf::from(&location.root).join(&script_part);
            let interpreter = location
                .cgi_path
                .clone()
                .unwrap_or_else(|| default_interpreter(ext));
            return Decision {
                kind: DecisionKind::Cgi {
                    script_path,
                    interpreter,
                    path_info,
                },
                location,
                mount_uri,
                rel_path,
                fs_path,
            };
        }
    }

    let kind = match method {
        Method::GET => DecisionKind::Static,
        Method::POST => {
            if !location.upload_dir.is_empty() {
                DecisionKind::Upload {
                    upload_dir: PathBuf::from(&location.root).join(&location.upload_dir),
                }
            } else {
                return Decision::error(HTTP_METHOD_NOT_ALLOWED, location);
            }
        }
        Method::DELETE => DecisionKind::Delete,
    };

    Decision {
        kind,
        location,
        mount_uri,
        rel_path,
        fs_path,
    }
}

/// Splits `rel_path` at the last occurrence of the CGI extension: everything
/// up to and including it is the script; anything after is PATH_INFO.
fn split_path_info(rel_path: &str, ext: &str) -> (String, String) {
    match rel_path.rfind(ext.as_str()) {
        Some(idx) => {
            let split_at = idx + ext.len();
            let script = rel_path[..split_at].to_string();
            let path_info = rel_path[split_at..].to_string();
            (script, path_info)
        }
        None => (rel_path.to_string(), String::new()),
    }
}

fn default_interpreter(ext: &str) -> String {
    match ext.trim_start_matches('.') {
        "py" => "python3",
        "sh" => "bash",
        "pl" => "perl",
        _ => "python3",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> RouteConfig {
        RouteConfig {
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let mut s = ServerConfig::default();
        s.routes = vec![route("/"), route("/a"), route("/a/b")];
        assert_eq!(find_location(&s, "/a/b/c").unwrap().path, "/a/b");
        assert_eq!(find_location(&s, "/a/x").unwrap().path, "/a");
        assert_eq!(find_location(&s, "/z").unwrap().path, "/");
    }

    #[test]
    fn prefix_is_slash_aligned() {
        let mut s = ServerConfig::default();
        s.routes = vec![route("/a")];
        assert!(find_location(&s, "/abc").is_none());
        assert!(find_location(&s, "/a/bc").is_some());
        assert!(find_location(&s, "/a").is_some());
    }

    #[test]
    fn no_match_falls_back_to_synthetic_root() {
        let mut s = ServerConfig::default();
        s.routes = vec![route("/a")];
        let d = resolve(&Method::GET, "/b", 0, &Arc::new(s));
        assert!(matches!(d.kind, DecisionKind::Static));
        assert_eq!(d.location.path, "/");
    }

    #[test]
    fn method_not_allowed_is_an_error_decision() {
        let mut s = ServerConfig::default();
        let mut r = route("/");
        r.methods = vec!["GET".to_string()];
        s.routes = vec![r];
        let d = resolve(&Method::DELETE, "/x", 0, &Arc::new(s));
        assert!(matches!(d.kind, DecisionKind::Error(HTTP_METHOD_NOT_ALLOWED)));
    }

    #[test]
    fn body_too_large_is_an_error_decision() {
        let mut s = ServerConfig::default();
        s.client_max_body_size = 10;
        let d = resolve(&Method::POST, "/", 11, &Arc::new(s));
        assert!(matches!(d.kind, DecisionKind::Error(HTTP_PAYLOAD_TOO_LARGE)));
    }

    #[test]
    fn normalize_rejects_traversal_above_root() {
        assert_eq!(normalize_path("/a/../b"), Some("/b".to_string()));
        assert_eq!(normalize_path("/a/../../b"), None);
        assert_eq!(normalize_path("/a/./b"), Some("/a/b".to_string()));
    }

    #[test]
    fn cgi_splits_path_info() {
        let (script, info) = split_path_info("cgi-bin/hello.py/extra/path", ".py");
        assert_eq!(script, "cgi-bin/hello.py");
        assert_eq!(info, "/extra/path");
    }
}
