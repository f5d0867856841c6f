pub use crate::prelude::*;

/// Serves a location's filesystem disposition for GET: directory with index
/// -> that file, directory with autoindex -> a listing, directory otherwise
/// -> 403, file -> streamed download, missing -> the error producer.
/// `fs_path` is the already traversal-checked path produced by route
/// resolution.
pub fn handle_get(
    fs_path: &Path,
    original_url: &str,
    r_cfg: &RouteConfig,
    s_cfg: &Arc<ServerConfig>,
) -> (HttpResponse, ActiveAction) {
    let mut path = fs_path.to_path_buf();

    if path.is_dir() {
        if !r_cfg.default_file.is_empty() && path.join(&r_cfg.default_file).is_file() {
            path.push(&r_cfg.default_file);
        } else if r_cfg.autoindex {
            return (generate_autoindex(&path, original_url), ActiveAction::None);
        } else {
            return (handle_error(HTTP_FORBIDDEN, Some(s_cfg)), ActiveAction::None);
        }
    }

    match File::open(&path) {
        Ok(file) => {
            let Ok(metadata) = file.metadata() else {
                return (
                    handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg)),
                    ActiveAction::None,
                );
            };
            let file_size = metadata.size() as usize;
            let mime_type = get_mime_type(path.extension().and_then(|s| s.to_str()));

            let mut res = HttpResponse::new(HTTP_OK, &HttpResponse::status_text(HTTP_OK));
            res.headers
                .insert("content-length".to_string(), file_size.to_string());
            res.headers
                .insert("content-type".to_string(), mime_type.to_string());

            (res, ActiveAction::FileDownload(file, file_size))
        }
        Err(e) => {
            let code = match e.kind() {
                std::io::ErrorKind::NotFound => HTTP_NOT_FOUND,
                std::io::ErrorKind::PermissionDenied => HTTP_FORBIDDEN,
                _ => HTTP_INTERNAL_SERVER_ERROR,
            };
            (handle_error(code, Some(s_cfg)), ActiveAction::None)
        }
    }
}
