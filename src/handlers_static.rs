use warp::Filter;

macro_rules! include_static {
    ($($path:expr),* $(,)?) => {
        &[
            $(($path, include_str!(concat!("../static/", $path)))),*
        ]
    };
}

const STATIC_FILES: &[(&str, &str)] = include_static!["css/gallery.css", "js/gallery.js"];

fn content_type_from_path(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("html") => "text/html",
        _ => "text/plain",
    }
}

fn find_static(path: &str) -> Option<(&'static str, &'static str)> {
    STATIC_FILES
        .iter()
        .find(|(file_path, _)| *file_path == path)
        .map(|(file_path, content)| (*content, content_type_from_path(file_path)))
}

pub fn build_static_routes(
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let index_route = warp::path::end().and(warp::get()).map(|| {
        warp::reply::with_header(
            include_str!("../static/index.html"),
            "content-type",
            "text/html",
        )
    });

    let file_route = warp::path::full().and(warp::get()).and_then(
        |full_path: warp::path::FullPath| async move {
            let path = full_path.as_str().trim_start_matches('/');

            match find_static(path) {
                Some((content, content_type)) => Ok::<_, warp::Rejection>(
                    warp::reply::with_header(content, "content-type", content_type),
                ),
                None => Err(warp::reject::not_found()),
            }
        },
    );

    index_route.or(file_route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_assets() {
        let (js, js_type) = find_static("js/gallery.js").unwrap();
        assert_eq!(js_type, "application/javascript");
        assert!(js.contains("/api/photos"));

        let (_, css_type) = find_static("css/gallery.css").unwrap();
        assert_eq!(css_type, "text/css");
    }

    #[test]
    fn test_unknown_asset() {
        assert!(find_static("js/missing.js").is_none());
        assert!(find_static("../Cargo.toml").is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_from_path("index.html"), "text/html");
        assert_eq!(content_type_from_path("notes"), "text/plain");
    }
}
