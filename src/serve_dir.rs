use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::Local;
use http::header::{
    HeaderName, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, ALLOW, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN,
};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use http_body::{Body, Empty, Full};
use tower_service::Service;
use tracing::{info, warn};

use crate::access_log::AccessLogEntry;
use crate::async_body::{AsyncReadBody, GzipReadBody};
use crate::content_encoding::use_gzip;
use crate::fs::{FsKind, ResolvedFile};
use crate::headers::file_headers;
use crate::open_file::{open_file, FileOpened, OpenOutcome};
use crate::options::ServerOptions;
use crate::pages;
use crate::resolver::{decode_url_path, is_valid_url_path, FileResolver};
use crate::ResponseBody;

// default capacity 64KiB
const DEFAULT_CAPACITY: usize = 65536;

/// Methods answered by the server, as sent in `Allow`.
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS, POST";

const HTML_TYPE: &str = "text/html; charset=UTF-8";
const CORS_MAX_AGE: &str = "60";

/// Service that serves files from the root directory and all its sub
/// directories.
///
/// URL paths without a matching file are tried with the configured
/// extensions, directories with the configured index files. When neither
/// matches, a directory gets an HTML listing if enabled.
///
/// An HTML error page with status `404 Not Found` will be returned if:
///
/// - The file doesn't exist
/// - Some segment of its path is excluded
/// - It is a link pointing outside of the root
/// - It is a directory and listings are disabled
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use servitsy::{ServeDir, ServerOptions};
///
/// let options = ServerOptions::with_root("/srv/site".into());
/// let service = ServeDir::new(Arc::new(options));
/// ```
#[derive(Debug, Clone)]
pub struct ServeDir {
    buf_chunk_size: usize,
    options: Arc<ServerOptions>,
    resolver: FileResolver,
}

/// A response plus what the access log wants to know about it.
struct Handled {
    response: Response<ResponseBody>,
    local_path: Option<String>,
    error: Option<String>,
}

impl Handled {
    fn new(response: Response<ResponseBody>) -> Self {
        Self {
            response,
            local_path: None,
            error: None,
        }
    }
}

impl ServeDir {
    /// Create a new [`ServeDir`].
    pub fn new(options: Arc<ServerOptions>) -> Self {
        Self {
            buf_chunk_size: DEFAULT_CAPACITY,
            resolver: FileResolver::new(options.clone()),
            options,
        }
    }

    /// Set a specific read buffer chunk size.
    ///
    /// The default capacity is 64kb.
    pub fn with_buf_chunk_size(mut self, chunk_size: usize) -> Self {
        self.buf_chunk_size = chunk_size;
        self
    }

    async fn handle(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Handled {
        let url_path = uri.path();

        if !is_supported(method) {
            return Handled::new(error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                method,
                url_path,
            ));
        }

        if method == Method::OPTIONS && url_path == "*" {
            let mut response = empty_response(StatusCode::NO_CONTENT);
            set_options_headers(response.headers_mut());
            self.set_cors_headers(method, headers, response.headers_mut());
            return Handled::new(response);
        }

        if !is_valid_url_path(url_path) {
            return Handled::new(error_response(StatusCode::BAD_REQUEST, method, url_path));
        }

        let result = self.resolver.find(url_path).await;
        let local_path = result.file.as_ref().map(|file| file.local_path.clone());

        let mut handled = match (result.status, result.file) {
            (StatusCode::OK, Some(file)) if file.kind == FsKind::File => {
                self.serve_file(method, headers, url_path, &file).await
            }
            (StatusCode::OK, Some(file)) if file.kind == FsKind::Dir => {
                self.serve_dir_list(method, url_path, &file).await
            }
            (status, _) => Handled::new(error_response(status, method, url_path)),
        };
        handled.local_path = local_path;
        handled
    }

    async fn serve_file(
        &self,
        method: &Method,
        headers: &HeaderMap,
        url_path: &str,
        file: &ResolvedFile,
    ) -> Handled {
        let FileOpened {
            file: handle,
            len,
            content_type,
        } = match open_file(&file.file_path).await {
            OpenOutcome::Opened(opened) => *opened,
            OpenOutcome::Failed(status, err) => {
                let mut handled = Handled::new(error_response(status, method, url_path));
                handled.error = Some(err);
                return handled;
            }
        };

        let mut response_headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&content_type.to_header_value()) {
            response_headers.insert(CONTENT_TYPE, value);
        }
        self.set_cors_headers(method, headers, &mut response_headers);
        self.set_rule_headers(&file.local_path, &mut response_headers);

        if method == Method::OPTIONS {
            set_options_headers(&mut response_headers);
            return Handled::new(response_with(
                StatusCode::NO_CONTENT,
                response_headers,
                empty_body(),
            ));
        }

        let gzip = use_gzip(self.options.gzip, &content_type, len, headers);
        if gzip {
            response_headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        } else {
            response_headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }

        let body = if method == Method::HEAD {
            empty_body()
        } else if gzip {
            ResponseBody::new(GzipReadBody::with_capacity(handle, self.buf_chunk_size))
        } else {
            ResponseBody::new(AsyncReadBody::with_capacity(handle, self.buf_chunk_size))
        };

        Handled::new(response_with(StatusCode::OK, response_headers, body))
    }

    async fn serve_dir_list(&self, method: &Method, url_path: &str, dir: &ResolvedFile) -> Handled {
        let entries = self.resolver.index(&dir.file_path).await;
        let decoded = decode_url_path(url_path).unwrap_or_else(|| url_path.to_owned());
        let html = pages::dir_list_page(&decoded, &dir.local_path, &entries);

        let mut response_headers = HeaderMap::new();
        response_headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_TYPE));

        if method == Method::OPTIONS {
            set_options_headers(&mut response_headers);
            return Handled::new(response_with(
                StatusCode::NO_CONTENT,
                response_headers,
                empty_body(),
            ));
        }

        response_headers.insert(CONTENT_LENGTH, HeaderValue::from(html.len()));
        let body = if method == Method::HEAD {
            empty_body()
        } else {
            body_from_bytes(Bytes::from(html))
        };
        Handled::new(response_with(StatusCode::OK, response_headers, body))
    }

    fn set_cors_headers(&self, method: &Method, request: &HeaderMap, response: &mut HeaderMap) {
        if !self.options.cors {
            return;
        }
        let Some(origin) = request.get(ORIGIN) else {
            return;
        };
        response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());

        let preflight =
            method == Method::OPTIONS && request.contains_key(ACCESS_CONTROL_REQUEST_METHOD);
        if !preflight {
            return;
        }
        response.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        response.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(CORS_MAX_AGE));

        let allow_headers = request
            .get_all(ACCESS_CONTROL_REQUEST_HEADERS)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|name| is_simple_token(name))
            .collect::<Vec<_>>()
            .join(", ");
        if !allow_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&allow_headers) {
                response.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }
    }

    fn set_rule_headers(&self, local_path: &str, response: &mut HeaderMap) {
        for (name, value) in file_headers(local_path, &self.options.headers, &[]) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.insert(name, value);
                }
                _ => warn!("skipping invalid header {:?}: {:?}", name, value),
            }
        }
    }
}

impl<ReqBody> Service<Request<ReqBody>> for ServeDir {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    #[inline]
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let this = self.clone();

        // The request body is never looked at.
        let (parts, body) = req.into_parts();
        drop(body);

        Box::pin(async move {
            let start = Local::now();
            let handled = this.handle(&parts.method, &parts.uri, &parts.headers).await;

            let entry = AccessLogEntry {
                status: handled.response.status(),
                method: parts.method,
                url_path: parts.uri.path().to_owned(),
                local_path: handled.local_path,
                start,
                close: Local::now(),
                error: handled.error,
            };
            if entry.status.is_server_error() || entry.error.is_some() {
                warn!(target: "servitsy::access", "{}", entry.render());
            } else {
                info!(target: "servitsy::access", "{}", entry.render());
            }

            Ok(handled.response)
        })
    }
}

fn is_supported(method: &Method) -> bool {
    method == Method::GET
        || method == Method::HEAD
        || method == Method::OPTIONS
        || method == Method::POST
}

fn is_simple_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn set_options_headers(headers: &mut HeaderMap) {
    headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
}

/// Builds the HTML error response for `status`.
///
/// `OPTIONS` requests get no page, `HEAD` requests get its headers only.
fn error_response(status: StatusCode, method: &Method, url_path: &str) -> Response<ResponseBody> {
    let mut headers = HeaderMap::new();
    if status == StatusCode::METHOD_NOT_ALLOWED {
        headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    }

    if method == Method::OPTIONS {
        set_options_headers(&mut headers);
        return response_with(status, headers, empty_body());
    }

    let html = pages::error_page(status, url_path);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_TYPE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(html.len()));
    let body = if method == Method::HEAD {
        empty_body()
    } else {
        body_from_bytes(Bytes::from(html))
    };
    response_with(status, headers, body)
}

fn response_with(
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
) -> Response<ResponseBody> {
    let mut res = Response::new(body);
    *res.status_mut() = status;
    *res.headers_mut() = headers;
    res
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    response_with(status, HeaderMap::new(), empty_body())
}

fn empty_body() -> ResponseBody {
    Empty::new().map_err(|err| match err {}).boxed_unsync()
}

fn body_from_bytes(bytes: Bytes) -> ResponseBody {
    Full::from(bytes).map_err(|err| match err {}).boxed_unsync()
}
