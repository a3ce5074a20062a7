//! Minimal HTTP/1.1 exchange codec used by the capturing proxy.
//!
//! Reads one request or response at a time off a buffered tokio stream and
//! reserializes it for forwarding. Bodies are always read to completion
//! (Content-Length, chunked, or close-delimited) so that a completed exchange
//! is fully captured before its interaction is emitted. Forwarded messages
//! are rewritten with an explicit `Content-Length`; the proxy never relays
//! chunked framing downstream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error_handling::types::ProxyError;

/// Upper bound on a request/response head, mirrored from common server
/// defaults. Heads beyond this are treated as malformed.
const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First matching header value, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Origin-form path component of the request target.
    pub fn path(&self) -> String {
        let origin = self.origin_form();
        match origin.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => origin,
        }
    }

    /// Query string without the leading `?`, when present.
    pub fn query(&self) -> Option<String> {
        self.origin_form()
            .split_once('?')
            .map(|(_, q)| q.to_string())
    }

    /// Destination authority for transparent proxying, resolved from the
    /// request itself: absolute-form target first, `Host` header otherwise.
    pub fn requested_authority(&self) -> Option<String> {
        if let Some(rest) = strip_scheme(&self.target) {
            let authority = rest.split(['/', '?']).next().unwrap_or("");
            if !authority.is_empty() {
                return Some(authority.to_string());
            }
        }
        self.header("host").map(|h| h.to_string())
    }

    /// Whether the client asked to close the connection after this exchange.
    pub fn wants_close(&self) -> bool {
        self.header("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }

    /// Serializes the request for forwarding to `authority`.
    ///
    /// The target connection is single-exchange: chunked framing is replaced
    /// with an explicit `Content-Length` and `Connection: close` is set.
    pub fn to_forward_bytes(&self, authority: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        out.extend_from_slice(
            format!("{} {} HTTP/1.1\r\n", self.method, self.origin_form()).as_bytes(),
        );
        out.extend_from_slice(format!("Host: {}\r\n", authority).as_bytes());
        for (name, value) in &self.headers {
            if is_hop_header(name) || name.eq_ignore_ascii_case("host") {
                continue;
            }
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if !self.body.is_empty() || has_body_semantics(&self.method) {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    fn origin_form(&self) -> String {
        match strip_scheme(&self.target) {
            Some(rest) => match rest.find(['/', '?']) {
                Some(idx) if rest.as_bytes()[idx] == b'/' => rest[idx..].to_string(),
                Some(idx) => format!("/{}", &rest[idx..]),
                None => "/".to_string(),
            },
            None => self.target.clone(),
        }
    }
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Serializes the response for the client side of the exchange.
    ///
    /// Framing is normalized to an explicit `Content-Length`; `close`
    /// reflects what the client connection will do after this exchange.
    pub fn to_client_bytes(&self, close: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status_code, self.reason).as_bytes(),
        );
        for (name, value) in &self.headers {
            if is_hop_header(name) {
                continue;
            }
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        if close {
            out.extend_from_slice(b"Connection: close\r\n");
        } else {
            out.extend_from_slice(b"Connection: keep-alive\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Response synthesized locally when the target cannot be reached.
    pub fn bad_gateway(detail: &str) -> Self {
        Self {
            status_code: 502,
            reason: "Bad Gateway".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: format!("apiwatch: upstream unreachable: {}\n", detail).into_bytes(),
        }
    }
}

/// Reads one full request off the stream.
///
/// Returns `Ok(None)` on clean EOF before the first byte of a request, which
/// is how keep-alive clients end a connection.
pub async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<HttpRequest>, ProxyError> {
    let request_line = match read_head_line(reader).await? {
        Some(line) => line,
        None => return Ok(None),
    };
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| ProxyError::MalformedExchange("empty request line".to_string()))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| ProxyError::MalformedExchange("request line missing target".to_string()))?
        .to_string();
    if parts.next().is_none() {
        return Err(ProxyError::MalformedExchange(
            "request line missing version".to_string(),
        ));
    }

    let headers = read_headers(reader).await?;
    let body = read_body(reader, &headers, false).await?;
    Ok(Some(HttpRequest {
        method,
        target,
        headers,
        body,
    }))
}

/// Reads one full response off the stream.
///
/// `head_request` suppresses body reads for HEAD exchanges, where the
/// response carries framing headers but no payload.
pub async fn read_response<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    head_request: bool,
) -> Result<HttpResponse, ProxyError> {
    let status_line = read_head_line(reader)
        .await?
        .ok_or_else(|| ProxyError::MalformedExchange("EOF before status line".to_string()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts
        .next()
        .unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ProxyError::MalformedExchange(format!(
            "bad status line: {}",
            status_line
        )));
    }
    let status_code: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ProxyError::MalformedExchange(format!("bad status line: {}", status_line)))?;
    let reason = parts.next().unwrap_or("").to_string();

    let headers = read_headers(reader).await?;
    let bodyless =
        head_request || status_code == 204 || status_code == 304 || (100..200).contains(&status_code);
    let body = if bodyless {
        Vec::new()
    } else {
        read_body(reader, &headers, true).await?
    };
    Ok(HttpResponse {
        status_code,
        reason,
        headers,
        body,
    })
}

async fn read_head_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<String>, ProxyError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.len() > MAX_HEAD_BYTES {
        return Err(ProxyError::MalformedExchange("head line too long".to_string()));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

async fn read_headers<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<(String, String)>, ProxyError> {
    let mut headers = Vec::new();
    let mut total = 0usize;
    loop {
        let line = read_head_line(reader)
            .await?
            .ok_or_else(|| ProxyError::MalformedExchange("EOF inside headers".to_string()))?;
        if line.is_empty() {
            return Ok(headers);
        }
        total += line.len();
        if total > MAX_HEAD_BYTES {
            return Err(ProxyError::MalformedExchange("headers too large".to_string()));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProxyError::MalformedExchange(format!("bad header line: {}", line)))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
}

async fn read_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    headers: &[(String, String)],
    close_delimited_fallback: bool,
) -> Result<Vec<u8>, ProxyError> {
    if let Some(te) = header_value(headers, "transfer-encoding") {
        if te.to_ascii_lowercase().contains("chunked") {
            return read_chunked_body(reader).await;
        }
    }
    if let Some(len) = header_value(headers, "content-length") {
        let len: usize = len
            .trim()
            .parse()
            .map_err(|_| ProxyError::MalformedExchange(format!("bad content-length: {}", len)))?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        return Ok(body);
    }
    if close_delimited_fallback {
        // Responses without framing headers run until the peer closes.
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;
        return Ok(body);
    }
    Ok(Vec::new())
}

async fn read_chunked_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProxyError> {
    let mut body = Vec::new();
    loop {
        let size_line = read_head_line(reader)
            .await?
            .ok_or_else(|| ProxyError::MalformedExchange("EOF inside chunked body".to_string()))?;
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| ProxyError::MalformedExchange(format!("bad chunk size: {}", size_line)))?;
        if size == 0 {
            // Trailer section: consume lines up to the terminating blank one.
            loop {
                let line = read_head_line(reader).await?.ok_or_else(|| {
                    ProxyError::MalformedExchange("EOF inside chunk trailers".to_string())
                })?;
                if line.is_empty() {
                    return Ok(body);
                }
            }
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..]).await?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await?;
    }
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn strip_scheme(target: &str) -> Option<&str> {
    target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
}

fn has_body_semantics(method: &str) -> bool {
    method.eq_ignore_ascii_case("POST")
        || method.eq_ignore_ascii_case("PUT")
        || method.eq_ignore_ascii_case("PATCH")
}

fn is_hop_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("connection")
        || name.eq_ignore_ascii_case("proxy-connection")
        || name.eq_ignore_ascii_case("transfer-encoding")
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("keep-alive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn reads_request_with_content_length() {
        let raw = b"POST /pets?sort=asc HTTP/1.1\r\nHost: example.test\r\nContent-Length: 9\r\n\r\n{\"id\": 1}";
        let mut reader = BufReader::new(Builder::new().read(raw).build());
        let req = read_request(&mut reader).await.unwrap().unwrap();

        assert_eq!(req.method, "POST");
        assert_eq!(req.path(), "/pets");
        assert_eq!(req.query().as_deref(), Some("sort=asc"));
        assert_eq!(req.header("host"), Some("example.test"));
        assert_eq!(req.body, b"{\"id\": 1}");
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        let mut reader = BufReader::new(Cursor::new(&b""[..]));
        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_chunked_response() {
        let raw =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        let mut reader = BufReader::new(Builder::new().read(raw).build());
        let resp = read_response(&mut reader, false).await.unwrap();

        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, b"hello world");
    }

    #[tokio::test]
    async fn reads_close_delimited_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nuntil eof";
        let mut reader = BufReader::new(Cursor::new(&raw[..]));
        let resp = read_response(&mut reader, false).await.unwrap();
        assert_eq!(resp.body, b"until eof");
    }

    #[tokio::test]
    async fn head_response_has_no_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 42\r\n\r\n";
        let mut reader = BufReader::new(Builder::new().read(raw).build());
        let resp = read_response(&mut reader, true).await.unwrap();
        assert!(resp.body.is_empty());
    }

    #[test]
    fn absolute_form_target_resolves_authority_and_path() {
        let req = HttpRequest {
            method: "GET".to_string(),
            target: "http://upstream.test:8080/a/b?x=1".to_string(),
            headers: vec![("Host".to_string(), "ignored.test".to_string())],
            body: Vec::new(),
        };
        assert_eq!(req.requested_authority().as_deref(), Some("upstream.test:8080"));
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query().as_deref(), Some("x=1"));
    }

    #[test]
    fn origin_form_falls_back_to_host_header() {
        let req = HttpRequest {
            method: "GET".to_string(),
            target: "/a".to_string(),
            headers: vec![("Host".to_string(), "svc.test:4001".to_string())],
            body: Vec::new(),
        };
        assert_eq!(req.requested_authority().as_deref(), Some("svc.test:4001"));
    }

    #[test]
    fn forward_bytes_rewrites_framing() {
        let req = HttpRequest {
            method: "POST".to_string(),
            target: "/pets".to_string(),
            headers: vec![
                ("Host".to_string(), "client-facing.test".to_string()),
                ("Transfer-Encoding".to_string(), "chunked".to_string()),
                ("X-Custom".to_string(), "kept".to_string()),
            ],
            body: b"abc".to_vec(),
        };
        let bytes = req.to_forward_bytes("127.0.0.1:4001");
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("POST /pets HTTP/1.1\r\n"));
        assert!(text.contains("Host: 127.0.0.1:4001\r\n"));
        assert!(text.contains("X-Custom: kept\r\n"));
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(!text.contains("chunked"));
        assert!(!text.contains("client-facing.test"));
        assert!(text.ends_with("\r\nabc"));
    }
}
