use std::fmt::Display;

use base64::Engine;
use url::Url;

use crate::SoapCoreError;

pub const SOAP_ACTION_HEADER: &str = "SOAPAction";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    Xml(String),
    Text(String),
    None,
}

impl HttpBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Xml(content) | Self::Text(content) => content.is_empty(),
            Self::None => true,
        }
    }

    /// Returns the length of the body content in bytes
    pub fn len(&self) -> usize {
        match self {
            Self::Xml(content) | Self::Text(content) => content.len(),
            Self::None => 0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Xml(content) | Self::Text(content) => content,
            Self::None => "",
        }
    }
}

fn find_header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL on the client side; origin-form (`/path?query`) is accepted too.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn body_str(&self) -> &str {
        self.body.as_ref().map_or("", HttpBody::as_str)
    }

    pub fn target(&self) -> Result<Url, SoapCoreError> {
        let parsed = match Url::parse(&self.url) {
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/").and_then(|base| base.join(&self.url))
            }
            other => other,
        };
        parsed.map_err(|source| SoapCoreError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }

    pub fn path(&self) -> Result<String, SoapCoreError> {
        Ok(self.target()?.path().to_owned())
    }

    /// Whether the query string carries `name`, with or without a value (`?wsdl`).
    pub fn has_query_flag(&self, name: &str) -> bool {
        self.target().is_ok_and(|url| {
            url.query_pairs()
                .any(|(key, _)| key.eq_ignore_ascii_case(name))
        })
    }

    /// The SOAP action of the request: the `SOAPAction` header (SOAP 1.1) or the
    /// `action` parameter of the content type (SOAP 1.2). Empty actions count as none.
    pub fn soap_action(&self) -> Option<String> {
        let from_header = self
            .header(SOAP_ACTION_HEADER)
            .map(|value| value.trim().trim_matches('"'));
        let from_content_type = || self.header(CONTENT_TYPE_HEADER).and_then(action_parameter);

        from_header
            .or_else(from_content_type)
            .filter(|action| !action.is_empty())
            .map(str::to_owned)
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

impl HttpResponse {
    pub fn xml(status_code: u16, content_type: &str, body: String) -> Self {
        Self {
            status_code,
            headers: vec![(CONTENT_TYPE_HEADER.to_owned(), content_type.to_owned())],
            body: HttpBody::Xml(body),
        }
    }

    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: vec![(
                CONTENT_TYPE_HEADER.to_owned(),
                "text/plain; charset=utf-8".to_owned(),
            )],
            body: HttpBody::Text(body.into()),
        }
    }

    pub fn empty(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
            body: HttpBody::None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// The media type of a `Content-Type` value, without parameters.
pub fn media_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
}

/// The `action` parameter of a SOAP 1.2 content type, unquoted.
pub fn action_parameter(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("action")
            .then(|| value.trim().trim_matches('"'))
    })
}

#[derive(Debug)]
pub struct HttpBuilder {
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
}

impl HttpBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: vec![],
        }
    }

    pub fn with_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_auth_header(&mut self, header: String) -> &mut Self {
        self.with_header("Authorization", header)
    }

    /// Adds `Authorization: Basic <base64(username:password)>`.
    /// WARNING: never log the resulting header value.
    pub fn with_basic(&mut self, username: &str, password: &str) -> &mut Self {
        let creds = format!("{username}:{password}");
        let b64 = base64::engine::general_purpose::STANDARD.encode(creds.as_bytes());
        self.with_auth_header(format!("Basic {b64}"))
    }

    fn build_headers(&mut self, content_type: &str, body: &HttpBody) -> Vec<(String, String)> {
        let mut headers = vec![
            (CONTENT_TYPE_HEADER.to_owned(), content_type.to_owned()),
            ("Content-Length".to_owned(), body.len().to_string()),
        ];
        headers.append(&mut self.headers);
        headers
    }

    pub fn post(&mut self, content_type: &str, body: HttpBody) -> HttpRequest {
        HttpRequest {
            method: Method::Post,
            url: self.url.clone(),
            headers: self.build_headers(content_type, &body),
            body: Some(body),
        }
    }

    pub fn get(&mut self) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: self.url.clone(),
            headers: std::mem::take(&mut self.headers),
            body: None,
        }
    }
}
