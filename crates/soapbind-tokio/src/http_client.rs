use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use soapbind_async::HttpClient;
use soapbind_core::http::{CONTENT_TYPE_HEADER, HttpBody, HttpRequest, HttpResponse, Method};
use tracing::{debug, info, instrument};

pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> anyhow::Result<Self> {
        info!(
            connect_timeout_secs = 30,
            read_timeout_secs = 60,
            "initializing ReqwestHttpClient with native-tls"
        );
        let client = reqwest::Client::builder()
            .use_native_tls()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build reqwest client")?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    #[instrument(name = "http_request", level = "debug", skip(self, request))]
    async fn send_request(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        info!(
            method = %request.method,
            url = %request.url,
            headers_count = request.headers.len(),
            body_length = request.body.as_ref().map_or(0, HttpBody::len),
            "Starting HTTP request"
        );

        let mut req_builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
            Method::Head => self.client.head(&request.url),
            Method::Patch => self.client.patch(&request.url),
            Method::Options => self.client.request(reqwest::Method::OPTIONS, &request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body.as_str().to_owned());
        }

        let response = req_builder
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status_code = response.status().as_u16();
        info!(status_code, "Received HTTP response");

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();

        let content_type = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
            .map(|(_, v)| v.to_lowercase())
            .unwrap_or_default();

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        let body = if text.is_empty() {
            HttpBody::None
        } else if content_type.contains("xml") {
            debug!("reading XML response as text");
            HttpBody::Xml(text)
        } else {
            debug!("reading response as text");
            HttpBody::Text(text)
        };

        info!(body_length = body.len(), "HTTP request completed successfully");

        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}
