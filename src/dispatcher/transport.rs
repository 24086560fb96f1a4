use std::collections::BTreeMap;
use std::time::Duration;

use failure::Error;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Method;

use super::{OutboundRequest, ReplayError, ReplayResponse, Transport};

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Redirects are never followed so `location` can be compared with the
    /// recording. Compressed replies are decoded before they are compared.
    pub fn new(timeout: Duration, verify_tls: bool) -> Result<HttpTransport, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .redirect(Policy::none())
            .build()?;

        Ok(HttpTransport { client })
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut header_map = HeaderMap::new();

    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                header_map.insert(name, value);
            }
            _ => warn!("Dropped recorded header that can not be sent: {}", name),
        }
    }

    header_map
}

fn from_header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut header_values: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        header_values
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    header_values
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutboundRequest) -> Result<ReplayResponse, ReplayError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|err| ReplayError::Network(format!("{} ({})", err, request.method)))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(to_header_map(&request.headers));

        if let Some(ref credentials) = request.basic_auth {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|err| ReplayError::Network(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let body = response
            .text()
            .map_err(|err| ReplayError::Network(err.to_string()))?;

        Ok(ReplayResponse {
            status,
            headers,
            body,
        })
    }
}
