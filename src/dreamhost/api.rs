use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use uuid::Uuid;

use super::{ApiError, Response};

/// Endpoint of the DreamHost API.
pub const DEFAULT_API_URL: &str = "https://api.dreamhost.com/";

/// Delivery of a form encoded request to the API.
pub trait Transport {
    /// POSTs `form` and returns the raw body of the reply.
    fn post_form(&self, form: &[(&str, &str)]) -> Result<String, ApiError>;
}

/// [Transport] over HTTPS using a blocking [reqwest] client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport for `url`.
    ///
    /// Without a `timeout` a request blocks until the server answers.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, form: &[(&str, &str)]) -> Result<String, ApiError> {
        let body = self
            .client
            .post(&self.url)
            .form(form)
            .send()?
            .error_for_status()?
            .text()?;

        Ok(body)
    }
}

/// Client of the DreamHost API.
///
/// Every command is requested at most once: its [Response] is kept for the
/// lifetime of the client and handed out again on later requests of the same
/// command, regardless of the extra parameters. The cache is not synchronized,
/// so the client is meant to be driven from a single thread.
pub struct Api<T = HttpTransport> {
    key: String,
    transport: T,
    cache: HashMap<String, Rc<Response>>,
}

impl Api<HttpTransport> {
    /// Create a client for the API at `url` authenticated with `key`.
    pub fn with_url(
        key: impl Into<String>,
        url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(url, timeout)?;
        Ok(Self::with_transport(key, transport))
    }
}

impl<T: Transport> Api<T> {
    pub fn with_transport(key: impl Into<String>, transport: T) -> Self {
        Self {
            key: key.into(),
            transport,
            cache: HashMap::new(),
        }
    }

    /// Request the API command `cmd`, adding `params` to the request.
    ///
    /// An error reply of the API is returned as an unsuccessful [Response],
    /// not as an [ApiError].
    pub fn request(&mut self, cmd: &str, params: &[(&str, &str)]) -> Result<Rc<Response>, ApiError> {
        match self.cache.entry(cmd.to_string()) {
            Entry::Occupied(cached) => {
                log::trace!(target: "dreamhost::api", "Reusing response of {cmd}");
                Ok(Rc::clone(cached.get()))
            }
            Entry::Vacant(vacant) => {
                let response = fetch(&self.transport, &self.key, cmd, params)?;
                Ok(Rc::clone(vacant.insert(Rc::new(response))))
            }
        }
    }
}

fn fetch<T: Transport>(
    transport: &T,
    key: &str,
    cmd: &str,
    params: &[(&str, &str)],
) -> Result<Response, ApiError> {
    let unique_id = Uuid::new_v4().to_string();
    log::debug!(target: "dreamhost::api", "Request {cmd} (unique_id={unique_id})");

    let mut form = vec![("cmd", cmd), ("key", key), ("unique_id", unique_id.as_str())];
    form.extend_from_slice(params);

    let body = transport.post_form(&form)?;
    let response = Response::parse(cmd, &body)?;
    if let Some(error) = response.error() {
        log::warn!(target: "dreamhost::api", "Error ({cmd}): {error}");
    }

    Ok(response)
}
