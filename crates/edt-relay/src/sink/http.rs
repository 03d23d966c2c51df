//! HTTP processing sink
//!
//! Posts one `multipart/form-data` request per call with the blocking
//! `reqwest` client. The client owns a private runtime, so an [`HttpSink`]
//! must be created and dropped outside of any async context.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::Url;
use tracing::debug;

use super::{FormFile, Sink, SinkError, SinkReply};
use crate::config::SinkSettings;

pub struct HttpSink {
    client: Client,
    url: Url,
}

impl HttpSink {
    pub fn new(settings: &SinkSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("edt-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: settings.url.clone(),
        })
    }
}

impl Sink for HttpSink {
    fn post(&self, files: Vec<FormFile>) -> Result<SinkReply, SinkError> {
        let mut form = Form::new();
        for file in files {
            form = form.part(file.field, Part::bytes(file.contents).file_name(file.file_name));
        }

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SinkError::ResponseBody(e.to_string()))?;
        debug!("Sink answered {} ({} bytes)", status, body.len());

        Ok(SinkReply { status, body })
    }
}
