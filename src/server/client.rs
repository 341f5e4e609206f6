use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::command::{Command, DecodeError, decode_poll_body};
use crate::config::{DeviceConfig, ServerConfig};
use crate::playback::PlaybackOutcome;

use super::{Registration, ServerError};

/// Keep-alive HTTP session against the command server.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: Client,
    config: ServerConfig,
    device_id: String,
}

fn build_http(config: &ServerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(config.request_timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

impl ServerClient {
    pub fn new(config: &ServerConfig, device_id: &str) -> Result<Self, ServerError> {
        Ok(Self {
            http: build_http(config)?,
            config: config.clone(),
            device_id: device_id.to_string(),
        })
    }

    /// Drop every pooled connection and start over with a fresh client.
    pub fn reconnect(&mut self) -> Result<(), ServerError> {
        self.http = build_http(&self.config)?;
        Ok(())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// URL of a server-hosted audio resource.
    pub fn audio_url(&self, resource_id: &str) -> String {
        self.endpoint(&format!("audio_raw/{resource_id}"))
    }

    /// Announce this device. Any HTTP answer counts as a reply; only
    /// transport failures are errors.
    pub async fn register(&self, device: &DeviceConfig) -> Result<Registration, ServerError> {
        let response = self
            .http
            .post(self.endpoint("register"))
            .timeout(self.config.request_timeout)
            .form(&[
                ("device_id", device.id.as_str()),
                ("nombre", device.name.as_str()),
                ("ubicacion", device.location.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Registration { status, body })
    }

    /// Ask the server for queued commands.
    pub async fn poll(&self) -> Result<Vec<Command>, ServerError> {
        let url = self.endpoint(&format!("poll/{}", self.device_id));
        let response = self
            .http
            .get(url)
            .timeout(self.config.poll_timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ServerError::Status(response.status().as_u16()));
        }

        let limit = self.config.max_body_bytes;
        let body = read_bounded(response, limit).await?;
        debug!("Poll body: {} bytes", body.len());
        Ok(decode_poll_body(&body, limit)?)
    }

    /// Open an audio stream. The body is left unread for the caller.
    pub async fn open_audio(&self, url: &str) -> Result<Response, ServerError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ServerError::Status(response.status().as_u16()));
        }
        Ok(response)
    }

    /// Report how playback of `resource_id` ended. Returns the HTTP status
    /// on a 2xx answer.
    pub async fn confirm(
        &self,
        resource_id: &str,
        outcome: PlaybackOutcome,
    ) -> Result<u16, ServerError> {
        let url = self.endpoint(&format!("confirmar/{}", self.device_id));
        let response = self
            .http
            .post(url)
            .timeout(self.config.request_timeout)
            .form(&[("audio_id", resource_id), ("status", outcome.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Status(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

/// Read a response body chunk by chunk, refusing to buffer more than
/// `limit` bytes.
async fn read_bounded(mut response: Response, limit: usize) -> Result<Vec<u8>, ServerError> {
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(DecodeError::Oversized { limit }.into());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(DecodeError::Oversized { limit }.into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ServerConfig {
        ServerConfig {
            base_url: base_url.to_string(),
            poll_interval: Duration::from_millis(200),
            poll_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(8),
            max_body_bytes: 2048,
        }
    }

    #[test]
    fn endpoints_join_onto_base_url() {
        let client = ServerClient::new(&config("http://server/esp32/"), "esp32_1").unwrap();
        assert_eq!(client.endpoint("register"), "http://server/esp32/register");
        assert_eq!(client.audio_url("abc"), "http://server/esp32/audio_raw/abc");

        let client = ServerClient::new(&config("http://server"), "esp32_1").unwrap();
        assert_eq!(client.endpoint("poll/esp32_1"), "http://server/poll/esp32_1");
    }

    #[tokio::test]
    async fn non_200_poll_is_a_status_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/poll/esp32_1")
            .with_status(204)
            .create_async()
            .await;

        let client = ServerClient::new(&config(&server.url()), "esp32_1").unwrap();
        let err = client.poll().await.unwrap_err();
        assert!(matches!(err, ServerError::Status(204)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn oversized_poll_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(r#"{{"comandos":[],"pad":"{}"}}"#, "x".repeat(4096));
        server
            .mock("GET", "/poll/esp32_1")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = ServerClient::new(&config(&server.url()), "esp32_1").unwrap();
        let err = client.poll().await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Decode(DecodeError::Oversized { limit: 2048 })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_as_such() {
        // Nothing listens on port 9 of localhost in the test environment.
        let client = ServerClient::new(&config("http://127.0.0.1:9"), "esp32_1").unwrap();
        let err = client.poll().await.unwrap_err();
        assert!(err.is_unreachable(), "{err:?}");
    }

    #[tokio::test]
    async fn confirm_posts_form_and_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/confirmar/esp32_1")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("audio_id".into(), "abc".into()),
                mockito::Matcher::UrlEncoded("status".into(), "error".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let client = ServerClient::new(&config(&server.url()), "esp32_1").unwrap();
        let status = client.confirm("abc", PlaybackOutcome::Error).await.unwrap();
        assert_eq!(status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn registration_reply_is_returned_for_any_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/register")
            .match_body(mockito::Matcher::UrlEncoded(
                "device_id".into(),
                "esp32_1".into(),
            ))
            .with_status(409)
            .with_body("already registered")
            .create_async()
            .await;

        let client = ServerClient::new(&config(&server.url()), "esp32_1").unwrap();
        let device = DeviceConfig {
            id: "esp32_1".into(),
            name: "ESP32-Test".into(),
            location: "Lab".into(),
        };
        let reply = client.register(&device).await.unwrap();
        assert_eq!(reply.status, 409);
        assert_eq!(reply.body, "already registered");
    }
}
