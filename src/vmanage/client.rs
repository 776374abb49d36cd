use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ControllerConfig;
use crate::error::{Error, Result};

use super::types::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_COOKIE: &str = "JSESSIONID";
const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Authenticated session against one vManage controller.
///
/// Holds the cookie jar established at login plus the anti-forgery token
/// attached to every subsequent request. TLS certificate validation is
/// disabled on every request: lab controllers ship self-signed
/// certificates.
#[derive(Debug)]
pub struct VmanageClient {
    base_url: String,
    host: String,
    token: String,
    client: Client,
}

/// Pacing and bound for [`VmanageClient::monitor_action`].
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

/// Terminal result of watching an asynchronous device action.
#[derive(Debug)]
pub enum ActionOutcome {
    Completed(ActionStatus),
    /// The poll budget ran out before the controller reported a terminal
    /// state. Carries the last status observed, if any poll succeeded.
    TimedOut {
        attempts: u32,
        last: Option<ActionStatus>,
    },
}

impl VmanageClient {
    /// Authenticate against the controller and capture the session.
    /// Fails fast: no further requests are issued once login or the token
    /// fetch is rejected.
    pub async fn login(config: &ControllerConfig) -> Result<Self> {
        Self::login_with_base(config.base_url(), config.host.clone(), &config.username, &config.password).await
    }

    pub(crate) async fn login_with_base(
        base_url: String,
        host: String,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let response = client
            .post(format!("{}/j_security_check", base_url))
            .form(&[("j_username", username), ("j_password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Authentication(format!(
                "login returned status {}",
                response.status()
            )));
        }
        if !response.cookies().any(|c| c.name() == SESSION_COOKIE) {
            return Err(Error::Authentication(
                "login response set no session cookie".to_string(),
            ));
        }

        let token_response = client
            .get(format!("{}/dataservice/client/token", base_url))
            .send()
            .await?;
        if !token_response.status().is_success() {
            return Err(Error::Authentication(format!(
                "anti-forgery token fetch returned status {}",
                token_response.status()
            )));
        }
        let token = token_response.text().await?;

        Ok(Self {
            base_url,
            host,
            token,
            client,
        })
    }

    /// Controller hostname, for operator-facing GUI links.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &'static str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header(XSRF_HEADER, &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request { context, status, body });
        }
        Ok(response.json().await?)
    }

    async fn post_json<T, B>(&self, path: &str, body: &B, context: &'static str) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let response = self
            .client
            .post(self.url(path))
            .header(XSRF_HEADER, &self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request { context, status, body });
        }
        Ok(response.json().await?)
    }

    /// Fetch the full device inventory.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let response: DataResponse<DeviceRecord> =
            self.get_json("/dataservice/device", "device listing").await?;
        Ok(response.data)
    }

    /// Fetch the device template catalog.
    pub async fn list_templates(&self) -> Result<Vec<TemplateRecord>> {
        let response: DataResponse<TemplateRecord> = self
            .get_json("/dataservice/template/device", "template listing")
            .await?;
        Ok(response.data)
    }

    /// Ask the controller to compute the variable set `device_uuid` needs
    /// to render the template. The controller answers with a list; this
    /// tool always requests a single device, so the first element is the
    /// one that matters.
    pub async fn generate_device_input(
        &self,
        template_id: &str,
        device_uuid: &str,
    ) -> Result<DeviceInput> {
        let request = InputRequest {
            template_id,
            device_ids: vec![device_uuid],
            is_edited: false,
            is_master_edited: false,
        };
        let response: DataResponse<DeviceInput> = self
            .post_json(
                "/dataservice/template/device/config/input",
                &request,
                "device input generation",
            )
            .await?;

        response.data.into_iter().next().ok_or_else(|| Error::Request {
            context: "device input generation",
            status: StatusCode::OK,
            body: "controller returned an empty input set".to_string(),
        })
    }

    /// Render the final configuration text for review. The body comes back
    /// verbatim; nothing here parses it.
    pub async fn preview_config(&self, template_id: &str, input: &DeviceInput) -> Result<String> {
        let request = PreviewRequest {
            template_id,
            device: input,
            is_edited: false,
            is_master_edited: false,
        };
        let response = self
            .client
            .post(self.url("/dataservice/template/device/config/config"))
            .header(XSRF_HEADER, &self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Request {
                context: "config preview",
                status,
                body,
            });
        }
        Ok(body)
    }

    /// Validate every input set in the request and submit the attach.
    /// Confirmation is the caller's job; nothing here prompts.
    pub async fn attach_feature(&self, request: &AttachRequest) -> Result<AttachResponse> {
        for entry in &request.device_template_list {
            for input in &entry.device {
                input.ensure_complete()?;
            }
        }

        let response = self
            .client
            .post(self.url("/dataservice/template/device/config/attachfeature"))
            .header(XSRF_HEADER, &self.token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Request {
                context: "template attach",
                status,
                body,
            });
        }
        serde_json::from_str(&body).map_err(|_| Error::Request {
            context: "template attach",
            status,
            body,
        })
    }

    /// One status poll for an asynchronous device action.
    pub async fn action_status(&self, process_id: &str) -> Result<ActionStatus> {
        self.get_json(
            &format!("/dataservice/device/action/status/{}", process_id),
            "device action status",
        )
        .await
    }

    /// Poll the action status until the controller reports a terminal
    /// state or the poll budget runs out. Exactly one status request per
    /// attempt, with a sleep between attempts.
    pub async fn monitor_action(
        &self,
        process_id: &str,
        options: &PollOptions,
    ) -> Result<ActionOutcome> {
        let mut last = None;

        for attempt in 1..=options.max_attempts {
            let status = self.action_status(process_id).await?;
            match status.state() {
                ActionState::Done => return Ok(ActionOutcome::Completed(status)),
                ActionState::Fail => {
                    return Err(Error::ActionFailed {
                        process_id: process_id.to_string(),
                        status: serde_json::to_value(&status).unwrap_or(Value::Null),
                    });
                }
                ActionState::InProgress => {
                    tracing::info!(
                        "action {} still '{}' ({}/{} polls)",
                        process_id,
                        status.summary.status,
                        attempt,
                        options.max_attempts
                    );
                    last = Some(status);
                }
            }
            if attempt < options.max_attempts {
                tokio::time::sleep(options.interval).await;
            }
        }

        Ok(ActionOutcome::TimedOut {
            attempts: options.max_attempts,
            last,
        })
    }
}
