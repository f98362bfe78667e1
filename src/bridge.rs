//! Hue bridge client

use std::collections::BTreeMap;

use log::debug;
use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::config::Config;
use crate::models::StateCommand;
use crate::{Error, Result};

/// Raw reply to a state write
#[derive(Debug, Clone)]
pub struct ApplyReply {
    /// HTTP status code
    pub status: u16,

    /// Bridge response body, a list of `success` entries
    pub body: Value,
}

/// Operations the restore cycle needs from a lighting controller
pub trait Bridge {
    /// List every light the bridge knows, by index, in its native shape
    fn fetch_lights(&self) -> Result<BTreeMap<String, Value>>;

    /// Apply a partial state change to the light at `index`
    fn apply_state(&self, index: &str, command: &StateCommand) -> Result<ApplyReply>;

    /// Ask the bridge for a new application credential
    ///
    /// The bridge only grants this shortly after its link button was pressed.
    fn register_app(&self, device_type: &str) -> Result<String>;

    /// Remove our credential from the bridge whitelist
    fn unregister_app(&self) -> Result<()>;
}

/// [Bridge] over the Hue v1 REST API
pub struct HueBridge {
    client: Client,
    base: String,
    username: Option<String>,
}

impl HueBridge {
    /// Create a new client for the configured bridge
    ///
    /// The username is optional so that `auth` can run before one exists.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(HueBridge {
            client,
            base: format!("http://{}/api", config.bridge()?),
            username: config.username.clone(),
        })
    }

    fn user_url(&self, path: &str) -> Result<String> {
        match &self.username {
            Some(username) => Ok(format!("{}/{}/{}", self.base, username, path)),
            None => Err(Error::MissingConfig("bridge username (run `auth` first)")),
        }
    }
}

impl Bridge for HueBridge {
    fn fetch_lights(&self) -> Result<BTreeMap<String, Value>> {
        let url = self.user_url("lights")?;
        debug!("GET {url}");
        let body: Value = self.client.get(&url).send()?.json()?;
        parse_lights(body)
    }

    fn apply_state(&self, index: &str, command: &StateCommand) -> Result<ApplyReply> {
        let url = self.user_url(&format!("lights/{index}/state"))?;
        debug!("PUT {url}");
        let resp = self.client.put(&url).json(command).send()?;
        let status = resp.status();
        if !status.is_success() {
            // error pages from proxies and overloaded bridges are not JSON
            let text = resp.text().unwrap_or_default();
            return Err(Error::UnexpectedResponse(format!(
                "status {} for light {index}: {text}",
                status.as_u16()
            )));
        }
        let body: Value = resp.json()?;
        check_reply(&body)?;
        Ok(ApplyReply {
            status: status.as_u16(),
            body,
        })
    }

    fn register_app(&self, device_type: &str) -> Result<String> {
        debug!("POST {}", self.base);
        let body: Value = self
            .client
            .post(&self.base)
            .json(&json!({ "devicetype": device_type }))
            .send()?
            .json()?;
        parse_username(&body)
    }

    fn unregister_app(&self) -> Result<()> {
        let username = self
            .username
            .as_deref()
            .ok_or(Error::MissingConfig("bridge username"))?;
        let url = self.user_url(&format!("config/whitelist/{username}"))?;
        debug!("DELETE {url}");
        let body: Value = self.client.delete(&url).send()?.json()?;
        check_reply(&body)
    }
}

/// Interpret the body of `GET /lights`
///
/// An object maps index to light; a list is the bridge's error format.
fn parse_lights(body: Value) -> Result<BTreeMap<String, Value>> {
    match body {
        Value::Object(lights) => Ok(lights.into_iter().collect()),
        Value::Array(_) => {
            check_reply(&body)?;
            Err(Error::UnexpectedResponse(body.to_string()))
        }
        other => Err(Error::UnexpectedResponse(other.to_string())),
    }
}

/// Fail on the first `error` entry of a bridge reply list
fn check_reply(body: &Value) -> Result<()> {
    let entries = match body.as_array() {
        Some(entries) => entries,
        None => return Err(Error::UnexpectedResponse(body.to_string())),
    };
    for entry in entries {
        if let Some(err) = entry.get("error") {
            return Err(Error::bridge(
                err.get("type").and_then(Value::as_u64).unwrap_or(0) as u32,
                err.get("address").and_then(Value::as_str).unwrap_or(""),
                err.get("description").and_then(Value::as_str).unwrap_or(""),
            ));
        }
    }
    Ok(())
}

fn parse_username(body: &Value) -> Result<String> {
    check_reply(body)?;
    body.as_array()
        .and_then(|entries| {
            entries
                .iter()
                .find_map(|entry| entry.pointer("/success/username"))
        })
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::UnexpectedResponse(body.to_string()))
}
