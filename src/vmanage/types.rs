use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// --- vManage API types ---

/// Collection envelope returned by every dataservice listing endpoint.
#[derive(Debug, Deserialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
}

/// Device inventory record, keyed by system IP.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    pub uuid: String,
    #[serde(rename = "system-ip")]
    pub system_ip: String,
    #[serde(rename = "host-name", default)]
    pub host_name: String,
    #[serde(rename = "device-type", default)]
    pub device_type: String,
    #[serde(default)]
    pub reachability: String,
}

/// Device template catalog entry, keyed by template name.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRecord {
    #[serde(rename = "templateId")]
    pub template_id: String,
    #[serde(rename = "templateName")]
    pub template_name: String,
    #[serde(rename = "deviceType", default)]
    pub device_type: String,
}

/// Variables a device input set must carry before an attach is allowed.
pub const REQUIRED_VARIABLES: [&str; 7] = [
    "csv-status",
    "csv-deviceId",
    "csv-deviceIP",
    "csv-host-name",
    "//system/host-name",
    "//system/system-ip",
    "//system/site-id",
];

/// Variable set the controller computed for one (device, template) pair.
/// The keys vary with the template, so this stays a JSON map rather than a
/// fixed struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInput(pub Map<String, Value>);

impl DeviceInput {
    /// Required variables that are absent, null, or blank.
    pub fn missing_variables(&self) -> Vec<&'static str> {
        REQUIRED_VARIABLES
            .iter()
            .copied()
            .filter(|key| is_blank(self.0.get(*key)))
            .collect()
    }

    /// Completeness gate applied after generation and again before attach.
    pub fn ensure_complete(&self) -> Result<()> {
        match self.missing_variables().first() {
            Some(key) => Err(Error::Validation((*key).to_string())),
            None => Ok(()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

// --- Request payloads ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InputRequest<'a> {
    pub template_id: &'a str,
    pub device_ids: Vec<&'a str>,
    pub is_edited: bool,
    pub is_master_edited: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreviewRequest<'a> {
    pub template_id: &'a str,
    pub device: &'a DeviceInput,
    pub is_edited: bool,
    pub is_master_edited: bool,
}

/// Body for the attachfeature endpoint: a one-element template list, each
/// entry wrapping a one-element device list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
    pub device_template_list: Vec<DeviceTemplate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTemplate {
    pub template_id: String,
    pub device: Vec<DeviceInput>,
    pub is_edited: bool,
    pub is_master_edited: bool,
}

impl AttachRequest {
    /// One template bound to one device, the shape this tool always sends.
    pub fn single(template_id: &str, input: DeviceInput) -> Self {
        Self {
            device_template_list: vec![DeviceTemplate {
                template_id: template_id.to_string(),
                device: vec![input],
                is_edited: false,
                is_master_edited: false,
            }],
        }
    }
}

// --- Responses ---

/// Attach acknowledgement. The controller normally returns the process id
/// of the scheduled action; its absence is reported, not fatal.
#[derive(Debug, Deserialize)]
pub struct AttachResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Asynchronous action status as reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStatus {
    #[serde(default)]
    pub summary: ActionSummary,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionSummary {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Terminal-state classification of a reported action status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Done,
    Fail,
    InProgress,
}

impl ActionStatus {
    pub fn state(&self) -> ActionState {
        match self.summary.status.as_str() {
            "done" => ActionState::Done,
            "fail" => ActionState::Fail,
            _ => ActionState::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_input() -> DeviceInput {
        serde_json::from_value(json!({
            "csv-status": "complete",
            "csv-deviceId": "abc-123",
            "csv-deviceIP": "10.0.0.1",
            "csv-host-name": "branch-rtr-01",
            "//system/host-name": "branch-rtr-01",
            "//system/system-ip": "10.0.0.1",
            "//system/site-id": "100",
            "optional-extra": "kept"
        }))
        .unwrap()
    }

    #[test]
    fn complete_input_passes() {
        assert!(complete_input().ensure_complete().is_ok());
        assert!(complete_input().missing_variables().is_empty());
    }

    #[test]
    fn each_required_variable_is_enforced_when_absent() {
        for key in REQUIRED_VARIABLES {
            let mut input = complete_input();
            input.0.remove(key);
            let missing = input.missing_variables();
            assert_eq!(missing, vec![key], "removing {} should fail", key);
            assert!(matches!(input.ensure_complete(), Err(Error::Validation(k)) if k == key));
        }
    }

    #[test]
    fn each_required_variable_is_enforced_when_blank() {
        for key in REQUIRED_VARIABLES {
            let mut input = complete_input();
            input.0.insert(key.to_string(), json!(""));
            assert_eq!(input.missing_variables(), vec![key]);
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let mut input = complete_input();
        input.0.insert("csv-deviceId".to_string(), Value::Null);
        assert_eq!(input.missing_variables(), vec!["csv-deviceId"]);
    }

    #[test]
    fn attach_request_serializes_with_wire_key_names() {
        let request = AttachRequest::single("tmpl-1", complete_input());
        let value = serde_json::to_value(&request).unwrap();

        let list = value.get("deviceTemplateList").unwrap().as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["templateId"], "tmpl-1");
        assert_eq!(list[0]["isEdited"], false);
        assert_eq!(list[0]["isMasterEdited"], false);
        let devices = list[0]["device"].as_array().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0]["csv-deviceIP"], "10.0.0.1");
    }

    #[test]
    fn input_request_serializes_with_wire_key_names() {
        let request = InputRequest {
            template_id: "tmpl-1",
            device_ids: vec!["abc-123"],
            is_edited: false,
            is_master_edited: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["templateId"], "tmpl-1");
        assert_eq!(value["deviceIds"], json!(["abc-123"]));
        assert_eq!(value["isEdited"], false);
        assert_eq!(value["isMasterEdited"], false);
    }

    #[test]
    fn device_record_tolerates_unknown_controller_fields() {
        let envelope: DataResponse<DeviceRecord> = serde_json::from_value(json!({
            "data": [{
                "uuid": "abc-123",
                "system-ip": "10.0.0.1",
                "host-name": "branch-rtr-01",
                "device-type": "vedge",
                "reachability": "reachable",
                "version": "20.9.1",
                "board-serial": "12345"
            }]
        }))
        .unwrap();
        assert_eq!(envelope.data[0].uuid, "abc-123");
        assert_eq!(envelope.data[0].system_ip, "10.0.0.1");
    }

    #[test]
    fn action_state_classification() {
        let status = |s: &str| -> ActionStatus {
            serde_json::from_value(json!({"summary": {"status": s}})).unwrap()
        };
        assert_eq!(status("done").state(), ActionState::Done);
        assert_eq!(status("fail").state(), ActionState::Fail);
        assert_eq!(status("in_progress").state(), ActionState::InProgress);
        assert_eq!(status("scheduled").state(), ActionState::InProgress);
    }
}
