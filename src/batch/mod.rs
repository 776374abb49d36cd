use std::path::Path;

use serde::Deserialize;

use crate::console::Console;
use crate::error::{Error, Result};
use crate::vmanage::client::{ActionOutcome, PollOptions, VmanageClient};
use crate::vmanage::types::{AttachRequest, DeviceRecord, TemplateRecord};

/// One roster entry: which template goes on which device.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRow {
    pub device_ip: String,
    pub template_name: String,
}

/// Read the device/template roster from a headered CSV file.
pub fn read_rows(path: &Path) -> Result<Vec<BatchRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Whether device/template collections are fetched once or per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMode {
    /// Fetch each collection once and reuse it for every row.
    PerBatch,
    /// Re-fetch for every row, trading requests for freshness.
    PerRow,
}

/// Lookup layer over the controller's device and template collections.
/// Lookups are linear scans over the full collection; the controller
/// offers no server-side filter for these endpoints.
pub struct Catalog<'a> {
    client: &'a VmanageClient,
    mode: CatalogMode,
    devices: Option<Vec<DeviceRecord>>,
    templates: Option<Vec<TemplateRecord>>,
}

impl<'a> Catalog<'a> {
    pub fn new(client: &'a VmanageClient, mode: CatalogMode) -> Self {
        Self {
            client,
            mode,
            devices: None,
            templates: None,
        }
    }

    async fn devices(&mut self) -> Result<&[DeviceRecord]> {
        if self.mode == CatalogMode::PerRow || self.devices.is_none() {
            self.devices = Some(self.client.list_devices().await?);
        }
        Ok(self.devices.as_deref().unwrap_or_default())
    }

    async fn templates(&mut self) -> Result<&[TemplateRecord]> {
        if self.mode == CatalogMode::PerRow || self.templates.is_none() {
            self.templates = Some(self.client.list_templates().await?);
        }
        Ok(self.templates.as_deref().unwrap_or_default())
    }

    /// First device whose system IP matches, or NotFound.
    pub async fn device_by_ip(&mut self, ip: &str) -> Result<DeviceRecord> {
        self.devices()
            .await?
            .iter()
            .find(|d| d.system_ip == ip)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "device",
                key: ip.to_string(),
            })
    }

    /// First template whose name matches, or NotFound.
    pub async fn template_by_name(&mut self, name: &str) -> Result<TemplateRecord> {
        self.templates()
            .await?
            .iter()
            .find(|t| t.template_name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "template",
                key: name.to_string(),
            })
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub catalog_mode: CatalogMode,
    pub poll: PollOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            catalog_mode: CatalogMode::PerBatch,
            poll: PollOptions::default(),
        }
    }
}

/// How a single roster row ended.
#[derive(Debug)]
pub enum RowOutcome {
    /// Template submitted. The process id is absent when the controller
    /// did not return one; monitoring is skipped in that case.
    Attached { process_id: Option<String> },
    /// The operator declined one of the confirmation checkpoints.
    Cancelled,
    /// The attach went through but the action never reached a terminal
    /// state within the poll budget.
    TimedOut { attempts: u32 },
}

/// Aggregated result of a batch run. Row failures land in `errors`; they
/// never abort the batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub attached: usize,
    pub cancelled: usize,
    pub errors: Vec<String>,
}

/// Browser link to the controller's push-status view for a process.
pub fn gui_status_url(host: &str, process_id: &str) -> String {
    format!(
        "https://{}/#/app/device/status?activity=push_feature_template_configuration&pid={}",
        host, process_id
    )
}

/// Drive the attach workflow for every roster row in order. Each row is
/// resolved, previewed, confirmed, attached, and monitored; whatever goes
/// wrong is recorded and the next row still runs.
pub async fn run(
    client: &VmanageClient,
    rows: &[BatchRow],
    options: &BatchOptions,
    console: &mut dyn Console,
) -> Result<BatchSummary> {
    let mut catalog = Catalog::new(client, options.catalog_mode);
    let mut summary = BatchSummary::default();

    for row in rows {
        tracing::info!(
            "processing device {} with template '{}'",
            row.device_ip,
            row.template_name
        );
        match process_row(client, &mut catalog, row, options, console).await {
            Ok(RowOutcome::Attached { process_id }) => {
                if let Some(pid) = process_id {
                    tracing::info!("device {} attached (process {})", row.device_ip, pid);
                }
                summary.attached += 1;
            }
            Ok(RowOutcome::Cancelled) => {
                println!("Operation cancelled by user.");
                summary.cancelled += 1;
            }
            Ok(RowOutcome::TimedOut { attempts }) => {
                summary.errors.push(format!(
                    "{} ({}): action still pending after {} polls",
                    row.device_ip, row.template_name, attempts
                ));
            }
            Err(e) => {
                let stage = match &e {
                    Error::NotFound { .. } => "lookup",
                    Error::Validation(_) => "input validation",
                    Error::ActionFailed { .. } => "provisioning",
                    _ => "request",
                };
                tracing::error!(
                    "{} failed for {} ('{}'): {}",
                    stage,
                    row.device_ip,
                    row.template_name,
                    e
                );
                summary
                    .errors
                    .push(format!("{} ({}): {}", row.device_ip, row.template_name, e));
            }
        }
    }

    Ok(summary)
}

async fn process_row(
    client: &VmanageClient,
    catalog: &mut Catalog<'_>,
    row: &BatchRow,
    options: &BatchOptions,
    console: &mut dyn Console,
) -> Result<RowOutcome> {
    let device = catalog.device_by_ip(&row.device_ip).await?;
    tracing::info!(
        "resolved {} to {} '{}' (uuid {}, {})",
        row.device_ip,
        device.device_type,
        device.host_name,
        device.uuid,
        device.reachability
    );
    let template = catalog.template_by_name(&row.template_name).await?;
    tracing::info!(
        "resolved template '{}' to {} ({})",
        row.template_name,
        template.template_id,
        template.device_type
    );

    tracing::info!("generating input variables for {}", device.system_ip);
    let input = client
        .generate_device_input(&template.template_id, &device.uuid)
        .await?;
    input.ensure_complete()?;
    if let Some(host_name) = input.get("csv-host-name").and_then(|v| v.as_str()) {
        tracing::info!("input generated for {} ({} variables)", host_name, input.0.len());
    }

    let preview = client.preview_config(&template.template_id, &input).await?;
    println!("Configuration preview for {}:", row.device_ip);
    println!("{}", preview);

    if !console.confirm("Does the configuration look good? Do you want to proceed?")? {
        return Ok(RowOutcome::Cancelled);
    }

    let request = AttachRequest::single(&template.template_id, input);
    println!("Payload to attach template:");
    println!("{}", serde_json::to_string_pretty(&request)?);

    if !console.confirm("Do you want to proceed with this payload?")? {
        return Ok(RowOutcome::Cancelled);
    }

    let attach = client.attach_feature(&request).await?;
    let Some(process_id) = attach.id else {
        println!("No process ID returned from attach response.");
        return Ok(RowOutcome::Attached { process_id: None });
    };

    let status_url = format!(
        "{}/dataservice/device/action/status/{}",
        client.base_url(),
        process_id
    );
    println!("Monitoring device action status at: {}", status_url);
    println!("GUI URL: {}", gui_status_url(client.host(), &process_id));

    match client.monitor_action(&process_id, &options.poll).await? {
        ActionOutcome::Completed(status) => {
            println!("Device action status:");
            println!("{}", serde_json::to_string_pretty(&status)?);
            println!("Final status URL: {}", status_url);
            Ok(RowOutcome::Attached {
                process_id: Some(process_id),
            })
        }
        ActionOutcome::TimedOut { attempts, last } => {
            if let Some(last) = last {
                println!("Last observed action status:");
                println!("{}", serde_json::to_string_pretty(&last)?);
            }
            Ok(RowOutcome::TimedOut { attempts })
        }
    }
}
