//! # Compute API data types
//!
//! Structs modeling the JSON bodies of the instances API: responses for
//! listing, and the request payload for `instances.insert`. Only the fields
//! the CLI reads or writes are modeled; `describe` passes the raw response
//! through untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::operations::Operation;

/// An instance as the API returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: Option<String>,
    pub name: String,
    /// Full machine type URL.
    #[serde(rename = "machineType")]
    pub machine_type: Option<String>,
    /// Lifecycle state: `RUNNING`, `TERMINATED`, ...
    pub status: Option<String>,
    /// Full zone URL.
    pub zone: Option<String>,
    #[serde(rename = "creationTimestamp")]
    pub creation_timestamp: Option<String>,
    #[serde(rename = "networkInterfaces", default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Instance {
    /// The external IP of the first NAT access config, if any.
    pub fn external_ip(&self) -> Option<&str> {
        self.network_interfaces
            .iter()
            .flat_map(|ni| &ni.access_configs)
            .find_map(|ac| ac.nat_ip.as_deref())
    }

    /// The primary internal IP, if any.
    pub fn internal_ip(&self) -> Option<&str> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.network_ip.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: Option<String>,
    pub network: Option<String>,
    pub subnetwork: Option<String>,
    #[serde(rename = "networkIP")]
    pub network_ip: Option<String>,
    #[serde(rename = "accessConfigs", default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub name: Option<String>,
    #[serde(rename = "natIP")]
    pub nat_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InstanceListResponse {
    #[serde(default)]
    pub items: Vec<Instance>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Response of `instances.aggregatedList`: instances of every zone, keyed
/// by scope (`zones/us-central1-a`). Scopes without instances carry only a
/// warning, which deserializes to an empty list here.
#[derive(Debug, Deserialize)]
pub struct InstanceAggregatedListResponse {
    #[serde(default)]
    pub items: HashMap<String, ScopedInstances>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScopedInstances {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
pub struct OperationListResponse {
    #[serde(default)]
    pub items: Vec<Operation>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Request body for `instances.insert`. Optional blocks are skipped when
/// empty so the payload stays minimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub name: String,
    /// Full machine type URL (`projects/{p}/zones/{z}/machineTypes/{m}`).
    #[serde(rename = "machineType")]
    pub machine_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub disks: Vec<AttachedDisk>,
    #[serde(rename = "networkInterfaces")]
    pub network_interfaces: Vec<NetworkInterfaceRequest>,
    #[serde(skip_serializing_if = "Metadata::is_empty", default)]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub labels: HashMap<String, String>,
    pub scheduling: Scheduling,
    #[serde(skip_serializing_if = "Tags::is_empty", default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedDisk {
    /// Whether the disk is deleted with the instance.
    #[serde(rename = "autoDelete")]
    pub auto_delete: bool,
    pub boot: bool,
    #[serde(rename = "initializeParams")]
    pub initialize_params: InitializeParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Disk size as a decimal string, per the API.
    #[serde(rename = "diskSizeGb")]
    pub disk_size_gb: String,
    /// Full disk type URL.
    #[serde(rename = "diskType")]
    pub disk_type: String,
    /// Image path, e.g. `projects/debian-cloud/global/images/family/debian-12`.
    #[serde(rename = "sourceImage")]
    pub source_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterfaceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
    /// Empty means no external IP.
    #[serde(rename = "accessConfigs", skip_serializing_if = "Vec::is_empty", default)]
    pub access_configs: Vec<AccessConfigRequest>,
    #[serde(rename = "stackType")]
    pub stack_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfigRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub config_type: String,
    #[serde(rename = "networkTier")]
    pub network_tier: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduling {
    /// `STANDARD` or `SPOT`.
    #[serde(rename = "provisioningModel")]
    pub provisioning_model: String,
    #[serde(rename = "automaticRestart")]
    pub automatic_restart: bool,
    /// Required for spot instances; what happens on preemption.
    #[serde(
        rename = "instanceTerminationAction",
        skip_serializing_if = "Option::is_none"
    )]
    pub instance_termination_action: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub items: Vec<String>,
}

impl Tags {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_instance_addresses() {
        let instance: Instance = serde_json::from_value(serde_json::json!({
            "id": "42",
            "name": "vm-1",
            "status": "RUNNING",
            "machineType": "https://compute.googleapis.com/compute/v1/projects/p/zones/z/machineTypes/e2-medium",
            "zone": "https://compute.googleapis.com/compute/v1/projects/p/zones/us-central1-a",
            "networkInterfaces": [{
                "name": "nic0",
                "networkIP": "10.128.0.2",
                "accessConfigs": [{"name": "External NAT", "natIP": "34.68.1.2"}]
            }]
        }))
        .unwrap();
        assert_eq!(instance.external_ip(), Some("34.68.1.2"));
        assert_eq!(instance.internal_ip(), Some("10.128.0.2"));
    }

    #[test]
    fn aggregated_list_tolerates_empty_scopes() {
        let res: InstanceAggregatedListResponse = serde_json::from_value(serde_json::json!({
            "items": {
                "zones/us-central1-a": {"instances": [{"name": "vm-1"}]},
                "zones/us-central1-b": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
            }
        }))
        .unwrap();
        assert_eq!(res.items["zones/us-central1-a"].instances.len(), 1);
        assert!(res.items["zones/us-central1-b"].instances.is_empty());
    }
}
