//! # Instance request construction
//!
//! Builds the `instances.insert` payload from the values `instances create`
//! collected. Short names are expanded to the full resource URLs the API
//! wants, and the zone's region is inferred for subnetwork paths.

use std::collections::HashMap;

use crate::api::compute::types::*;

/// Everything `instances create` collects from its flags.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub name: String,
    /// Short machine type name (`e2-medium`) or a full URL.
    pub machine_type: String,
    /// Image family, or a full `projects/.../images/...` path.
    pub image_family: String,
    /// Project the image family lives in; ignored for full paths.
    pub image_project: String,
    pub boot_disk_size_gb: u32,
    /// Network short name; `None` means the default network.
    pub network: Option<String>,
    /// Subnetwork short name within the zone's region.
    pub subnet: Option<String>,
    /// Give the instance an ephemeral external IP.
    pub external_ip: bool,
    /// Provision as a preemptible spot instance.
    pub spot: bool,
    pub labels: HashMap<String, String>,
    pub tags: Vec<String>,
    pub startup_script: Option<String>,
    pub description: Option<String>,
}

/// Infers the region from a zone name (`us-central1-a` -> `us-central1`).
pub fn region_of_zone(zone: &str) -> &str {
    zone.rsplit_once('-').map(|(prefix, _)| prefix).unwrap_or(zone)
}

pub fn build_instance_request(spec: &InstanceSpec, project: &str, zone: &str) -> InstanceRequest {
    let machine_type = if spec.machine_type.contains('/') {
        spec.machine_type.clone()
    } else {
        format!(
            "projects/{}/zones/{}/machineTypes/{}",
            project, zone, spec.machine_type
        )
    };

    let source_image = if spec.image_family.contains('/') {
        spec.image_family.clone()
    } else {
        format!(
            "projects/{}/global/images/family/{}",
            spec.image_project, spec.image_family
        )
    };

    let network = Some(match &spec.network {
        Some(network) if network.contains('/') => network.clone(),
        Some(network) => format!("projects/{project}/global/networks/{network}"),
        None => format!("projects/{project}/global/networks/default"),
    });
    let subnetwork = spec.subnet.as_ref().map(|subnet| {
        format!(
            "projects/{}/regions/{}/subnetworks/{}",
            project,
            region_of_zone(zone),
            subnet
        )
    });

    let access_configs = if spec.external_ip {
        vec![AccessConfigRequest {
            name: "External NAT".to_string(),
            config_type: "ONE_TO_ONE_NAT".to_string(),
            network_tier: "PREMIUM".to_string(),
        }]
    } else {
        vec![]
    };

    let scheduling = if spec.spot {
        Scheduling {
            provisioning_model: "SPOT".to_string(),
            automatic_restart: false,
            // Spot capacity can be reclaimed; stop rather than delete.
            instance_termination_action: Some("STOP".to_string()),
        }
    } else {
        Scheduling {
            provisioning_model: "STANDARD".to_string(),
            automatic_restart: true,
            instance_termination_action: None,
        }
    };

    let mut metadata_items = Vec::new();
    if let Some(script) = &spec.startup_script {
        metadata_items.push(MetadataItem {
            key: "startup-script".to_string(),
            value: script.clone(),
        });
    }

    InstanceRequest {
        name: spec.name.clone(),
        machine_type,
        description: spec.description.clone().unwrap_or_default(),
        disks: vec![AttachedDisk {
            auto_delete: true,
            boot: true,
            initialize_params: InitializeParams {
                disk_size_gb: spec.boot_disk_size_gb.to_string(),
                disk_type: format!("projects/{project}/zones/{zone}/diskTypes/pd-balanced"),
                source_image,
            },
        }],
        network_interfaces: vec![NetworkInterfaceRequest {
            network,
            subnetwork,
            access_configs,
            stack_type: "IPV4_ONLY".to_string(),
        }],
        metadata: Metadata {
            items: metadata_items,
        },
        labels: spec.labels.clone(),
        scheduling,
        tags: Tags {
            items: spec.tags.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> InstanceSpec {
        InstanceSpec {
            name: "test-vm".to_string(),
            machine_type: "e2-medium".to_string(),
            image_family: "debian-12".to_string(),
            image_project: "debian-cloud".to_string(),
            boot_disk_size_gb: 10,
            network: None,
            subnet: None,
            external_ip: true,
            spot: false,
            labels: HashMap::new(),
            tags: vec![],
            startup_script: None,
            description: None,
        }
    }

    #[test]
    fn expands_short_names_to_paths() {
        let req = build_instance_request(&spec(), "my-proj", "us-central1-a");
        assert_eq!(
            req.machine_type,
            "projects/my-proj/zones/us-central1-a/machineTypes/e2-medium"
        );
        assert_eq!(req.disks.len(), 1);
        assert_eq!(
            req.disks[0].initialize_params.source_image,
            "projects/debian-cloud/global/images/family/debian-12"
        );
        assert_eq!(req.disks[0].initialize_params.disk_size_gb, "10");
        assert_eq!(
            req.network_interfaces[0].network.as_deref(),
            Some("projects/my-proj/global/networks/default")
        );
    }

    #[test]
    fn full_paths_pass_through() {
        let mut s = spec();
        s.machine_type = "projects/p/zones/z/machineTypes/c2d-standard-4".to_string();
        s.image_family = "projects/ubuntu-os-cloud/global/images/ubuntu-2404-noble".to_string();
        let req = build_instance_request(&s, "my-proj", "us-central1-a");
        assert_eq!(req.machine_type, s.machine_type);
        assert_eq!(req.disks[0].initialize_params.source_image, s.image_family);
    }

    #[test]
    fn subnet_uses_region_of_zone() {
        let mut s = spec();
        s.subnet = Some("private".to_string());
        let req = build_instance_request(&s, "my-proj", "europe-west1-b");
        assert_eq!(
            req.network_interfaces[0].subnetwork.as_deref(),
            Some("projects/my-proj/regions/europe-west1/subnetworks/private")
        );
        assert_eq!(region_of_zone("europe-west1-b"), "europe-west1");
        assert_eq!(region_of_zone("weird"), "weird");
    }

    #[test]
    fn spot_flag_drives_scheduling() {
        let mut s = spec();
        s.spot = true;
        let req = build_instance_request(&s, "p", "z-a");
        assert_eq!(req.scheduling.provisioning_model, "SPOT");
        assert!(!req.scheduling.automatic_restart);
        assert_eq!(
            req.scheduling.instance_termination_action.as_deref(),
            Some("STOP")
        );

        let req = build_instance_request(&spec(), "p", "z-a");
        assert_eq!(req.scheduling.provisioning_model, "STANDARD");
        assert!(req.scheduling.automatic_restart);
    }

    #[test]
    fn no_external_ip_means_no_access_configs() {
        let mut s = spec();
        s.external_ip = false;
        let req = build_instance_request(&s, "p", "z-a");
        assert!(req.network_interfaces[0].access_configs.is_empty());
        // and the serialized payload omits the empty blocks entirely
        let value = serde_json::to_value(&req).unwrap();
        assert!(value["networkInterfaces"][0].get("accessConfigs").is_none());
        assert!(value.get("labels").is_none());
        assert!(value.get("metadata").is_none());
        assert!(value.get("tags").is_none());
    }
}
