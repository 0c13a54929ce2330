use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::offer::resource::{ANY_ROLE, DISK, PORTS};
use crate::domain::offer::value::Value;

/// Networks on which container ports are not mapped to host ports.
const NETWORKS_WITHOUT_PORT_MAPPING: &[&str] = &["dcos"];

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub name: String,
    pub value: Value,
    pub role: String,
    pub pre_reserved_role: String,
    pub principal: Option<String>,
}

impl ResourceSpec {
    pub fn new(name: &str, value: Value, role: &str, principal: Option<&str>) -> Self {
        Self { name: name.to_string(), value, role: role.to_string(), pre_reserved_role: ANY_ROLE.to_string(), principal: principal.map(str::to_string) }
    }

    pub fn with_pre_reserved_role(mut self, pre_reserved_role: &str) -> Self {
        self.pre_reserved_role = pre_reserved_role.to_string();
        self
    }

    pub fn with_value(&self, value: Value) -> Self {
        ResourceSpec { value, ..self.clone() }
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ {}, role: {}, pre_reserved_role: {} }}", self.name, self.value, self.role, self.pre_reserved_role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Framework,
    Cluster,
    #[default]
    External,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Framework => write!(f, "FRAMEWORK"),
            Visibility::Cluster => write!(f, "CLUSTER"),
            Visibility::External => write!(f, "EXTERNAL"),
        }
    }
}

/// A single port. A port value of `0` asks for any free port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub resource: ResourceSpec,
    pub port_name: String,
    pub env_key: Option<String>,
    pub visibility: Visibility,
    pub network_names: Vec<String>,
}

impl PortSpec {
    pub fn new(port: u64, port_name: &str, role: &str, principal: Option<&str>) -> Self {
        Self {
            resource: ResourceSpec::new(PORTS, Value::single_range(port), role, principal),
            port_name: port_name.to_string(),
            env_key: None,
            visibility: Visibility::default(),
            network_names: Vec::new(),
        }
    }

    pub fn port(&self) -> u64 {
        self.resource.value.first_port().unwrap_or(0)
    }

    pub fn is_dynamic(&self) -> bool {
        self.port() == 0
    }

    /// Environment variable the port number is exported under.
    pub fn env_key(&self) -> String {
        match &self.env_key {
            Some(env_key) => env_key.clone(),
            None => to_env_name(&format!("PORT_{}", self.port_name)),
        }
    }

    /// Host ports are reserved unless every network the task joins is an overlay without port mapping.
    pub fn requires_host_ports(&self) -> bool {
        self.network_names.is_empty() || self.network_names.iter().any(|network| !NETWORKS_WITHOUT_PORT_MAPPING.contains(&network.as_str()))
    }
}

/// A port that is additionally published under a load-balanced virtual address.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedVipSpec {
    pub port: PortSpec,
    pub protocol: String,
    pub vip_name: String,
    pub vip_port: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeType {
    Root,
    Mount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpec {
    pub resource: ResourceSpec,
    pub volume_type: VolumeType,
    pub container_path: String,
}

impl VolumeSpec {
    pub fn new(size: f64, volume_type: VolumeType, container_path: &str, role: &str, principal: Option<&str>) -> Self {
        Self { resource: ResourceSpec::new(DISK, Value::scalar(size), role, principal), volume_type, container_path: container_path.to_string() }
    }
}

/// One entry of a resource set, as the mapper and pipeline see it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceRequirement {
    Simple(ResourceSpec),
    Port(PortSpec),
    NamedVip(NamedVipSpec),
    Volume(VolumeSpec),
}

impl ResourceRequirement {
    pub fn resource_spec(&self) -> &ResourceSpec {
        match self {
            ResourceRequirement::Simple(spec) => spec,
            ResourceRequirement::Port(port) => &port.resource,
            ResourceRequirement::NamedVip(vip) => &vip.port.resource,
            ResourceRequirement::Volume(volume) => &volume.resource,
        }
    }

    pub fn name(&self) -> &str {
        &self.resource_spec().name
    }

    pub fn port_spec(&self) -> Option<&PortSpec> {
        match self {
            ResourceRequirement::Port(port) => Some(port),
            ResourceRequirement::NamedVip(vip) => Some(&vip.port),
            _ => None,
        }
    }

    /// Key that must be unique among the requirements of one resource set.
    pub fn identity(&self) -> String {
        match self {
            ResourceRequirement::Simple(spec) => spec.name.clone(),
            ResourceRequirement::Port(port) => format!("port:{}", port.port_name),
            ResourceRequirement::NamedVip(vip) => format!("port:{}", vip.port.port_name),
            ResourceRequirement::Volume(volume) => format!("volume:{}", volume.container_path),
        }
    }

    /// Evaluation rank: static ports, then dynamic ports, then everything else, so a dynamic port can never
    /// take a port a static one still needs.
    pub fn evaluation_rank(&self) -> u8 {
        match self.port_spec() {
            Some(port) if !port.is_dynamic() => 0,
            Some(_) => 1,
            None => match self {
                ResourceRequirement::Volume(_) => 3,
                _ => 2,
            },
        }
    }
}

/// Upper-cases `name` and replaces anything outside `[A-Z0-9_]` with `_`.
pub fn to_env_name(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' }).collect()
}

/// Sorts requirements into evaluation order, keeping declaration order within one rank.
pub fn ordered_requirements(mut requirements: Vec<ResourceRequirement>) -> Vec<ResourceRequirement> {
    requirements.sort_by_key(|requirement| requirement.evaluation_rank());
    requirements
}
