use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::domain::offer::value::{Value, ValueType};
use crate::domain::utils::id::{PersistenceId, ResourceId};

/// Role carried by resources that are not reserved for anybody.
pub const ANY_ROLE: &str = "*";

/// Reservation label under which the framework records its resource id.
pub const RESOURCE_ID_LABEL: &str = "resource_id";

pub const CPUS: &str = "cpus";
pub const MEM: &str = "mem";
pub const DISK: &str = "disk";
pub const PORTS: &str = "ports";
pub const GPUS: &str = "gpus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cpus,
    Mem,
    Disk,
    Ports,
    Gpus,
    Other,
}

lazy_static! {
    static ref RESOURCE_KINDS: HashMap<&'static str, ResourceKind> = {
        let mut kinds = HashMap::new();
        kinds.insert(CPUS, ResourceKind::Cpus);
        kinds.insert(MEM, ResourceKind::Mem);
        kinds.insert(DISK, ResourceKind::Disk);
        kinds.insert(PORTS, ResourceKind::Ports);
        kinds.insert(GPUS, ResourceKind::Gpus);
        kinds
    };
}

impl ResourceKind {
    pub fn from_name(name: &str) -> Self {
        RESOURCE_KINDS.get(name).copied().unwrap_or(ResourceKind::Other)
    }

    /// Quantity type the cluster manager uses for this kind of resource. Custom resources may use either.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            ResourceKind::Ports => Some(ValueType::Ranges),
            ResourceKind::Other => None,
            _ => Some(ValueType::Scalar),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.value_type().is_none_or(|value_type| value_type == value.value_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationKind {
    /// Operator reservation made before the framework ever sees the resource.
    Static,
    /// Reservation made by the framework through a RESERVE operation.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationInfo {
    pub role: String,
    #[serde(default)]
    pub principal: Option<String>,
    pub kind: ReservationKind,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ReservationInfo {
    pub fn new_static(role: &str) -> Self {
        Self { role: role.to_string(), principal: None, kind: ReservationKind::Static, labels: BTreeMap::new() }
    }

    pub fn new_dynamic(role: &str, principal: Option<String>, resource_id: &ResourceId) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(RESOURCE_ID_LABEL.to_string(), resource_id.to_string());
        Self { role: role.to_string(), principal, kind: ReservationKind::Dynamic, labels }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiskSourceKind {
    Mount,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSource {
    pub kind: DiskSourceKind,
    #[serde(default)]
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persistence {
    pub id: PersistenceId,
    #[serde(default)]
    pub principal: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeMode {
    #[default]
    Rw,
    Ro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub container_path: String,
    #[serde(default)]
    pub mode: VolumeMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiskInfo {
    #[serde(default)]
    pub source: Option<DiskSource>,
    #[serde(default)]
    pub persistence: Option<Persistence>,
    #[serde(default)]
    pub volume: Option<VolumeMount>,
}

/// One resource entry as it appears in an offer or in a persisted task descriptor.
///
/// `reservations` is the refinement chain: the first entry is the outermost (oldest) reservation and the
/// last entry is the one currently in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub reservations: Vec<ReservationInfo>,
    #[serde(default)]
    pub allocation_role: Option<String>,
    #[serde(default)]
    pub disk: Option<DiskInfo>,
}

impl Resource {
    /// Unreserved resource with no disk descriptor.
    pub fn new(name: &str, value: Value) -> Self {
        Self { name: name.to_string(), value, reservations: Vec::new(), allocation_role: None, disk: None }
    }

    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_name(&self.name)
    }

    /// Whether the value has the quantity type its name calls for.
    pub fn is_well_typed(&self) -> bool {
        self.kind().accepts(&self.value)
    }

    pub fn with_value(&self, value: Value) -> Self {
        Resource { value, ..self.clone() }
    }

    /// Resource id recorded in the reservation currently in effect, if it is ours.
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.reservations.last().and_then(|reservation| reservation.labels.get(RESOURCE_ID_LABEL)).map(|id| ResourceId::new(id.as_str()))
    }

    pub fn persistence_id(&self) -> Option<PersistenceId> {
        self.disk.as_ref().and_then(|disk| disk.persistence.as_ref()).map(|persistence| persistence.id.clone())
    }

    pub fn container_path(&self) -> Option<&str> {
        self.disk.as_ref().and_then(|disk| disk.volume.as_ref()).map(|volume| volume.container_path.as_str())
    }

    pub fn source(&self) -> Option<&DiskSource> {
        self.disk.as_ref().and_then(|disk| disk.source.as_ref())
    }

    pub fn source_root(&self) -> Option<&str> {
        self.source().and_then(|source| source.root.as_deref())
    }

    /// MOUNT disks cannot be split and are consumed whole.
    pub fn is_atomic(&self) -> bool {
        self.source().is_some_and(|source| source.kind == DiskSourceKind::Mount)
    }

    pub fn is_reserved(&self) -> bool {
        self.resource_id().is_some()
    }

    /// Role of the reservation currently in effect.
    pub fn role(&self) -> &str {
        self.reservations.last().map(|reservation| reservation.role.as_str()).unwrap_or(ANY_ROLE)
    }

    /// Role the resource falls back to once the reservation currently in effect is released.
    pub fn previous_role(&self) -> &str {
        let depth = self.reservations.len();
        if depth < 2 { ANY_ROLE } else { self.reservations[depth - 2].role.as_str() }
    }

    /// Copy of this resource as it looks after UNRESERVE (and DESTROY for volumes).
    pub fn released(&self) -> Resource {
        let mut released = self.clone();
        if released.reservations.last().is_some_and(|reservation| reservation.kind == ReservationKind::Dynamic) {
            released.reservations.pop();
        }
        if let Some(disk) = released.disk.as_mut() {
            disk.persistence = None;
            disk.volume = None;
        }
        if released.disk.as_ref().is_some_and(|disk| disk.source.is_none()) {
            released.disk = None;
        }
        released
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ {}, role: {}", self.name, self.value, self.role())?;
        if let Some(resource_id) = self.resource_id() {
            write!(f, ", resource_id: {}", resource_id)?;
        }
        if let Some(persistence_id) = self.persistence_id() {
            write!(f, ", persistence_id: {}", persistence_id)?;
        }
        if let Some(container_path) = self.container_path() {
            write!(f, ", container_path: {}", container_path)?;
        }
        write!(f, " }}")
    }
}
