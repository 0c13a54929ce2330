use crate::domain::offer::resource::{ANY_ROLE, DiskInfo, DiskSource, DiskSourceKind, Persistence, ReservationInfo, Resource, VolumeMount, VolumeMode};
use crate::domain::offer::value::Value;
use crate::domain::specification::resource_spec::{ResourceSpec, VolumeType};
use crate::domain::utils::id::{PersistenceId, ResourceId};

/// Builds the concrete, reserved form of a resource specification.
///
/// A resource id is minted at `build()` when none was supplied, so every resource built here carries the
/// framework's dynamic reservation on top of the pre-reserved role.
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    name: String,
    value: Value,
    role: String,
    pre_reserved_role: String,
    principal: Option<String>,
    resource_id: Option<ResourceId>,
    disk: Option<DiskInfo>,
}

impl ResourceBuilder {
    pub fn from_spec(spec: &ResourceSpec, resource_id: Option<ResourceId>) -> Self {
        Self {
            name: spec.name.clone(),
            value: spec.value.clone(),
            role: spec.role.clone(),
            pre_reserved_role: spec.pre_reserved_role.clone(),
            principal: spec.principal.clone(),
            resource_id,
            disk: None,
        }
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Attaches a persistent volume.
    ///
    /// A fresh persistence id is generated when `persistence_id` is `None`. MOUNT volumes take the root of
    /// the disk the offer supplied; it is never invented here.
    pub fn volume(mut self, volume_type: VolumeType, container_path: &str, persistence_id: Option<PersistenceId>, source_root: Option<&str>) -> Self {
        let source = match volume_type {
            VolumeType::Root => None,
            VolumeType::Mount => {
                let Some(root) = source_root else {
                    panic!("MOUNT volume at {} built without the offered disk's source root", container_path);
                };
                Some(DiskSource { kind: DiskSourceKind::Mount, root: Some(root.to_string()) })
            }
        };

        self.disk = Some(DiskInfo {
            source,
            persistence: Some(Persistence { id: persistence_id.unwrap_or_else(PersistenceId::random), principal: self.principal.clone() }),
            volume: Some(VolumeMount { container_path: container_path.to_string(), mode: VolumeMode::Rw }),
        });
        self
    }

    pub fn build(self) -> Resource {
        let resource_id = self.resource_id.unwrap_or_else(ResourceId::random);

        let mut reservations = Vec::with_capacity(2);
        if self.pre_reserved_role != ANY_ROLE {
            reservations.push(ReservationInfo::new_static(&self.pre_reserved_role));
        }
        reservations.push(ReservationInfo::new_dynamic(&self.role, self.principal.clone(), &resource_id));

        Resource { name: self.name, value: self.value, reservations, allocation_role: Some(self.role), disk: self.disk }
    }
}
