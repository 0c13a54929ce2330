use crate::domain::offer::evaluate::port_lookup::prior_task_port;
use crate::domain::offer::resource::{PORTS, Resource};
use crate::domain::specification::resource_spec::ResourceRequirement;
use crate::domain::state::task::TaskInfo;
use crate::domain::utils::id::{PersistenceId, ResourceId};

/// A requirement paired with the reservation it already owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLabels {
    pub requirement: ResourceRequirement,
    pub resource_id: ResourceId,
    pub persistence_id: Option<PersistenceId>,
    pub source_root: Option<String>,
}

/// Three-way partition of a task's (or executor's) previous reservations against its current requirements.
#[derive(Debug, Clone, Default)]
pub struct ResourceMapping {
    /// Requirements that keep (and possibly resize) an existing reservation.
    pub updates: Vec<ResourceLabels>,

    /// Requirements with no existing reservation.
    pub creates: Vec<ResourceRequirement>,

    /// Reservations no requirement claims any more.
    pub orphans: Vec<Resource>,
}

/// Cross-references previously reserved `resources` against `requirements`.
///
/// Disks match by container path, ports by the port number they hold (a dynamic port is resolved through
/// `prior_task`), everything else by name. Each requirement is matched at most once.
pub fn map_resources(resources: &[Resource], requirements: Vec<ResourceRequirement>, prior_task: Option<&TaskInfo>) -> ResourceMapping {
    let mut remaining = requirements;
    let mut mapping = ResourceMapping::default();

    for resource in resources {
        let Some(resource_id) = resource.resource_id() else {
            log::warn!("Ignoring previously launched resource without a resource id: {}", resource);
            continue;
        };

        match remaining.iter().position(|requirement| matches(resource, requirement, prior_task)) {
            Some(index) => {
                let requirement = remaining.remove(index);
                log::debug!("Matched reserved {} to requirement {}", resource, requirement.identity());
                mapping.updates.push(ResourceLabels {
                    requirement,
                    resource_id,
                    persistence_id: resource.persistence_id(),
                    source_root: resource.source_root().map(str::to_string),
                });
            }
            None => {
                log::info!("Reserved {} is no longer required", resource);
                mapping.orphans.push(resource.clone());
            }
        }
    }

    mapping.creates = remaining;
    mapping
}

fn matches(resource: &Resource, requirement: &ResourceRequirement, prior_task: Option<&TaskInfo>) -> bool {
    if let Some(container_path) = resource.container_path() {
        return matches!(requirement, ResourceRequirement::Volume(volume) if volume.container_path == container_path);
    }

    if resource.name == PORTS {
        let Some(port) = requirement.port_spec() else {
            return false;
        };
        let number = if port.is_dynamic() { prior_task.and_then(|task| prior_task_port(task, port)) } else { Some(port.port()) };
        return number.is_some_and(|number| resource.value.contains_port(number));
    }

    matches!(requirement, ResourceRequirement::Simple(spec) if spec.name == resource.name)
}
