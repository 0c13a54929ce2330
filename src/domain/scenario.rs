use std::sync::Arc;

use crate::api::scenario_dto::{PodSpecDto, ResourceDto, ResourceSetDto, ScenarioDto, VolumeDto};
use crate::domain::offer::evaluate::evaluator::{EvaluatorConfig, OfferEvaluator};
use crate::domain::offer::offer::Offer;
use crate::domain::offer::operation::Operation;
use crate::domain::offer::resource::{PORTS, ResourceKind};
use crate::domain::specification::pod_spec::{PodInstance, PodSpec, ResourceSet};
use crate::domain::specification::requirement::PodInstanceRequirement;
use crate::domain::specification::resource_spec::{NamedVipSpec, PortSpec, ResourceRequirement, ResourceSpec, VolumeSpec};
use crate::domain::state::state_store::MemoryStateStore;
use crate::domain::state::task::TaskStatus;
use crate::error::{Error, Result};

/// A loaded evaluation run, ready to be handed to an `OfferEvaluator`.
#[derive(Debug)]
pub struct Scenario {
    pub config: EvaluatorConfig,
    pub requirement: PodInstanceRequirement,
    pub state_store: Arc<MemoryStateStore>,
    pub offers: Vec<Offer>,
}

impl Scenario {
    pub fn from_dto(dto: ScenarioDto) -> Result<Self> {
        let config = dto.config;
        let pod = pod_from_dto(dto.pod, &config)?;

        let mut requirement = PodInstanceRequirement::new(PodInstance::new(Arc::new(pod), dto.requirement.index), dto.requirement.tasks_to_launch)
            .with_recovery_type(dto.requirement.recovery_type);
        requirement.environment = dto.requirement.environment;
        requirement.validate()?;

        let state_store = Arc::new(MemoryStateStore::new());
        for stored in dto.tasks {
            let name = stored.info.name.clone();
            let task_id = stored.info.task_id.clone();
            state_store.store_task(stored.info)?;
            if let Some(state) = stored.state {
                state_store.store_status(&name, TaskStatus { task_id, state })?;
            }
            state_store.store_goal_override(&name, stored.goal_override)?;
        }

        Ok(Scenario { config, requirement, state_store, offers: dto.offers })
    }

    pub fn evaluator(&self) -> OfferEvaluator {
        OfferEvaluator::new(self.state_store.clone(), self.config.clone())
    }

    pub fn run(&self) -> Result<Vec<Operation>> {
        self.evaluator().evaluate(&self.requirement, &self.offers)
    }
}

fn pod_from_dto(dto: PodSpecDto, config: &EvaluatorConfig) -> Result<PodSpec> {
    let resource_sets = dto.resource_sets.into_iter().map(|set| resource_set_from_dto(set, config)).collect::<Result<Vec<_>>>()?;
    let volumes = dto.volumes.into_iter().map(|volume| volume_from_dto(volume, config)).collect();

    Ok(PodSpec { pod_type: dto.pod_type, count: dto.count, user: dto.user, tasks: dto.tasks, resource_sets, volumes, placement_rule: None })
}

fn resource_set_from_dto(dto: ResourceSetDto, config: &EvaluatorConfig) -> Result<ResourceSet> {
    let resources = dto.resources.into_iter().map(|resource| resource_from_dto(resource, &dto.id, config)).collect::<Result<Vec<_>>>()?;
    let volumes = dto.volumes.into_iter().map(|volume| volume_from_dto(volume, config)).collect();

    Ok(ResourceSet { id: dto.id, resources, volumes })
}

fn resource_from_dto(dto: ResourceDto, resource_set_id: &str, config: &EvaluatorConfig) -> Result<ResourceRequirement> {
    let principal = config.principal.as_deref();

    let requirement = match dto.port {
        Some(port_dto) => {
            if dto.name != PORTS {
                return Err(Error::ModelConstructionError(format!("Port '{}' in resource set '{}' must be a '{}' resource", port_dto.port_name, resource_set_id, PORTS)));
            }
            let mut port = PortSpec::new(port_dto.port, &port_dto.port_name, &config.role, principal);
            port.env_key = port_dto.env_key;
            port.visibility = port_dto.visibility;
            port.network_names = port_dto.network_names;
            if let Some(pre_reserved_role) = &dto.pre_reserved_role {
                port.resource = port.resource.with_pre_reserved_role(pre_reserved_role);
            }

            match port_dto.vip {
                Some(vip) => ResourceRequirement::NamedVip(NamedVipSpec { port, protocol: vip.protocol, vip_name: vip.name, vip_port: vip.port }),
                None => ResourceRequirement::Port(port),
            }
        }
        None => {
            let value = dto
                .value
                .ok_or_else(|| Error::ModelConstructionError(format!("Resource '{}' in resource set '{}' has no value", dto.name, resource_set_id)))?;
            if !ResourceKind::from_name(&dto.name).accepts(&value) {
                return Err(Error::ModelConstructionError(format!(
                    "Resource '{}' in resource set '{}' cannot hold a {} value",
                    dto.name,
                    resource_set_id,
                    value.value_type()
                )));
            }
            let mut spec = ResourceSpec::new(&dto.name, value, &config.role, principal);
            if let Some(pre_reserved_role) = &dto.pre_reserved_role {
                spec = spec.with_pre_reserved_role(pre_reserved_role);
            }
            ResourceRequirement::Simple(spec)
        }
    };
    Ok(requirement)
}

fn volume_from_dto(dto: VolumeDto, config: &EvaluatorConfig) -> VolumeSpec {
    let mut volume = VolumeSpec::new(dto.size, dto.volume_type, &dto.container_path, &config.role, config.principal.as_deref());
    if let Some(pre_reserved_role) = &dto.pre_reserved_role {
        volume.resource = volume.resource.with_pre_reserved_role(pre_reserved_role);
    }
    volume
}
