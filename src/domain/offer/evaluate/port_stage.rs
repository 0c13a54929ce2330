use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::domain::offer::evaluate::evaluation_utils::evaluate_simple_resource;
use crate::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::{EvaluationStage, StageTarget};
use crate::domain::offer::resource::PORTS;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::offer::value::Value;
use crate::domain::specification::resource_spec::{NamedVipSpec, PortSpec};
use crate::domain::state::task::DiscoveryPort;
use crate::domain::utils::id::ResourceId;

const DEFAULT_PROTOCOL: &str = "tcp";
const OVERLAY_PORT_MIN: u64 = 1025;
const OVERLAY_PORT_MAX: u64 = 65535;

#[derive(Debug, Clone)]
struct VipInfo {
    protocol: String,
    vip_name: String,
    vip_port: u64,
}

/// Resolves a concrete port, reserves it when host ports are in use, and publishes it to the task's
/// environment, checks and discovery metadata. Named VIPs additionally get a load-balancer label.
#[derive(Debug)]
pub struct PortEvaluationStage {
    spec: PortSpec,
    target: StageTarget,
    resource_id: Option<ResourceId>,
    vip: Option<VipInfo>,
}

impl PortEvaluationStage {
    pub fn new(spec: PortSpec, target: StageTarget, resource_id: Option<ResourceId>) -> Self {
        Self { spec, target, resource_id, vip: None }
    }

    pub fn named_vip(spec: NamedVipSpec, target: StageTarget, resource_id: Option<ResourceId>) -> Self {
        let vip = VipInfo { protocol: spec.protocol, vip_name: spec.vip_name, vip_port: spec.vip_port };
        Self { spec: spec.port, target, resource_id, vip: Some(vip) }
    }

    fn resolve_port(&self, pool: &ResourcePool, pod: &PodInfoBuilder) -> Option<u64> {
        if !self.spec.is_dynamic() {
            return Some(self.spec.port());
        }

        if let Some(prior) = pod.prior_port(&self.target, &self.spec) {
            log::debug!("Reusing previously assigned port {} for {}", prior, self.spec.port_name);
            return Some(prior);
        }

        if self.spec.requires_host_ports() { select_dynamic_port(pool, pod, &self.spec) } else { select_overlay_port(pod) }
    }

    fn discovery_port(&self, port: u64) -> DiscoveryPort {
        let mut labels = BTreeMap::new();
        let protocol = match &self.vip {
            Some(vip) => {
                labels.insert(format!("VIP_{}", Uuid::new_v4()), format!("{}:{}", vip.vip_name, vip.vip_port));
                vip.protocol.clone()
            }
            None => DEFAULT_PROTOCOL.to_string(),
        };
        DiscoveryPort { number: port, name: self.spec.port_name.clone(), protocol, visibility: self.spec.visibility, labels }
    }
}

impl EvaluationStage for PortEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let Some(port) = self.resolve_port(pool, pod) else {
            return EvaluationOutcome::fail(self.name(), FailureReason::PortUnavailable, format!("No free port available for {}", self.spec.port_name));
        };

        let mut operations = Vec::new();
        let reason = if self.spec.requires_host_ports() {
            let spec = self.spec.resource.with_value(Value::single_range(port));
            let evaluation = evaluate_simple_resource(self.name(), pool, &spec, self.resource_id.as_ref());
            let Some(resource) = evaluation.resource else {
                return evaluation.outcome;
            };
            pod.add_resource(&self.target, resource);
            operations.extend(evaluation.outcome.into_operations());
            format!("Offer contains host port {} for '{}'", port, self.spec.port_name)
        } else {
            pod.assign_overlay_port(port);
            format!("Assigned overlay port {} for '{}'", port, self.spec.port_name)
        };

        pod.set_port_environment(&self.target, &self.spec.env_key(), port);
        pod.add_discovery_port(&self.target, self.discovery_port(port));

        EvaluationOutcome::pass(self.name(), operations, reason)
    }

    fn name(&self) -> &'static str {
        match self.vip {
            Some(_) => "NamedVipEvaluationStage",
            None => "PortEvaluationStage",
        }
    }
}

/// Lowest unreserved offered port that no static port in the pod and no draft already claims.
fn select_dynamic_port(pool: &ResourcePool, pod: &PodInfoBuilder, spec: &PortSpec) -> Option<u64> {
    let offered = pool.unreserved_merged(&spec.resource.pre_reserved_role)?.get(PORTS)?;
    let mut excluded: HashSet<u64> = pod.pod_instance().pod.static_ports();
    excluded.extend(pod.assigned_ports());

    offered.as_ranges()?.iter().flat_map(|range| range.begin..=range.end).find(|port| *port != 0 && !excluded.contains(port))
}

fn select_overlay_port(pod: &PodInfoBuilder) -> Option<u64> {
    let excluded = pod.pod_instance().pod.static_ports();
    (OVERLAY_PORT_MIN..=OVERLAY_PORT_MAX).find(|port| !pod.overlay_ports().contains(port) && !excluded.contains(port))
}
