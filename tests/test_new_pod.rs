mod common;

use std::sync::Arc;

use common::*;
use offer_evaluation::domain::offer::evaluate::evaluator::OfferEvaluator;
use offer_evaluation::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use offer_evaluation::domain::offer::evaluate::tls_stage::TlsProvisioner;
use offer_evaluation::domain::offer::offer::Offer;
use offer_evaluation::domain::offer::operation::{Operation, OperationKind, validate_ordering};
use offer_evaluation::domain::offer::resource::ReservationInfo;
use offer_evaluation::domain::offer::value::{Range, Value};
use offer_evaluation::domain::placement::PlacementRule;
use offer_evaluation::domain::specification::pod_spec::{PodInstance, PodSpec, TaskSpec, TransportEncryptionKind, TransportEncryptionSpec};
use offer_evaluation::domain::specification::resource_spec::{NamedVipSpec, ResourceRequirement, ResourceSpec, VolumeType};
use offer_evaluation::domain::state::state_store::MemoryStateStore;
use offer_evaluation::domain::state::task::{TaskInfo, labels};
use offer_evaluation::error::Error;

fn new_pod_evaluator(use_default_executor: bool) -> OfferEvaluator {
    evaluator(Arc::new(MemoryStateStore::new()), config(use_default_executor))
}

#[test]
fn test_new_pod_reserves_each_resource_then_launches() {
    let pod = single_task_pod(vec![simple(cpus(1.0)), simple(mem(256.0)), ResourceRequirement::Port(port(4040, "http"))], Vec::new());
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0), unreserved_scalar("mem", 512.0), unreserved_ports(0, 10000)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert_eq!(kinds(&operations), vec![OperationKind::Reserve, OperationKind::Reserve, OperationKind::Reserve, OperationKind::Launch]);
    assert!(validate_ordering(&operations).is_ok());

    let reserved = reserved_resources(&operations);
    let value_of = |name: &str| reserved.iter().find(|resource| resource.name == name).map(|resource| resource.value.clone());
    assert_eq!(value_of("cpus"), Some(Value::scalar(1.0)));
    assert_eq!(value_of("mem"), Some(Value::scalar(256.0)));
    assert_eq!(value_of("ports"), Some(Value::single_range(4040)));
    assert!(reserved.iter().all(|resource| resource.resource_id().is_some() && resource.role() == ROLE));

    let task = launched_task(&operations, "server");
    assert_eq!(task.resources.len(), 3);
    assert!(operations.iter().all(|operation| operation.offer_id().as_str() == "offer-1"));

    let environment = &task.command.as_ref().unwrap().environment;
    assert_eq!(environment.get("PORT_HTTP").map(String::as_str), Some("4040"));
    assert_eq!(environment.get("TASK_NAME").map(String::as_str), Some("hello-0-server"));
    assert_eq!(environment.get("POD_INSTANCE_INDEX").map(String::as_str), Some("0"));
    assert_eq!(environment.get("FRAMEWORK_NAME").map(String::as_str), Some("hello-world"));
    assert_eq!(task.label(labels::OFFER_HOSTNAME), Some("host-1"));
    assert!(task.task_id.as_str().starts_with("hello-0-server__"));
}

#[test]
fn test_dynamic_port_is_reflected_everywhere() {
    let pod = single_task_pod(vec![simple(cpus(0.5)), ResourceRequirement::Port(port(0, "http"))], Vec::new());
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 1.0), unreserved_ports(5000, 5010)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    let reserved_port = reserved_resources(&operations).into_iter().find(|resource| resource.name == "ports").expect("A port must be reserved");
    let chosen = reserved_port.value.first_port().unwrap();
    assert!((5000..=5010).contains(&chosen));
    assert_eq!(reserved_port.value, Value::single_range(chosen));

    let task = launched_task(&operations, "server");
    assert_eq!(task.command.as_ref().unwrap().environment.get("PORT_HTTP"), Some(&chosen.to_string()));
    let discovered = &task.discovery.as_ref().unwrap().ports;
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].number, chosen);
    assert_eq!(discovered[0].name, "http");
}

#[test]
fn test_dynamic_port_never_takes_a_static_port() {
    let pod = single_task_pod(vec![ResourceRequirement::Port(port(0, "http")), ResourceRequirement::Port(port(5000, "admin"))], Vec::new());
    let offers = [offer("offer-1", vec![unreserved_ports(5000, 5010)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    let environment = &launched_task(&operations, "server").command.as_ref().unwrap().environment;
    assert_eq!(environment.get("PORT_ADMIN").map(String::as_str), Some("5000"));
    assert_eq!(environment.get("PORT_HTTP").map(String::as_str), Some("5001"));
}

#[test]
fn test_overlay_port_needs_no_host_port() {
    let mut overlay = port(0, "http");
    overlay.network_names = vec!["dcos".to_string()];
    let pod = single_task_pod(vec![simple(cpus(0.5)), ResourceRequirement::Port(overlay)], Vec::new());
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 1.0)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert_eq!(kinds(&operations), vec![OperationKind::Reserve, OperationKind::Launch]);
    let environment = &launched_task(&operations, "server").command.as_ref().unwrap().environment;
    assert_eq!(environment.get("PORT_HTTP").map(String::as_str), Some("1025"));
}

#[test]
fn test_named_vip_is_labelled_in_discovery() {
    let vip = NamedVipSpec { port: port(8080, "web"), protocol: "tcp".to_string(), vip_name: "web".to_string(), vip_port: 80 };
    let pod = single_task_pod(vec![ResourceRequirement::NamedVip(vip)], Vec::new());
    let offers = [offer("offer-1", vec![unreserved_ports(8000, 9000)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    let discovered = &launched_task(&operations, "server").discovery.as_ref().unwrap().ports[0];
    assert_eq!(discovered.number, 8080);
    assert_eq!(discovered.labels.len(), 1);
    let (key, value) = discovered.labels.iter().next().unwrap();
    assert!(key.starts_with("VIP_"));
    assert_eq!(value, "web:80");
}

#[test]
fn test_shared_resource_set_is_reserved_once() {
    let pod = pod(
        vec![TaskSpec::new("server", "shared"), TaskSpec::new("sidecar", "shared")],
        vec![resource_set("shared", vec![simple(cpus(1.0))], Vec::new())],
    );
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 1.5)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server", "sidecar"]), &offers).unwrap();

    assert_eq!(kinds(&operations), vec![OperationKind::Reserve, OperationKind::Launch, OperationKind::Launch]);
    let reserved_id = reserved_resources(&operations)[0].resource_id();
    assert_eq!(launched_task(&operations, "server").resources[0].resource_id(), reserved_id);
    assert_eq!(launched_task(&operations, "sidecar").resources[0].resource_id(), reserved_id);
}

#[test]
fn test_task_not_requested_is_carried_without_launching() {
    let pod = pod(
        vec![TaskSpec::new("server", "server-resources"), TaskSpec::new("init", "init-resources")],
        vec![resource_set("server-resources", vec![simple(cpus(1.0))], Vec::new()), resource_set("init-resources", vec![simple(cpus(0.5))], Vec::new())],
    );
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    let launches: Vec<(&str, bool)> = operations.iter().filter(|op| op.is_launch()).map(|op| (op.task().unwrap().name.as_str(), op.should_launch())).collect();
    assert_eq!(launches, vec![("hello-0-server", true), ("hello-0-init", false)]);
    assert_eq!(reserved_resources(&operations).len(), 2);
}

#[test]
fn test_default_executor_reserves_overhead_and_launches_group() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], Vec::new());
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0), unreserved_scalar("mem", 1024.0), unreserved_scalar("disk", 1024.0)])];

    let operations = new_pod_evaluator(true).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert_eq!(
        kinds(&operations),
        vec![OperationKind::Reserve, OperationKind::Reserve, OperationKind::Reserve, OperationKind::Reserve, OperationKind::LaunchGroup]
    );

    let Some(Operation::LaunchGroup { executor, task, should_launch, .. }) = operations.last() else {
        panic!("Expected a LAUNCH_GROUP, got {:?}", operations.last());
    };
    assert!(*should_launch);
    assert!(executor.executor_id.as_str().starts_with("hello__"));
    assert_eq!(executor.resources.len(), 3);
    assert_eq!(executor.resources.iter().find(|resource| resource.name == "cpus").map(|resource| resource.value.clone()), Some(Value::scalar(0.1)));
    assert!(task.executor.is_none(), "Group launches carry the executor on the operation");
}

#[test]
fn test_pod_volume_is_mounted_into_every_task() {
    let mut pod = pod(
        vec![TaskSpec::new("server", "server-resources"), TaskSpec::new("worker", "worker-resources")],
        vec![resource_set("server-resources", vec![simple(cpus(0.5))], Vec::new()), resource_set("worker-resources", vec![simple(cpus(0.5))], Vec::new())],
    );
    pod.volumes = vec![volume(100.0, VolumeType::Root, "shared")];
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0), unreserved_scalar("mem", 64.0), unreserved_scalar("disk", 500.0)])];

    let operations = new_pod_evaluator(true).evaluate(&requirement(pod, &["server", "worker"]), &offers).unwrap();

    assert_eq!(operations.iter().filter(|op| op.kind() == OperationKind::Create).count(), 1);
    assert_eq!(launched_task(&operations, "server").volume_mounts, vec!["shared".to_string()]);
    assert_eq!(launched_task(&operations, "worker").volume_mounts, vec!["shared".to_string()]);
}

#[test]
fn test_root_volume_is_reserved_and_created() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], vec![volume(500.0, VolumeType::Root, "data")]);
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0), unreserved_scalar("disk", 1000.0)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert_eq!(kinds(&operations), vec![OperationKind::Reserve, OperationKind::Reserve, OperationKind::Create, OperationKind::Launch]);
    let disk = operations[1].resource().unwrap();
    let volume = operations[2].resource().unwrap();
    assert_eq!(disk.value, Value::scalar(500.0));
    assert_eq!(volume.resource_id(), disk.resource_id());
    assert_eq!(volume.container_path(), Some("data"));
    assert!(volume.persistence_id().is_some());
}

#[test]
fn test_mount_volume_takes_first_disk_that_fits() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], vec![volume(500.0, VolumeType::Mount, "data")]);
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0), mount_disk(400.0, "/mnt/small"), mount_disk(1000.0, "/mnt/big")])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert_eq!(kinds(&operations), vec![OperationKind::Reserve, OperationKind::Reserve, OperationKind::Create, OperationKind::Launch]);
    let disk = operations[1].resource().unwrap();
    assert_eq!(disk.value, Value::scalar(1000.0), "MOUNT disks are reserved whole");
    assert_eq!(disk.source_root(), Some("/mnt/big"));
    assert!(disk.persistence_id().is_none(), "The reservation itself carries no volume");

    let volume = operations[2].resource().unwrap();
    assert_eq!(volume.source_root(), Some("/mnt/big"));
    assert_eq!(volume.container_path(), Some("data"));
}

#[test]
fn test_mount_volume_without_large_enough_disk_is_rejected() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], vec![volume(500.0, VolumeType::Mount, "data")]);
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0), unreserved_scalar("disk", 5000.0), mount_disk(400.0, "/mnt/small")])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert!(operations.is_empty());
}

#[test]
fn test_first_passing_offer_wins() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], Vec::new());
    let offers = [
        offer("too-small", vec![unreserved_scalar("cpus", 0.5)]),
        offer("fits", vec![unreserved_scalar("cpus", 1.0)]),
        offer("also-fits", vec![unreserved_scalar("cpus", 4.0)]),
    ];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert!(!operations.is_empty());
    assert!(operations.iter().all(|operation| operation.offer_id().as_str() == "fits"));
}

#[test]
fn test_no_fitting_offer_yields_no_operations() {
    let pod = single_task_pod(vec![simple(cpus(1.0)), simple(mem(256.0))], Vec::new());
    let offers = [offer("cpu-only", vec![unreserved_scalar("cpus", 4.0)]), offer("mem-only", vec![unreserved_scalar("mem", 1024.0)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert!(operations.is_empty());
}

#[test]
fn test_mistyped_offered_resources_are_skipped() {
    let pod = single_task_pod(vec![simple(cpus(1.0)), simple(ResourceSpec::new("licenses", Value::single_range(7), ROLE, Some(PRINCIPAL)))], Vec::new());
    let mistyped = offer(
        "mistyped",
        vec![unreserved("cpus", Value::ranges(vec![Range::new(1, 8)])), unreserved_scalar("cpus", 0.5), unreserved_scalar("licenses", 10.0)],
    );
    let valid = offer("valid", vec![unreserved_scalar("cpus", 2.0), unreserved("licenses", Value::ranges(vec![Range::new(1, 10)]))]);

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &[mistyped, valid]).unwrap();

    assert!(!operations.is_empty(), "The well-typed offer should be accepted");
    assert!(operations.iter().all(|operation| operation.offer_id().as_str() == "valid"));
}

#[test]
fn test_resources_of_other_roles_are_ignored() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], Vec::new());
    let mut foreign = unreserved_scalar("cpus", 8.0);
    foreign.allocation_role = Some("other-role".to_string());

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &[offer("offer-1", vec![foreign])]).unwrap();

    assert!(operations.is_empty());
}

#[test]
fn test_pre_reserved_role_refines_static_reservation() {
    let pod = single_task_pod(vec![simple(cpus(1.0).with_pre_reserved_role("slave_public"))], Vec::new());
    let mut public_cpus = unreserved_scalar("cpus", 2.0);
    public_cpus.reservations.push(ReservationInfo::new_static("slave_public"));
    let offers = [offer("unreserved", vec![unreserved_scalar("cpus", 4.0)]), offer("public", vec![public_cpus])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers).unwrap();

    assert_eq!(operations[0].offer_id().as_str(), "public");
    let reservations = &operations[0].resource().unwrap().reservations;
    assert_eq!(reservations.len(), 2);
    assert_eq!(reservations[0].role, "slave_public");
    assert_eq!(reservations[1].role, ROLE);
}

#[derive(Debug)]
struct OnlyHost(&'static str);

impl PlacementRule for OnlyHost {
    fn filter(&self, offer: &Offer, _pod_instance: &PodInstance, _tasks: &[TaskInfo]) -> EvaluationOutcome {
        if offer.hostname == self.0 {
            EvaluationOutcome::pass("OnlyHost", Vec::new(), format!("Offer is on {}", self.0))
        } else {
            EvaluationOutcome::fail("OnlyHost", FailureReason::PlacementRejected, format!("Offer is on {}, not {}", offer.hostname, self.0))
        }
    }
}

#[test]
fn test_placement_rule_filters_offers() {
    let mut pod = single_task_pod(vec![simple(cpus(1.0))], Vec::new());
    pod.placement_rule = Some(Arc::new(OnlyHost("host-2")));
    let first = Offer::new("offer-1", "agent-1", "host-1").with_resource(unreserved_scalar("cpus", 2.0));
    let second = Offer::new("offer-2", "agent-2", "host-2").with_resource(unreserved_scalar("cpus", 2.0));

    let operations = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &[first, second]).unwrap();

    assert!(operations.iter().all(|operation| operation.offer_id().as_str() == "offer-2"));
    assert_eq!(launched_task(&operations, "server").label(labels::OFFER_HOSTNAME), Some("host-2"));
}

#[test]
fn test_malformed_pod_is_an_error() {
    let pod = pod(vec![TaskSpec::new("server", "missing-resources")], vec![resource_set("server-resources", vec![simple(cpus(1.0))], Vec::new())]);
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0)])];

    let result = new_pod_evaluator(false).evaluate(&requirement(pod, &["server"]), &offers);

    assert!(matches!(result, Err(Error::InvalidRequirement(_))), "Expected InvalidRequirement, got {:?}", result);
}

#[test]
fn test_unknown_task_to_launch_is_an_error() {
    let pod = single_task_pod(vec![simple(cpus(1.0))], Vec::new());

    let result = new_pod_evaluator(false).evaluate(&requirement(pod, &["server", "ghost"]), &[]);

    assert!(matches!(result, Err(Error::InvalidRequirement(_))));
}

#[derive(Debug)]
struct StaticSecrets;

impl TlsProvisioner for StaticSecrets {
    fn provision(&self, task_name: &str, spec: &TransportEncryptionSpec) -> Result<Vec<String>, String> {
        Ok(vec![format!("{}/{}.crt", task_name, spec.name), format!("{}/{}.key", task_name, spec.name)])
    }
}

fn tls_pod() -> PodSpec {
    let mut server = TaskSpec::new("server", "server-resources");
    server.transport_encryption = vec![TransportEncryptionSpec { name: "server".to_string(), kind: TransportEncryptionKind::Tls }];
    pod(vec![server], vec![resource_set("server-resources", vec![simple(cpus(1.0))], Vec::new())])
}

#[test]
fn test_tls_artifacts_are_attached_to_the_task() {
    let evaluator = new_pod_evaluator(false).with_tls_provisioner(Arc::new(StaticSecrets));
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0)])];

    let operations = evaluator.evaluate(&requirement(tls_pod(), &["server"]), &offers).unwrap();

    assert_eq!(launched_task(&operations, "server").secrets, vec!["hello-0-server/server.crt".to_string(), "hello-0-server/server.key".to_string()]);
}

#[test]
fn test_tls_without_provisioner_rejects_offer() {
    let offers = [offer("offer-1", vec![unreserved_scalar("cpus", 2.0)])];

    let operations = new_pod_evaluator(false).evaluate(&requirement(tls_pod(), &["server"]), &offers).unwrap();

    assert!(operations.is_empty());
}
