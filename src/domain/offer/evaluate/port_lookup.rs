use crate::domain::specification::resource_spec::PortSpec;
use crate::domain::state::task::TaskInfo;

/// Port number a previous launch of `task` used for `port`.
///
/// Discovery metadata is authoritative. Descriptors written before ports were recorded in discovery only
/// carry the port in the command environment, so that is consulted second.
pub fn prior_task_port(task: &TaskInfo, port: &PortSpec) -> Option<u64> {
    discovery_port(task, &port.port_name).or_else(|| environment_port(task, &port.env_key()))
}

fn discovery_port(task: &TaskInfo, port_name: &str) -> Option<u64> {
    task.discovery.as_ref()?.ports.iter().find(|discovered| discovered.name == port_name).map(|discovered| discovered.number)
}

fn environment_port(task: &TaskInfo, env_key: &str) -> Option<u64> {
    let value = task.command.as_ref()?.environment.get(env_key)?;
    match value.parse::<u64>() {
        Ok(port) => {
            log::debug!("Recovered port {} of task {} from legacy environment variable {}", port, task.name, env_key);
            Some(port)
        }
        Err(e) => {
            log::warn!("Task {} has unparseable port '{}' in {}: {}", task.name, value, env_key, e);
            None
        }
    }
}
