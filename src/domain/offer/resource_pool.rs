use std::collections::HashMap;

use crate::domain::offer::offer::Offer;
use crate::domain::offer::resource::{ANY_ROLE, Resource, ReservationInfo};
use crate::domain::offer::value::Value;
use crate::domain::utils::id::ResourceId;

/// In-memory index of one offer's resources, scoped to a single evaluation attempt.
///
/// Resources are split into three partitions:
/// 1. **Reserved**: carry our resource id label, looked up by that id.
/// 2. **Unreserved atomic**: MOUNT disks, consumed whole and first-fit in offer order.
/// 3. **Unreserved merged**: everything else, summed per pre-reserved role and resource name.
#[derive(Debug)]
pub struct ResourcePool {
    offer: Offer,
    reserved_by_id: HashMap<ResourceId, Resource>,
    unreserved_atomic: HashMap<String, Vec<Resource>>,
    unreserved_merged: HashMap<String, HashMap<String, Value>>,
}

impl ResourcePool {
    /// Builds the pool for `offer`, hiding resources allocated to a role other than `role` or `*`.
    pub fn new(offer: Offer, role: &str) -> Self {
        let mut reserved_by_id = HashMap::new();
        let mut unreserved_atomic: HashMap<String, Vec<Resource>> = HashMap::new();
        let mut unreserved_merged: HashMap<String, HashMap<String, Value>> = HashMap::new();

        for resource in &offer.resources {
            if let Some(allocation_role) = resource.allocation_role.as_deref() {
                if allocation_role != role && allocation_role != ANY_ROLE {
                    log::debug!("Ignoring {} allocated to role {}", resource, allocation_role);
                    continue;
                }
            }

            if !resource.is_well_typed() {
                log::warn!("Ignoring {} in offer {}: {} quantity does not fit a {} resource", resource, offer.id, resource.value.value_type(), resource.name);
                continue;
            }

            if let Some(resource_id) = resource.resource_id() {
                reserved_by_id.insert(resource_id, resource.clone());
            } else if resource.is_atomic() {
                unreserved_atomic.entry(resource.name.clone()).or_default().push(resource.clone());
            } else {
                let by_name = unreserved_merged.entry(resource.role().to_string()).or_default();
                let merged = match by_name.get(&resource.name) {
                    Some(existing) if existing.value_type() != resource.value.value_type() => {
                        log::warn!("Ignoring {} in offer {}: earlier {} resources were {}", resource, offer.id, resource.name, existing.value_type());
                        continue;
                    }
                    Some(existing) => existing + &resource.value,
                    None => resource.value.clone(),
                };
                by_name.insert(resource.name.clone(), merged);
            }
        }

        Self { offer, reserved_by_id, unreserved_atomic, unreserved_merged }
    }

    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    pub fn reserved_resource(&self, resource_id: &ResourceId) -> Option<&Resource> {
        self.reserved_by_id.get(resource_id)
    }

    /// Unreserved mergeable quantities available under `role`, keyed by resource name.
    pub fn unreserved_merged(&self, role: &str) -> Option<&HashMap<String, Value>> {
        self.unreserved_merged.get(role)
    }

    /// Takes the reservation `resource_id` out of the pool.
    ///
    /// The reservation is returned exactly as offered so the caller can compute a resize delta. For
    /// mergeable resources any quantity above `value` stays in the pool; atomic resources are only
    /// handed out when they satisfy `value` and never split.
    pub fn consume_reserved(&mut self, name: &str, value: &Value, resource_id: &ResourceId) -> Option<Resource> {
        let Some(reserved) = self.reserved_by_id.get(resource_id).cloned() else {
            log::warn!("Failed to find reserved {} with resource id {}", name, resource_id);
            return None;
        };

        if reserved.name != name {
            log::warn!("Reservation {} holds {} but {} was requested", resource_id, reserved.name, name);
            return None;
        }

        if reserved.is_atomic() {
            if !value.is_satisfied_by(&reserved.value) {
                log::warn!("Reserved atomic {} with resource id {} is too small: offered {} < requested {}", name, resource_id, reserved.value, value);
                return None;
            }
            self.reserved_by_id.remove(resource_id);
        } else if value.compare(&reserved.value).is_ok_and(|ordering| ordering.is_lt()) {
            let remaining = &reserved.value - value;
            self.reserved_by_id.insert(resource_id.clone(), reserved.with_value(remaining));
        } else {
            self.reserved_by_id.remove(resource_id);
        }

        Some(reserved)
    }

    /// First atomic resource named `name` whose quantity covers `value`, in offer order.
    pub fn consume_atomic(&mut self, name: &str, value: &Value) -> Option<Resource> {
        let candidates = self.unreserved_atomic.get_mut(name)?;
        let position = candidates.iter().position(|candidate| value.is_satisfied_by(&candidate.value));

        match position {
            Some(index) => {
                let resource = candidates.remove(index);
                if candidates.is_empty() {
                    self.unreserved_atomic.remove(name);
                }
                Some(resource)
            }
            None => {
                log::info!("No atomic {} in offer {} satisfies {}", name, self.offer.id, value);
                None
            }
        }
    }

    /// Subtracts `value` from the unreserved pool of `pre_reserved_role`.
    ///
    /// The returned resource carries the STATIC reservation of the pre-reserved role (if any) so the caller
    /// can refine it further with its own dynamic reservation.
    pub fn consume_reservable_merged(&mut self, name: &str, value: &Value, pre_reserved_role: &str) -> Option<Resource> {
        let Some(available) = self.unreserved_merged.get_mut(pre_reserved_role).and_then(|by_name| by_name.get_mut(name)) else {
            log::info!("Offer {} has no unreserved {} for role {}", self.offer.id, name, pre_reserved_role);
            return None;
        };

        if !value.is_satisfied_by(available) {
            log::info!("Offer {} has insufficient {} for role {}: offered {} < requested {}", self.offer.id, name, pre_reserved_role, available, value);
            return None;
        }

        let remaining = &*available - value;
        if remaining.is_zero() {
            if let Some(by_name) = self.unreserved_merged.get_mut(pre_reserved_role) {
                by_name.remove(name);
            }
        } else {
            *available = remaining;
        }

        let mut resource = Resource::new(name, value.clone());
        if pre_reserved_role != ANY_ROLE {
            resource.reservations.push(ReservationInfo::new_static(pre_reserved_role));
        }
        Some(resource)
    }

    /// Returns a released reservation to the unreserved partitions.
    pub fn free(&mut self, resource: &Resource) {
        if let Some(resource_id) = resource.resource_id() {
            self.reserved_by_id.remove(&resource_id);
        }

        if resource.is_atomic() {
            self.unreserved_atomic.entry(resource.name.clone()).or_default().push(resource.released());
            return;
        }

        let by_name = self.unreserved_merged.entry(resource.previous_role().to_string()).or_default();
        let merged = match by_name.get(&resource.name) {
            Some(existing) if existing.value_type() != resource.value.value_type() => {
                log::warn!("Not returning {} to offer {}: pool holds {} {}", resource, self.offer.id, existing.value_type(), resource.name);
                return;
            }
            Some(existing) => existing + &resource.value,
            None => resource.value.clone(),
        };
        by_name.insert(resource.name.clone(), merged);
    }

    /// Sum over every partition of what is still available for `name`, counting only quantities of the
    /// first type found.
    pub fn remaining(&self, name: &str) -> Option<Value> {
        let reserved = self.reserved_by_id.values().filter(|resource| resource.name == name).map(|resource| &resource.value);
        let atomic = self.unreserved_atomic.get(name).into_iter().flatten().map(|resource| &resource.value);
        let merged = self.unreserved_merged.values().filter_map(|by_name| by_name.get(name));

        reserved.chain(atomic).chain(merged).fold(None, |total: Option<Value>, value| match total {
            Some(total) if total.value_type() == value.value_type() => Some(&total + value),
            Some(total) => Some(total),
            None => Some(value.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::offer::resource::{DiskInfo, DiskSource, DiskSourceKind};
    use crate::domain::offer::value::Range;

    fn reserved(name: &str, value: Value, resource_id: &str) -> Resource {
        let mut resource = Resource::new(name, value);
        resource.reservations.push(ReservationInfo::new_dynamic("test-role", None, &ResourceId::new(resource_id)));
        resource
    }

    fn mount_disk(size: f64, root: &str) -> Resource {
        let mut resource = Resource::new("disk", Value::scalar(size));
        resource.disk = Some(DiskInfo {
            source: Some(DiskSource { kind: DiskSourceKind::Mount, root: Some(root.to_string()) }),
            persistence: None,
            volume: None,
        });
        resource
    }

    fn offer(resources: Vec<Resource>) -> Offer {
        resources.into_iter().fold(Offer::new("offer-1", "agent-1", "host-1"), |offer, resource| offer.with_resource(resource))
    }

    #[test]
    fn test_partitioning() {
        let pool = ResourcePool::new(
            offer(vec![
                Resource::new("cpus", Value::scalar(1.0)),
                Resource::new("cpus", Value::scalar(1.0)),
                reserved("mem", Value::scalar(128.0), "abc"),
                mount_disk(1000.0, "/mnt/a"),
            ]),
            "test-role",
        );

        assert_eq!(pool.unreserved_merged(ANY_ROLE).unwrap().get("cpus"), Some(&Value::scalar(2.0)), "Unreserved cpus should be merged");
        assert!(pool.reserved_resource(&ResourceId::new("abc")).is_some());
        assert_eq!(pool.remaining("disk"), Some(Value::scalar(1000.0)));
    }

    #[test]
    fn test_allocation_role_filtering() {
        let mut foreign = Resource::new("cpus", Value::scalar(4.0));
        foreign.allocation_role = Some("other-role".to_string());
        let mut ours = Resource::new("cpus", Value::scalar(1.0));
        ours.allocation_role = Some("test-role".to_string());

        let pool = ResourcePool::new(offer(vec![foreign, ours]), "test-role");

        assert_eq!(pool.remaining("cpus"), Some(Value::scalar(1.0)));
    }

    #[test]
    fn test_mistyped_resources_are_ignored() {
        let pool = ResourcePool::new(
            offer(vec![
                Resource::new("cpus", Value::scalar(1.0)),
                Resource::new("cpus", Value::ranges(vec![Range::new(1, 2)])),
                Resource::new("ports", Value::scalar(3.0)),
                Resource::new("licenses", Value::scalar(2.0)),
                Resource::new("licenses", Value::ranges(vec![Range::new(1, 2)])),
            ]),
            "test-role",
        );

        assert_eq!(pool.remaining("cpus"), Some(Value::scalar(1.0)));
        assert_eq!(pool.remaining("ports"), None);
        assert_eq!(pool.remaining("licenses"), Some(Value::scalar(2.0)), "The first quantity type seen for a custom resource wins");
    }

    #[test]
    fn test_consume_with_mismatched_type_fails() {
        let mut pool = ResourcePool::new(offer(vec![Resource::new("licenses", Value::scalar(2.0))]), "test-role");

        assert!(pool.consume_reservable_merged("licenses", &Value::single_range(1), ANY_ROLE).is_none());
        assert_eq!(pool.remaining("licenses"), Some(Value::scalar(2.0)));
    }

    #[test]
    fn test_consume_reservable_merged() {
        let mut pool = ResourcePool::new(offer(vec![Resource::new("cpus", Value::scalar(2.0))]), "test-role");

        let consumed = pool.consume_reservable_merged("cpus", &Value::scalar(1.5), ANY_ROLE).unwrap();
        assert_eq!(consumed.value, Value::scalar(1.5));
        assert!(consumed.reservations.is_empty());

        assert!(pool.consume_reservable_merged("cpus", &Value::scalar(1.0), ANY_ROLE).is_none(), "Only 0.5 cpus should be left");
        assert_eq!(pool.remaining("cpus"), Some(Value::scalar(0.5)));
    }

    #[test]
    fn test_consume_reservable_merged_from_pre_reserved_role() {
        let mut pre_reserved = Resource::new("mem", Value::scalar(512.0));
        pre_reserved.reservations.push(ReservationInfo::new_static("slave_public"));
        let mut pool = ResourcePool::new(offer(vec![pre_reserved, Resource::new("mem", Value::scalar(64.0))]), "test-role");

        assert!(pool.consume_reservable_merged("mem", &Value::scalar(256.0), ANY_ROLE).is_none());

        let consumed = pool.consume_reservable_merged("mem", &Value::scalar(256.0), "slave_public").unwrap();
        assert_eq!(consumed.role(), "slave_public");
    }

    #[test]
    fn test_consume_reserved_keeps_remainder() {
        let mut pool = ResourcePool::new(offer(vec![reserved("cpus", Value::scalar(1.0), "abc")]), "test-role");
        let resource_id = ResourceId::new("abc");

        let consumed = pool.consume_reserved("cpus", &Value::scalar(0.5), &resource_id).unwrap();

        assert_eq!(consumed.value, Value::scalar(1.0), "The full reservation should be handed back");
        assert_eq!(pool.reserved_resource(&resource_id).map(|resource| resource.value.clone()), Some(Value::scalar(0.5)));
    }

    #[test]
    fn test_consume_reserved_ports() {
        let mut pool = ResourcePool::new(offer(vec![reserved("ports", Value::ranges(vec![Range::new(4040, 4041)]), "p")]), "test-role");

        let consumed = pool.consume_reserved("ports", &Value::single_range(4040), &ResourceId::new("p")).unwrap();

        assert_eq!(consumed.value, Value::ranges(vec![Range::new(4040, 4041)]));
        assert_eq!(pool.remaining("ports"), Some(Value::single_range(4041)));
    }

    #[test]
    fn test_consume_atomic_is_first_fit() {
        let mut pool = ResourcePool::new(offer(vec![mount_disk(100.0, "/mnt/small"), mount_disk(5000.0, "/mnt/big"), mount_disk(2000.0, "/mnt/mid")]), "test-role");

        let consumed = pool.consume_atomic("disk", &Value::scalar(1000.0)).unwrap();

        assert_eq!(consumed.source_root(), Some("/mnt/big"), "First sufficient disk in offer order should win");
        assert_eq!(consumed.value, Value::scalar(5000.0), "Atomic resources are never split");
        assert_eq!(pool.remaining("disk"), Some(Value::scalar(2100.0)));
    }

    #[test]
    fn test_consume_reserved_atomic_requires_sufficiency() {
        let mut disk = mount_disk(100.0, "/mnt/a");
        disk.reservations.push(ReservationInfo::new_dynamic("test-role", None, &ResourceId::new("d")));
        let mut pool = ResourcePool::new(offer(vec![disk]), "test-role");

        assert!(pool.consume_reserved("disk", &Value::scalar(200.0), &ResourceId::new("d")).is_none());
        assert!(pool.consume_reserved("disk", &Value::scalar(50.0), &ResourceId::new("d")).is_some());
        assert!(pool.reserved_resource(&ResourceId::new("d")).is_none());
    }

    #[test]
    fn test_free_returns_to_previous_role() {
        let mut resource = Resource::new("cpus", Value::scalar(1.0));
        resource.reservations.push(ReservationInfo::new_static("slave_public"));
        resource.reservations.push(ReservationInfo::new_dynamic("test-role", None, &ResourceId::new("abc")));
        let mut pool = ResourcePool::new(offer(vec![resource.clone()]), "test-role");

        pool.free(&resource);

        assert!(pool.reserved_resource(&ResourceId::new("abc")).is_none());
        assert_eq!(pool.unreserved_merged("slave_public").unwrap().get("cpus"), Some(&Value::scalar(1.0)));
    }

    #[test]
    fn test_pool_never_exceeds_offer() {
        let mut pool = ResourcePool::new(
            offer(vec![Resource::new("cpus", Value::scalar(3.0)), reserved("cpus", Value::scalar(1.0), "abc")]),
            "test-role",
        );
        let original = pool.remaining("cpus").unwrap();

        let consumed = pool.consume_reservable_merged("cpus", &Value::scalar(2.0), ANY_ROLE).unwrap();
        let held = pool.consume_reserved("cpus", &Value::scalar(1.0), &ResourceId::new("abc")).unwrap();
        pool.free(&held);

        let remaining = pool.remaining("cpus").unwrap();
        assert!((&(&remaining + &consumed.value) - &original).is_zero(), "Pool grew beyond the offer: {} + {} > {}", remaining, consumed.value, original);
    }
}
