//! Dependency indexes owned by the coordinator.
//!
//! Four lookup structures, mutated only from inside a run-loop pass:
//!
//! - id index: managed order id → the order itself (ownership lives here)
//! - attach index: parent id → child ids awaiting the parent's fill
//! - OCA index: group id → member ids
//! - router index: (router id, router order id) → managed order id
//!
//! Attach entries and OCA groups are removed single-shot: once an entry is
//! taken it is never delivered again for that parent or group, which is what
//! makes cascade delivery exactly-once under replayed events.

use std::collections::{HashMap, HashSet};

use crate::domain::managed_order::ManagedOrder;
use crate::domain::shared::{ManagedOrderId, OcaGroupId, RouterId, RouterOrderId};

#[derive(Default)]
pub(crate) struct DependencyIndexes {
    orders: HashMap<ManagedOrderId, ManagedOrder>,
    attached: HashMap<ManagedOrderId, Vec<ManagedOrderId>>,
    oca: HashMap<OcaGroupId, Vec<ManagedOrderId>>,
    /// Groups already settled by a member fill. A retired group is never
    /// re-created by a later registration; the declaring order self-cancels
    /// at submit time instead.
    retired_oca: HashSet<OcaGroupId>,
    by_router: HashMap<(RouterId, RouterOrderId), ManagedOrderId>,
}

impl DependencyIndexes {
    /// Register an accepted order: id index, attach entry under its parent,
    /// and every declared OCA membership. Memberships in retired groups are
    /// not added.
    pub(crate) fn register(&mut self, order: ManagedOrder) {
        let id = order.id().clone();
        if let Some(parent) = order.attached_to() {
            self.attached
                .entry(parent.clone())
                .or_default()
                .push(id.clone());
        }
        for group in order.oca_groups() {
            if self.retired_oca.contains(group) {
                continue;
            }
            self.oca.entry(group.clone()).or_default().push(id.clone());
        }
        self.orders.insert(id, order);
    }

    pub(crate) fn order(&self, id: &ManagedOrderId) -> Option<&ManagedOrder> {
        self.orders.get(id)
    }

    pub(crate) fn order_mut(&mut self, id: &ManagedOrderId) -> Option<&mut ManagedOrder> {
        self.orders.get_mut(id)
    }

    pub(crate) fn order_ids(&self) -> impl Iterator<Item = &ManagedOrderId> {
        self.orders.keys()
    }

    /// Record the router-assigned id for a successfully submitted order.
    pub(crate) fn record_router_order(
        &mut self,
        router: RouterId,
        router_order_id: RouterOrderId,
        id: ManagedOrderId,
    ) {
        self.by_router.insert((router, router_order_id), id);
    }

    /// Resolve an inbound router event to the owning managed order.
    pub(crate) fn resolve(
        &self,
        router: &RouterId,
        router_order_id: RouterOrderId,
    ) -> Option<ManagedOrderId> {
        self.by_router
            .get(&(router.clone(), router_order_id))
            .cloned()
    }

    pub(crate) fn has_group(&self, group: &OcaGroupId) -> bool {
        self.oca.contains_key(group)
    }

    /// Remove a group entirely and return its members. Single-shot: a group
    /// does not survive its first fill, and the retirement is remembered so
    /// a later registration cannot resurrect it.
    pub(crate) fn retire_group(&mut self, group: &OcaGroupId) -> Option<Vec<ManagedOrderId>> {
        self.retired_oca.insert(group.clone());
        self.oca.remove(group)
    }

    /// Remove one member from a still-active group. The group stays active
    /// for any remaining members; an emptied entry is dropped.
    pub(crate) fn remove_member(&mut self, group: &OcaGroupId, id: &ManagedOrderId) {
        if let Some(members) = self.oca.get_mut(group) {
            members.retain(|m| m != id);
            if members.is_empty() {
                self.oca.remove(group);
            }
        }
    }

    /// Remove a parent's attach entry and return its children. Single-shot:
    /// replaying the same parent event finds nothing to cascade.
    pub(crate) fn take_children(&mut self, parent: &ManagedOrderId) -> Option<Vec<ManagedOrderId>> {
        self.attached.remove(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockExecutionRouter;
    use crate::domain::shared::Symbol;
    use std::sync::Arc;

    fn order() -> ManagedOrder {
        let mut router = MockExecutionRouter::new();
        router
            .expect_router_id()
            .return_const(crate::domain::shared::RouterId::new("test"));
        ManagedOrder::market(Arc::new(router), Symbol::new("SPY"), 10)
    }

    #[test]
    fn register_populates_all_indexes() {
        let mut indexes = DependencyIndexes::default();

        let parent = order();
        let parent_id = parent.id().clone();
        let mut child = order();
        child.attach_to(parent_id.clone());
        let group = OcaGroupId::generate();
        child.join_oca_group(group.clone());
        let child_id = child.id().clone();

        indexes.register(parent);
        indexes.register(child);

        assert!(indexes.order(&parent_id).is_some());
        assert!(indexes.has_group(&group));
        assert_eq!(
            indexes.take_children(&parent_id),
            Some(vec![child_id.clone()])
        );
        assert_eq!(indexes.retire_group(&group), Some(vec![child_id]));
    }

    #[test]
    fn take_children_is_single_shot() {
        let mut indexes = DependencyIndexes::default();
        let parent = order();
        let parent_id = parent.id().clone();
        let mut child = order();
        child.attach_to(parent_id.clone());
        indexes.register(parent);
        indexes.register(child);

        assert!(indexes.take_children(&parent_id).is_some());
        assert!(indexes.take_children(&parent_id).is_none());
    }

    #[test]
    fn retired_group_is_not_recreated_by_registration() {
        let mut indexes = DependencyIndexes::default();
        let group = OcaGroupId::generate();
        let mut a = order();
        a.join_oca_group(group.clone());
        indexes.register(a);
        assert!(indexes.retire_group(&group).is_some());

        let mut late = order();
        late.join_oca_group(group.clone());
        indexes.register(late);

        assert!(!indexes.has_group(&group));
        assert!(indexes.retire_group(&group).is_none());
    }

    #[test]
    fn remove_member_keeps_group_active_for_others() {
        let mut indexes = DependencyIndexes::default();
        let group = OcaGroupId::generate();
        let mut a = order();
        a.join_oca_group(group.clone());
        let a_id = a.id().clone();
        let mut b = order();
        b.join_oca_group(group.clone());
        let b_id = b.id().clone();
        indexes.register(a);
        indexes.register(b);

        indexes.remove_member(&group, &a_id);
        assert!(indexes.has_group(&group));
        assert_eq!(indexes.retire_group(&group), Some(vec![b_id]));
    }

    #[test]
    fn remove_last_member_drops_group_entry() {
        let mut indexes = DependencyIndexes::default();
        let group = OcaGroupId::generate();
        let mut a = order();
        a.join_oca_group(group.clone());
        let a_id = a.id().clone();
        indexes.register(a);

        indexes.remove_member(&group, &a_id);
        assert!(!indexes.has_group(&group));
    }

    #[test]
    fn resolve_round_trips_router_assignment() {
        let mut indexes = DependencyIndexes::default();
        let o = order();
        let id = o.id().clone();
        indexes.register(o);

        let router = RouterId::new("sim");
        indexes.record_router_order(router.clone(), RouterOrderId::new(9), id.clone());

        assert_eq!(indexes.resolve(&router, RouterOrderId::new(9)), Some(id));
        assert_eq!(indexes.resolve(&router, RouterOrderId::new(10)), None);
        assert_eq!(
            indexes.resolve(&RouterId::new("other"), RouterOrderId::new(9)),
            None
        );
    }
}
