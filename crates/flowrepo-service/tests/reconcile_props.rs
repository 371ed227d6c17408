//! Reconciliation invariants over arbitrary drift

use flowrepo_core::{
    Capability, Flow, FlowStore, PermissionGateway, PermissionsMap, ResourcePermissions,
    FLOW_RESOURCE_CLASS,
};
use flowrepo_test_utils::{caller, Harness, USERS};
use proptest::prelude::*;

/// State of one stored flow's record before reconciliation
#[derive(Debug, Clone)]
enum Drift {
    /// No record
    Missing,
    /// Owner entry intact
    Intact,
    /// Owner downgraded to read
    Downgraded,
    /// Only another user holds rights
    Foreign(usize),
}

fn drift() -> impl Strategy<Value = Drift> {
    prop_oneof![
        Just(Drift::Missing),
        Just(Drift::Intact),
        Just(Drift::Downgraded),
        (0..USERS.len()).prop_map(Drift::Foreign),
    ]
}

fn seed(harness: &Harness, flows: &[(usize, Drift)], orphans: usize) -> Vec<(String, String)> {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async {
        let mut seeded = Vec::new();
        for (n, (owner, drift)) in flows.iter().enumerate() {
            let owner = USERS[*owner].to_string();
            let mut flow = Flow::new(format!("flow-{n}"));
            flow.user_id.clone_from(&owner);
            let id = harness.store.insert(flow).await.unwrap().as_str().to_string();

            let record = match drift {
                Drift::Missing => None,
                Drift::Intact => Some(ResourcePermissions::owned_by(&owner)),
                Drift::Downgraded => Some(
                    ResourcePermissions::default().with_user(owner.clone(), PermissionsMap::read_only()),
                ),
                Drift::Foreign(other) => Some(ResourcePermissions::owned_by(USERS[*other])),
            };
            if let Some(record) = record {
                harness.authority.seed_record(FLOW_RESOURCE_CLASS, &id, record);
            }
            seeded.push((id, owner));
        }
        for n in 0..orphans {
            harness.authority.seed_record(
                FLOW_RESOURCE_CLASS,
                &format!("orphan-{n}"),
                ResourcePermissions::owned_by("alice"),
            );
        }
        seeded
    })
}

proptest! {
    #[test]
    fn prop_reconciliation_converges_and_is_idempotent(
        flows in proptest::collection::vec((0..USERS.len(), drift()), 0..20),
        orphans in 0..5usize,
    ) {
        let harness = Harness::new();
        let seeded = seed(&harness, &flows, orphans);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let first = runtime.block_on(harness.reconciler().run()).unwrap();
        prop_assert_eq!(first.flows_scanned, flows.len());
        prop_assert_eq!(first.orphans_removed, orphans);
        prop_assert_eq!(first.records_written + first.records_unchanged, flows.len());

        let ids = harness.authority.resource_ids(FLOW_RESOURCE_CLASS);
        prop_assert_eq!(ids.len(), seeded.len());

        for ((id, owner), (_, drift)) in seeded.iter().zip(&flows) {
            let record = harness.authority.record(FLOW_RESOURCE_CLASS, id).unwrap();
            prop_assert_eq!(record.user_permissions.get(owner), Some(&PermissionsMap::full()));
            if let Drift::Foreign(other) = drift {
                prop_assert_eq!(record.user_permissions.get(USERS[*other]), Some(&PermissionsMap::full()));
            }

            let allowed = runtime
                .block_on(harness.authority.check_capability(
                    &caller(owner).credential,
                    FLOW_RESOURCE_CLASS,
                    id,
                    Capability::Administrate,
                ))
                .unwrap();
            prop_assert!(allowed);
        }

        let writes = harness.authority.mutation_count();
        let second = runtime.block_on(harness.reconciler().run()).unwrap();
        prop_assert!(second.is_noop());
        prop_assert_eq!(second.records_unchanged, flows.len());
        prop_assert_eq!(harness.authority.mutation_count(), writes);
    }
}
