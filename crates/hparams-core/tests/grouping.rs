use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use hparams_core::{
    CancellationToken, ExperimentInfo, HParamValue, ListSessionGroupsRequest, QueryEngine,
    Session, Snapshot,
};
use proptest::prelude::*;

const LRS: [f64; 3] = [0.1, 0.2, 0.3];
const OPTIMIZERS: [&str; 2] = ["adam", "sgd"];

fn build_session(idx: usize, lr: Option<usize>, opt: Option<usize>) -> Session {
    let mut session = Session::new(format!("s{idx:03}"), Utc::now());
    if let Some(lr) = lr {
        session = session.with_hparam("lr", LRS[lr]);
    }
    if let Some(opt) = opt {
        session = session.with_hparam("optimizer", OPTIMIZERS[opt]);
    }
    session
}

fn all_groups(sessions: Vec<Session>) -> Vec<(String, BTreeMap<String, HParamValue>, Vec<String>)> {
    let snapshot = Snapshot::new(ExperimentInfo::new("exp"), sessions).expect("snapshot");
    let response = QueryEngine::default()
        .list_session_groups(
            &snapshot,
            &ListSessionGroupsRequest::new(10_000),
            &CancellationToken::new(),
        )
        .expect("query");
    assert_eq!(response.total_size, response.session_groups.len());
    response
        .session_groups
        .into_iter()
        .map(|g| {
            let names = g.session_names().iter().map(|s| s.to_string()).collect();
            (g.name, g.hparams, names)
        })
        .collect()
}

// ---- fixed cases ----

#[test]
fn unset_hparam_forms_its_own_group() {
    let groups = all_groups(vec![
        build_session(0, Some(0), Some(0)),
        build_session(1, Some(0), None),
        build_session(2, Some(0), Some(0)),
    ]);
    assert_eq!(groups.len(), 2);
    let unset = groups
        .iter()
        .find(|(_, hparams, _)| !hparams.contains_key("optimizer"))
        .expect("group without optimizer");
    assert_eq!(unset.2, vec!["s001"]);
}

#[test]
fn group_named_after_smallest_member() {
    let groups = all_groups(vec![
        build_session(9, Some(1), None),
        build_session(4, Some(1), None),
        build_session(7, Some(1), None),
    ]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].0, "s004");
    assert_eq!(groups[0].2, vec!["s004", "s007", "s009"]);
}

#[test]
fn numerically_equal_values_share_group() {
    let now = Utc::now();
    let groups = all_groups(vec![
        Session::new("a", now).with_hparam("x", 0.0),
        Session::new("b", now).with_hparam("x", -0.0),
    ]);
    assert_eq!(groups.len(), 1);
}

#[test]
fn string_and_number_never_share_group() {
    let now = Utc::now();
    let groups = all_groups(vec![
        Session::new("a", now).with_hparam("x", 1.0),
        Session::new("b", now).with_hparam("x", "1"),
    ]);
    assert_eq!(groups.len(), 2);
}

#[test]
fn empty_snapshot_has_no_groups() {
    assert!(all_groups(Vec::new()).is_empty());
}

// ---- partition properties ----

fn sessions_strategy() -> impl Strategy<Value = Vec<Session>> {
    prop::collection::vec(
        (
            prop::option::of(0..LRS.len()),
            prop::option::of(0..OPTIMIZERS.len()),
        ),
        0..40,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(idx, (lr, opt))| build_session(idx, lr, opt))
            .collect()
    })
}

proptest! {
    #[test]
    fn every_session_lands_in_exactly_one_group(sessions in sessions_strategy()) {
        let input: BTreeSet<String> = sessions.iter().map(|s| s.name.clone()).collect();
        let groups = all_groups(sessions);

        let mut seen = BTreeSet::new();
        for (_, _, members) in &groups {
            for name in members {
                prop_assert!(seen.insert(name.clone()), "{} in two groups", name);
            }
        }
        prop_assert_eq!(seen, input);
    }

    #[test]
    fn groups_are_exactly_the_distinct_tuples(sessions in sessions_strategy()) {
        let by_name: BTreeMap<String, BTreeMap<String, HParamValue>> = sessions
            .iter()
            .map(|s| (s.name.clone(), s.hparams.clone()))
            .collect();
        let groups = all_groups(sessions);

        for (_, hparams, members) in &groups {
            for name in members {
                prop_assert_eq!(&by_name[name], hparams);
            }
        }
        for (i, a) in groups.iter().enumerate() {
            for b in groups.iter().skip(i + 1) {
                prop_assert_ne!(&a.1, &b.1);
            }
        }
    }
}
