mod common;

use latent_pcfg::{state_name, SplitCounts};
use proptest::prelude::*;
use test_case::test_case;

use common::toy_corpus;

#[test_case("NP", 0, "NP^0" ; "first substate")]
#[test_case("NP", 3, "NP^3" ; "later substate")]
#[test_case("ROOT", 0, "ROOT" ; "start symbol ignores index")]
#[test_case("ROOT", 7, "ROOT" ; "start symbol ignores large index")]
#[test_case(".$$.", 2, ".$$." ; "boundary tag ignores index")]
fn substate_names(label: &str, index: usize, expected: &str) {
    let counts = SplitCounts::new(["ROOT"], ".$$.");
    assert_eq!(counts.state_name(label, index), expected);
}

#[test_case("ROOT", true, true ; "start symbol")]
#[test_case(".$$.", false, true ; "boundary tag")]
#[test_case("NP", false, false ; "ordinary label")]
fn unsplittable_labels(label: &str, start: bool, unsplittable: bool) {
    let counts = SplitCounts::new(["ROOT"], ".$$.");
    assert_eq!(counts.is_start_symbol(label), start);
    assert_eq!(counts.is_unsplittable(label), unsplittable);
    assert_eq!(counts.boundary_tag(), ".$$.");
}

#[test]
fn free_state_name_follows_unsplittable_flag() {
    assert_eq!(state_name("VP", 1, false), "VP^1");
    assert_eq!(state_name("VP", 1, true), "VP");
}

#[test]
fn state_index_follows_insertion_order() {
    let mut counts = SplitCounts::new(Vec::<String>::new(), ".$$.");
    counts.set_split_count("NP", 2);
    counts.set_split_count("VP", 3);
    counts.set_split_count("ROOT", 1);

    let index = counts.build_state_index();
    let names: Vec<&str> = index.iter().collect();
    assert_eq!(names, ["NP^0", "NP^1", "VP^0", "VP^1", "VP^2", "ROOT^0"]);
    assert_eq!(index.index_of("VP^1"), Some(3));
}

#[test]
fn original_states_from_corpus_start_at_one() {
    let mut counts = SplitCounts::new(["ROOT"], ".$$.");
    counts.count_original_states(&toy_corpus());

    for label in ["ROOT", "S", "NP", "VP", "DT", "NN", "VBZ", ".$$."] {
        assert_eq!(counts.split_count(label), 1, "{label}");
    }
    assert_eq!(counts.split_count("dog"), 0);
    assert_eq!(counts.split_count("never-seen"), 0);
}

#[test]
fn splitting_an_empty_table_is_a_no_op() {
    let mut counts = SplitCounts::new(["ROOT"], ".$$.");
    counts.split_state_counts();
    assert_eq!(counts.total_substates(), 0);
}

proptest! {
    #[test]
    fn split_counts_double_except_unsplittable(
        initial in 1usize..5,
        rounds in 0u32..5,
    ) {
        let mut counts = SplitCounts::new(["ROOT"], ".$$.");
        counts.set_split_count("NP", initial);
        counts.set_split_count("ROOT", 1);
        counts.set_split_count(".$$.", 1);

        for _ in 0..rounds {
            counts.split_state_counts();
        }

        prop_assert_eq!(counts.split_count("NP"), initial * 2usize.pow(rounds));
        prop_assert_eq!(counts.split_count("ROOT"), 1);
        prop_assert_eq!(counts.split_count(".$$."), 1);
    }
}
