mod common;

use latent_pcfg::beta::split_betas;
use latent_pcfg::split_merge::build_merge_correspondence;
use latent_pcfg::util::{log_sum_exp, LOG_ONE};
use latent_pcfg::{
    BinaryBetas, InductionError, InductionSession, MergeCandidate, SplitCounts, UnaryBeta,
    UnaryBetas,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{quick_config, toy_corpus};

fn candidate(label: &str, index: usize) -> MergeCandidate {
    MergeCandidate {
        label: label.to_string(),
        index,
        loss: 0.0,
    }
}

#[test]
fn split_unary_beta_doubles_both_dimensions() {
    let mut counts = SplitCounts::new(["ROOT"], ".$$.");
    counts.set_split_count("X", 1);
    counts.set_split_count("Y", 1);
    let mut unary = UnaryBetas::new();
    unary.insert("X", "Y", UnaryBeta::filled(1, 1, LOG_ONE));
    let mut binary = BinaryBetas::new();

    counts.split_state_counts();
    let mut rng = StdRng::seed_from_u64(3);
    split_betas(&mut unary, &mut binary, &counts, 0.01, &mut rng).expect("shapes follow counts");

    let beta = unary.get("X", "Y").expect("entry kept");
    assert_eq!(beta.shape(), (2, 2));
    for i in 0..2 {
        assert!((log_sum_exp(beta.row(i)).exp() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn start_symbol_parent_stays_singleton() {
    let mut counts = SplitCounts::new(["ROOT"], ".$$.");
    counts.set_split_count("ROOT", 1);
    counts.set_split_count("S", 1);
    let mut unary = UnaryBetas::new();
    unary.insert("ROOT", "S", UnaryBeta::filled(1, 1, LOG_ONE));
    let mut binary = BinaryBetas::new();

    counts.split_state_counts();
    let mut rng = StdRng::seed_from_u64(3);
    split_betas(&mut unary, &mut binary, &counts, 0.01, &mut rng).expect("shapes follow counts");

    assert_eq!(unary.get("ROOT", "S").expect("entry kept").shape(), (1, 2));
}

#[test]
fn split_without_doubled_counts_is_a_shape_mismatch() {
    let mut counts = SplitCounts::new(["ROOT"], ".$$.");
    counts.set_split_count("X", 3);
    counts.set_split_count("Y", 1);
    let mut unary = UnaryBetas::new();
    unary.insert("X", "Y", UnaryBeta::filled(1, 1, LOG_ONE));
    let mut binary = BinaryBetas::new();
    let mut rng = StdRng::seed_from_u64(3);

    let err = split_betas(&mut unary, &mut binary, &counts, 0.01, &mut rng).unwrap_err();
    assert!(matches!(err, InductionError::ShapeMismatch { .. }));
    assert!(err.to_string().contains("X -> Y"));
}

#[test]
fn merge_correspondence_folds_adjacent_candidates() {
    let mut counts = SplitCounts::new(["ROOT"], ".$$.");
    counts.set_split_count("NP", 4);

    let correspondence =
        build_merge_correspondence(&counts, &[candidate("NP", 1), candidate("NP", 2)]);
    assert_eq!(correspondence.get("NP"), Some(&[0, 0, 1, 2][..]));
}

#[test]
fn merge_with_zero_rate_is_a_no_op() {
    let mut session =
        InductionSession::new(quick_config(), toy_corpus()).expect("session starts");
    session.count_original_states();
    session.initial_betas_and_lexicon().expect("trees are binarized");
    session.split_state_counts();
    session.split_betas().expect("shapes follow counts");
    session.recalculate_betas(true).expect("EM runs");

    let before = session.split_counts().total_substates();
    let merged = session.merge_states().expect("merge runs");
    assert!(merged.is_empty());
    assert_eq!(session.split_counts().total_substates(), before);
}

#[test]
fn merge_shrinks_counts_and_keeps_shapes_consistent() {
    let config = quick_config().with_split_recombine_rate(0.5);
    let mut session = InductionSession::new(config, toy_corpus()).expect("session starts");
    session.count_original_states();
    session.initial_betas_and_lexicon().expect("trees are binarized");
    session.split_state_counts();
    session.split_betas().expect("shapes follow counts");
    session.recalculate_betas(true).expect("EM runs");

    let before = session.split_counts().total_substates();
    let merged = session.merge_states().expect("merge runs");
    assert!(!merged.is_empty());
    assert!(merged.windows(2).all(|pair| pair[0].loss <= pair[1].loss));
    assert!(merged.iter().all(|c| c.index % 2 == 1));
    assert_eq!(
        session.split_counts().total_substates(),
        before - merged.len()
    );
    assert_eq!(session.split_counts().split_count(".$$."), 1);
    assert!(merged.iter().all(|c| c.label != ".$$." && c.label != "ROOT"));

    for (parent, child, beta) in session.unary_betas().iter() {
        let counts = session.split_counts();
        assert_eq!(
            beta.shape(),
            (counts.split_count(parent), counts.split_count(child)),
            "{parent} -> {child}"
        );
    }
    for (parent, left, right, beta) in session.binary_betas().iter() {
        let counts = session.split_counts();
        assert_eq!(
            beta.shape(),
            (
                counts.split_count(parent),
                counts.split_count(left),
                counts.split_count(right)
            ),
            "{parent} -> {left} {right}"
        );
    }

    // the merged model keeps training
    session.recalculate_betas(false).expect("EM runs after merge");
    assert!(session.log_likelihood().is_finite());
}

fn freshly_split_session(noise: f64) -> InductionSession {
    let config = quick_config().with_split_noise(noise).with_split_smoothing(0.05);
    let mut session = InductionSession::new(config, toy_corpus()).expect("session starts");
    session.count_original_states();
    session.initial_betas_and_lexicon().expect("trees are binarized");
    session.split_state_counts();
    session.split_betas().expect("shapes follow counts");
    session
}

#[test]
fn first_step_after_split_trains_both_tag_siblings() {
    let session = freshly_split_session(0.01);
    assert_eq!(session.lexicon().tag_count("NN^1"), 0.0);

    let expectations = session
        .recalculate_temporary_betas(true)
        .expect("E-step runs");
    for tag in ["NN^0", "NN^1", "DT^0", "DT^1"] {
        assert!(expectations.lexicon.tag_count(tag) > 0.0, "{tag}");
    }
    assert!(expectations.log_likelihood.is_finite());
}

#[test]
fn identical_siblings_score_zero_merge_loss() {
    let mut session = freshly_split_session(0.0);
    session.recalculate_betas(true).expect("EM runs");

    let candidates = session.score_merge_candidates().expect("scoring runs");
    assert!(!candidates.is_empty());
    for candidate in &candidates {
        assert!(candidate.loss.abs() < 1e-9, "{candidate:?}");
    }
}

#[test]
fn mismatched_correspondence_is_rejected() {
    let mut session =
        InductionSession::new(quick_config(), toy_corpus()).expect("session starts");
    session.count_original_states();
    session.initial_betas_and_lexicon().expect("trees are binarized");
    session.split_state_counts();
    session.split_betas().expect("shapes follow counts");

    let mut stale = SplitCounts::new(["ROOT"], ".$$.");
    stale.set_split_count("NP", 4);
    let correspondence = build_merge_correspondence(&stale, &[candidate("NP", 1)]);

    let err = session
        .recalculate_merged_betas(&correspondence)
        .unwrap_err();
    assert!(matches!(err, InductionError::ShapeMismatch { .. }));
}
