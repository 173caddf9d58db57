mod common;

use latent_pcfg::em::{betas_converged, rescale_temporary_betas};
use latent_pcfg::util::{log_sum_exp, LOG_ZERO};
use latent_pcfg::{BinaryBeta, BinaryBetas, InductionSession, UnaryBeta, UnaryBetas};
use proptest::prelude::*;

use common::{quick_config, toy_corpus};

fn assert_rows_normalized(unary: &UnaryBetas, binary: &BinaryBetas) {
    for (parent, child, beta) in unary.iter() {
        for i in 0..beta.shape().0 {
            let mass = log_sum_exp(beta.row(i)).exp();
            assert!((mass - 1.0).abs() < 1e-4, "{parent} -> {child} row {i}: {mass}");
        }
    }
    for (parent, left, right, beta) in binary.iter() {
        for i in 0..beta.shape().0 {
            let mass = log_sum_exp(beta.plane(i)).exp();
            assert!(
                (mass - 1.0).abs() < 1e-4,
                "{parent} -> {left} {right} plane {i}: {mass}"
            );
        }
    }
}

fn log_entry() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => -20.0f64..5.0,
        1 => Just(LOG_ZERO),
    ]
}

proptest! {
    #[test]
    fn rescale_yields_distributions(
        parents in 1usize..4,
        children in 1usize..4,
        seed in proptest::collection::vec(log_entry(), 64),
    ) {
        let mut beta = UnaryBeta::filled(parents, children, LOG_ZERO);
        let mut binary_beta = BinaryBeta::filled(parents, children, 2, LOG_ZERO);
        for i in 0..parents {
            for j in 0..children {
                beta.set(i, j, seed[i * 4 + j]);
                for k in 0..2 {
                    binary_beta.set(i, j, k, seed[32 + i * 8 + j * 2 + k]);
                }
            }
        }
        let mut unary = UnaryBetas::new();
        unary.insert("X", "Y", beta);
        let mut binary = BinaryBetas::new();
        binary.insert("X", "Y", "Z", binary_beta);

        rescale_temporary_betas(&mut unary, &mut binary);
        for (_, _, beta) in unary.iter() {
            for i in 0..parents {
                prop_assert!((log_sum_exp(beta.row(i)).exp() - 1.0).abs() < 1e-4);
            }
        }
        for (_, _, _, beta) in binary.iter() {
            for i in 0..parents {
                prop_assert!((log_sum_exp(beta.plane(i)).exp() - 1.0).abs() < 1e-4);
            }
        }
    }
}

#[test]
fn convergence_on_identical_betas() {
    let mut unary = UnaryBetas::new();
    unary.insert("NP", "NN", UnaryBeta::filled(2, 2, 0.5_f64.ln()));
    let mut binary = BinaryBetas::new();
    binary.insert("S", "NP", "VP", BinaryBeta::filled(1, 2, 2, 0.25_f64.ln()));

    let converged = betas_converged(&unary, &binary, &unary.clone(), &binary.clone(), 1e-4)
        .expect("shapes agree");
    assert!(converged);
}

#[test]
fn no_convergence_when_an_entry_moves() {
    let mut unary = UnaryBetas::new();
    unary.insert("NP", "NN", UnaryBeta::filled(2, 2, 0.5_f64.ln()));
    let binary = BinaryBetas::new();

    let mut moved = unary.clone();
    moved
        .get_mut("NP", "NN")
        .expect("entry exists")
        .set(1, 0, 0.4_f64.ln());

    let converged =
        betas_converged(&unary, &binary, &moved, &binary, 1e-4).expect("shapes agree");
    assert!(!converged);
}

#[test]
fn committed_betas_are_normalized_after_training() {
    let mut session =
        InductionSession::new(quick_config(), toy_corpus()).expect("session starts");
    session.count_original_states();
    session.initial_betas_and_lexicon().expect("trees are binarized");
    session.split_state_counts();
    session.split_betas().expect("shapes follow the split counts");
    session.recalculate_betas(true).expect("EM runs");

    assert_rows_normalized(session.unary_betas(), session.binary_betas());
    assert!(session.log_likelihood().is_finite());
}

#[test]
fn use_new_betas_without_test_never_reports_convergence() {
    let mut session =
        InductionSession::new(quick_config(), toy_corpus()).expect("session starts");
    session.count_original_states();
    session.initial_betas_and_lexicon().expect("trees are binarized");

    let mut expectations = session
        .recalculate_temporary_betas(false)
        .expect("E-step runs");
    rescale_temporary_betas(&mut expectations.unary, &mut expectations.binary);
    let same = expectations.clone();

    assert!(!session.use_new_betas(false, expectations).expect("commit"));
    assert!(session.use_new_betas(true, same).expect("commit"));
}
