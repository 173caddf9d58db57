#![allow(dead_code)]

use latent_pcfg::{parse_tree, parse_treebank, Corpus, InductionConfig, Tree};

/// Small binarized treebank with shared preterminals and a boundary tag
pub const TOY_TREEBANK: &str = "
(ROOT (S (NP (DT the) (NN dog)) (VP (VBZ barks) (.$$. .))))
(ROOT (S (NP (DT a) (NN cat)) (VP (VBZ sleeps) (.$$. .))))
(ROOT (S (NP (NNP Rex)) (VP (VBZ barks) (.$$. .))))
(ROOT (S (NP (DT the) (NN cat)) (VP (VBD saw) (NP (DT a) (NN dog)))))
(ROOT (S (NP (PRP it)) (VP (VBD slept) (.$$. .))))
";

pub fn tree(text: &str) -> Tree {
    parse_tree(text).expect("fixture tree parses")
}

pub fn toy_trees() -> Vec<Tree> {
    parse_treebank(TOY_TREEBANK).expect("fixture treebank parses")
}

pub fn toy_corpus() -> Corpus {
    Corpus::from_trees(toy_trees(), 1.0).expect("fixture weights are valid")
}

pub fn corpus_of(texts: &[&str]) -> Corpus {
    Corpus::from_trees(texts.iter().map(|text| tree(text)), 1.0)
        .expect("fixture weights are valid")
}

/// Short runs for tests: few EM iterations, fixed seed
pub fn quick_config() -> InductionConfig {
    InductionConfig::default()
        .with_split_count(1)
        .with_max_em_iterations(5)
        .with_seed(17)
}
