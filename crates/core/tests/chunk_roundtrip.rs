use proptest::prelude::*;

use bulletin_core::{default_tokenizer, split_chunks, split_sentences};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chunks_reassemble_losslessly(text in document(), budget in 8usize..120) {
        let tok = default_tokenizer();
        let chunks = split_chunks(&text, budget, tok).unwrap();
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(rejoined, text);
    }

    #[test]
    fn chunks_respect_budget_unless_single_sentence(text in document(), budget in 8usize..120) {
        let tok = default_tokenizer();
        let chunks = split_chunks(&text, budget, tok).unwrap();
        for chunk in &chunks {
            if chunk.token_count > budget {
                // The documented exception: exactly one sentence that alone
                // exceeds the budget.
                prop_assert_eq!(split_sentences(&chunk.text).len(), 1);
            }
        }
    }

    #[test]
    fn indices_are_dense_and_ordered(text in document(), budget in 8usize..120) {
        let tok = default_tokenizer();
        let chunks = split_chunks(&text, budget, tok).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i + 1);
            prop_assert_eq!(chunk.total, chunks.len());
        }
    }
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(sentence(), 1..40).prop_map(|sentences| sentences.concat())
}

fn sentence() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-zA-Z]{1,12}", 1..25),
        prop_oneof![Just('.'), Just('!'), Just('?')],
        prop_oneof![Just(" "), Just("  "), Just("\n"), Just("")],
    )
        .prop_map(|(words, terminal, gap)| format!("{}{}{}", words.join(" "), terminal, gap))
}
