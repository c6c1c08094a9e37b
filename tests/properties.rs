//! Property tests for retrieval ordering and prompt assembly.

mod common;

use std::collections::HashMap;

use common::*;
use docsearch::config::PromptConfig;
use docsearch::engine::sqlite::{blend, normalize_scores};
use docsearch::models::{Document, RankedHit};
use docsearch::prompt::PromptAssembler;
use proptest::prelude::*;

const WORDS: [&str; 12] = [
    "alpha", "beta", "gamma", "delta", "reset", "password", "invoice", "office", "hours",
    "support", "billing", "policy",
];

fn arb_text(max_words: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::sample::select(WORDS.to_vec()), 1..max_words)
        .prop_map(|words| words.join(" "))
}

fn arb_document() -> impl Strategy<Value = Document> {
    ("[A-Z][a-z]{2,8}", arb_text(5), arb_text(12)).prop_map(|(name, summary, content)| Document {
        name: Some(name),
        summary: Some(summary),
        content,
        ..Default::default()
    })
}

fn arb_hit() -> impl Strategy<Value = RankedHit> {
    (arb_document(), 0.0f64..1.0).prop_map(|(document, score)| RankedHit {
        id: "id".to_string(),
        document,
        lexical_score: None,
        vector_score: None,
        blended_score: score,
    })
}

/// *For any* indexed corpus, query and `top_k`, retrieval returns at most
/// `top_k` hits ordered by non-increasing blended score.
mod prop_retrieval_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn hits_bounded_and_non_increasing(
            docs in proptest::collection::vec(arb_document(), 1..12),
            query in arb_text(4),
            top_k in 1u32..15,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let hits = rt.block_on(async {
                let h = harness().await;
                h.engine.create_index(DIMS).await.unwrap();
                for d in docs {
                    h.services.ingestor.insert_document(d).await.unwrap();
                }
                h.services.pipeline.retrieve(&query, top_k).await.unwrap()
            });

            prop_assert!(hits.len() <= top_k as usize);
            for pair in hits.windows(2) {
                prop_assert!(pair[0].blended_score >= pair[1].blended_score);
            }
        }
    }
}

/// *For any* normalized sub-scores, fusion yields scores within
/// `[0, LW + VW]` sorted descending.
mod prop_blend {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn blended_scores_bounded_and_sorted(
            lexical_raw in proptest::collection::vec(("[a-f]{1,3}", -50.0f64..50.0), 0..10),
            vector_raw in proptest::collection::vec(("[a-f]{1,3}", 0.0f64..1.0), 0..10),
            lw in 0.0f64..1.0,
            vw in 0.0f64..1.0,
        ) {
            let lexical_raw: Vec<(String, f64)> = lexical_raw;
            let lexical = normalize_scores(&lexical_raw);
            for score in lexical.values() {
                prop_assert!((0.0..=1.0).contains(score));
            }
            let vector: HashMap<&str, f64> =
                vector_raw.iter().map(|(id, s)| (id.as_str(), *s)).collect();

            let fused = blend(&lexical, &vector, lw, vw);
            for c in &fused {
                prop_assert!(c.blended >= 0.0);
                prop_assert!(c.blended <= lw + vw + 1e-9);
            }
            for pair in fused.windows(2) {
                prop_assert!(pair[0].blended >= pair[1].blended);
            }
        }
    }
}

/// *For any* question and document list, assembly is deterministic and
/// keeps document order.
mod prop_prompt {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn assembly_is_deterministic_and_ordered(
            question in "[a-zA-Z ?]{1,40}",
            hits in proptest::collection::vec(arb_hit(), 0..5),
            limit in proptest::option::of(1usize..20),
        ) {
            let assembler = PromptAssembler::new(&PromptConfig {
                max_document_chars: limit,
                ..Default::default()
            });
            let a = assembler.assemble(&question, &hits);
            let b = assembler.assemble(&question, &hits);
            prop_assert_eq!(&a, &b);

            let expected_end = format!("Question: {}\nResponse:", question);
            prop_assert!(a.ends_with(&expected_end));
            prop_assert_eq!(a.matches("\nDOCUMENT:\n").count(), hits.len());

            let mut cursor = 0;
            for hit in &hits {
                let marker = format!("NAME: {}\n", hit.document.name.as_deref().unwrap_or(""));
                let found = a[cursor..].find(&marker);
                prop_assert!(found.is_some());
                cursor += found.unwrap() + marker.len();
            }
        }
    }
}
