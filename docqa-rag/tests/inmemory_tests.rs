//! Property tests for in-memory vector index search ordering.

use docqa_rag::document::DocumentChunk;
use docqa_rag::inmemory::InMemoryVectorIndex;
use docqa_rag::vectorstore::VectorIndex;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk paired with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = (DocumentChunk, Vec<f32>)> {
    ("[a-z]{3,8}\\.pdf", "[a-z ]{5,30}", 1u32..50, arb_normalized_embedding(dim)).prop_map(
        |(filename, text, page_number, embedding)| {
            let chunk = DocumentChunk {
                token_count: text.split_whitespace().count() as u32,
                text,
                filename,
                page_number,
                section: None,
                chunk_index: 0,
            };
            (chunk, embedding)
        },
    )
}

fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

/// **In-memory index search ordering**
/// *For any* set of stored chunks, searching SHALL return at most `k` results
/// ordered by descending similarity, every score within `[0, 1]`.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let (chunks, vectors): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
            let results = block_on(async {
                let index = InMemoryVectorIndex::new();
                index.add(&chunks, &vectors).await.unwrap();
                index.search(&query, k).await.unwrap()
            });

            prop_assert!(results.len() <= k);
            prop_assert_eq!(results.len(), k.min(chunks.len()));

            for result in &results {
                prop_assert!((0.0..=1.0).contains(&result.similarity_score));
            }
            for window in results.windows(2) {
                prop_assert!(
                    window[0].similarity_score >= window[1].similarity_score,
                    "results not in descending order: {} < {}",
                    window[0].similarity_score,
                    window[1].similarity_score,
                );
            }
        }
    }
}

/// **Search idempotence**
/// *For any* unchanged index, repeating a search SHALL return identical results
/// in identical order.
mod prop_search_idempotence {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn repeated_searches_are_identical(
            entries in proptest::collection::vec(arb_entry(DIM), 1..30),
            query in arb_normalized_embedding(DIM),
        ) {
            let (chunks, vectors): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
            let (first, second) = block_on(async {
                let index = InMemoryVectorIndex::new();
                index.add(&chunks, &vectors).await.unwrap();
                let first = index.search(&query, 10).await.unwrap();
                let second = index.search(&query, 10).await.unwrap();
                (first, second)
            });
            prop_assert_eq!(first, second);
        }
    }
}

/// **Tie stability**
/// *For any* number of chunks stored with the same vector, search SHALL return
/// them in insertion order, across separate `add` calls.
mod prop_tie_stability {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn equal_scores_keep_insertion_order(
            entries in proptest::collection::vec(arb_entry(4), 2..15),
            split in 0usize..15,
        ) {
            let vector = vec![0.5, 0.5, 0.5, 0.5];
            let chunks: Vec<DocumentChunk> = entries
                .into_iter()
                .enumerate()
                .map(|(i, (mut chunk, _))| {
                    chunk.chunk_index = i as u32;
                    chunk
                })
                .collect();
            let split = split.min(chunks.len());

            let results = block_on(async {
                let index = InMemoryVectorIndex::new();
                let (head, tail) = chunks.split_at(split);
                index.add(head, &vec![vector.clone(); head.len()]).await.unwrap();
                index.add(tail, &vec![vector.clone(); tail.len()]).await.unwrap();
                index.search(&vector, chunks.len()).await.unwrap()
            });

            let order: Vec<u32> = results.iter().map(|r| r.chunk.chunk_index).collect();
            let expected: Vec<u32> = (0..chunks.len() as u32).collect();
            prop_assert_eq!(order, expected);
        }
    }
}
