//! Property tests for sliding-window chunking.

mod common;

use common::word_chunker;
use docqa_rag::chunking::{Chunker, TokenWindowChunker};
use docqa_rag::document::ExtractedDocument;
use proptest::prelude::*;

/// Pages of lowercase words, each word unique so overlaps can be compared by value.
fn arb_document() -> impl Strategy<Value = ExtractedDocument> {
    proptest::collection::vec(0usize..60, 0..6).prop_map(|page_lengths| {
        let mut next = 0;
        let pages: Vec<(u32, String)> = page_lengths
            .into_iter()
            .enumerate()
            .map(|(i, len)| {
                let words: Vec<String> = (next..next + len).map(|n| format!("w{n}")).collect();
                next += len;
                (i as u32 + 1, words.join(" "))
            })
            .collect();
        ExtractedDocument::from_pages("doc.pdf", pages)
    })
}

fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

fn total_words(document: &ExtractedDocument) -> usize {
    document.pages.iter().map(|p| p.text.split_whitespace().count()).sum()
}

/// **Chunk size and overlap**
/// *For any* document and window, every chunk SHALL hold at most `chunk_size`
/// tokens, consecutive chunks SHALL share exactly `chunk_overlap` tokens, and
/// together the chunks SHALL cover every token.
mod prop_chunk_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn windows_are_bounded_overlapping_and_complete(
            document in arb_document(),
            (size, overlap) in arb_window(),
        ) {
            let chunks = word_chunker(size, overlap).chunk(&document);
            let tokens = total_words(&document);

            if tokens == 0 {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }
            prop_assert!(!chunks.is_empty());
            if tokens <= size {
                prop_assert_eq!(chunks.len(), 1);
            }

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.chunk_index as usize, i);
                prop_assert!(chunk.token_count as usize <= size);
                prop_assert_eq!(chunk.token_count as usize, chunk.text.split(' ').count());
            }

            for pair in chunks.windows(2) {
                let prev: Vec<&str> = pair[0].text.split(' ').collect();
                let next: Vec<&str> = pair[1].text.split(' ').collect();
                prop_assert_eq!(prev.len(), size);
                prop_assert_eq!(&prev[size - overlap..], &next[..overlap]);
            }

            let last = chunks.last().unwrap().text.split(' ').last().map(str::to_string);
            prop_assert_eq!(last, Some(format!("w{}", tokens - 1)));
        }

        #[test]
        fn chunking_is_deterministic(document in arb_document(), (size, overlap) in arb_window()) {
            let chunker = word_chunker(size, overlap);
            prop_assert_eq!(chunker.chunk(&document), chunker.chunk(&document));
        }
    }
}

/// **Page attribution**
/// *For any* document, a chunk's page SHALL be the page holding its first token.
mod prop_page_attribution {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunk_page_is_page_of_first_token(
            document in arb_document(),
            (size, overlap) in arb_window(),
        ) {
            for chunk in word_chunker(size, overlap).chunk(&document) {
                let first = chunk.text.split(' ').next().unwrap();
                let page = document
                    .pages
                    .iter()
                    .find(|p| p.text.split_whitespace().any(|w| w == first))
                    .map(|p| p.page_number);
                prop_assert_eq!(page, Some(chunk.page_number));
            }
        }
    }
}

/// **Model token windows**
/// *For any* document, `cl100k_base` windows SHALL hold at most `chunk_size`
/// tokens, and every window but the last SHALL be full.
mod prop_model_token_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn windows_are_bounded_and_full_until_the_last(
            document in arb_document(),
            (size, overlap) in arb_window(),
        ) {
            let chunker = TokenWindowChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&document);
            prop_assert_eq!(chunks.is_empty(), chunker.count_tokens(&document) == 0);
            for chunk in &chunks {
                prop_assert!(chunk.token_count as usize <= size);
            }
            if let Some((_, init)) = chunks.split_last() {
                prop_assert!(init.iter().all(|c| c.token_count as usize == size));
            }
        }
    }
}

#[test]
fn default_window_is_800_with_200_overlap() {
    let chunker = TokenWindowChunker::from_config(&docqa_rag::RagConfig::default()).unwrap();
    assert_eq!(chunker.chunk_size(), 800);
    assert_eq!(chunker.chunk_overlap(), 200);

    let words: Vec<String> = (0..1500).map(|n| format!("w{n}")).collect();
    let document = ExtractedDocument::from_pages("long.pdf", [(1, words.join(" "))]);
    let total = chunker.count_tokens(&document);
    assert!(total > 1500, "BPE splits these words, got {total} tokens");

    // windows start every 600 tokens until one reaches the end
    let expected = 1 + (total - 800).div_ceil(600);
    let chunks = chunker.chunk(&document);
    assert_eq!(chunks.len(), expected);
    assert!(chunks[..expected - 1].iter().all(|c| c.token_count == 800));
    assert_eq!(chunks[expected - 1].token_count as usize, total - 600 * (expected - 1));
    assert!(chunks[0].text.starts_with("w0 w1 w2"));
    assert!(chunks[expected - 1].text.ends_with("w1499"));
}
