//! Property tests for chunk windows and index retrieval ordering

use docqa::{Chunk, TextChunker, Tokenizer, VectorIndex};
use proptest::prelude::*;
use uuid::Uuid;

fn chunk(i: usize) -> Chunk {
    Chunk {
        id: Uuid::new_v4(),
        document_id: format!("doc-{}.txt", i % 3),
        ingest_id: Uuid::nil(),
        content: format!("chunk {}", i),
        chunk_index: i as u32,
        token_start: i,
        token_end: i + 1,
    }
}

fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
        .prop_filter("non-zero embedding", |v| v.iter().any(|x| x.abs() > 1e-3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Windows start at 0, end at the last token, advance by size - overlap
    /// and share exactly `overlap` tokens with their predecessor.
    #[test]
    fn windows_cover_every_token(
        (size, overlap) in (1usize..24).prop_flat_map(|size| (Just(size), 0..size)),
        tokens in 0usize..300,
    ) {
        let chunker = TextChunker::new(size, overlap, Tokenizer::Words).unwrap();
        let windows = chunker.windows(tokens);

        if tokens == 0 {
            prop_assert!(windows.is_empty());
            return Ok(());
        }
        prop_assert_eq!(windows[0].start, 0);
        prop_assert_eq!(windows[windows.len() - 1].end, tokens);
        for window in &windows {
            prop_assert!(!window.is_empty());
            prop_assert!(window.len() <= size);
        }
        for pair in windows.windows(2) {
            prop_assert_eq!(pair[0].len(), size);
            prop_assert_eq!(pair[1].start, pair[0].start + size - overlap);
            prop_assert_eq!(pair[0].end - pair[1].start, overlap);
        }
    }

    /// Chunk text is an exact slice of the input and chunks follow the windows
    #[test]
    fn chunks_are_slices_of_the_text(
        words in proptest::collection::vec("[a-z]{1,8}", 1..80),
        (size, overlap) in (1usize..12).prop_flat_map(|size| (Just(size), 0..size)),
    ) {
        let text = words.join(" ");
        let chunker = TextChunker::new(size, overlap, Tokenizer::Words).unwrap();
        let chunks = chunker.chunk("doc.txt", &text);

        prop_assert_eq!(chunks.len(), chunker.windows(words.len()).len());
        prop_assert!(text.starts_with(chunks[0].content.as_str()));
        prop_assert!(text.ends_with(chunks[chunks.len() - 1].content.as_str()));
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(text.contains(chunk.content.as_str()));
            prop_assert_eq!(chunk.chunk_index as usize, i);
            prop_assert!(chunk.token_end - chunk.token_start <= size);
        }
    }

    /// Retrieval returns min(k, n) results in non-increasing score order
    #[test]
    fn retrieve_is_sorted_and_bounded(
        embeddings in proptest::collection::vec(arb_embedding(8), 1..40),
        query in arb_embedding(8),
        k in 1usize..50,
    ) {
        let mut index = VectorIndex::new();
        for (i, embedding) in embeddings.iter().enumerate() {
            index.push(chunk(i), embedding.clone()).unwrap();
        }

        let hits = index.retrieve(&query, k).unwrap();
        prop_assert_eq!(hits.len(), k.min(embeddings.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for hit in &hits {
            prop_assert!(hit.score >= -1.0 - 1e-4 && hit.score <= 1.0 + 1e-4);
        }
    }
}
