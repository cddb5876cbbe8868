/*!
 * Chunk-then-reassemble properties over a handful of document shapes
 */

use std::sync::Arc;
use std::time::Duration;

use book_translator::providers::mock::MockBackend;
use book_translator::translation::{
    Chunk, ChunkContent, Chunker, Dispatcher, Document, ModelCatalog, ModelRouter, TranslationResult, reassemble,
};

const DOCUMENTS: [&str; 5] = [
    "Hello world.\n\nGoodbye.\n",
    "one two three four five six seven eight nine ten eleven",
    "\n\n   \nlast line after blanks\n",
    "A short line.\nA much longer line that certainly needs more than one chunk to fit.\n\n\nEnd.",
    "",
];

fn fake_translate(chunks: Vec<Chunk>) -> Vec<TranslationResult> {
    chunks
        .into_iter()
        .map(|chunk| TranslationResult {
            line_index: chunk.line_index,
            position: chunk.position,
            text: match chunk.content {
                ChunkContent::Text(text) => text.to_uppercase(),
                ChunkContent::Blank(original) => original,
            },
        })
        .collect()
}

#[test]
fn test_chunk_withEveryDocument_shouldRespectTokenLimit() {
    let chunker = Chunker::with_whitespace_tokenizer(3);
    for text in DOCUMENTS {
        for chunk in chunker.chunk(&Document::from_text(text)) {
            if let ChunkContent::Text(content) = &chunk.content {
                assert!(chunker.count_tokens(content) <= 3, "oversized chunk {:?}", content);
            }
        }
    }
}

#[test]
fn test_reassemble_withAnyArrivalOrder_shouldProduceSameDocument() {
    let chunker = Chunker::with_whitespace_tokenizer(3);
    for text in DOCUMENTS {
        let document = Document::from_text(text);
        let results = fake_translate(chunker.chunk(&document));
        let expected = reassemble(document.line_count(), results.clone(), document.trailing_newline())
            .unwrap()
            .render();

        let mut reversed = results.clone();
        reversed.reverse();
        let mut orders = vec![reversed];
        for shift in 1..results.len() {
            let mut rotated = results.clone();
            rotated.rotate_left(shift);
            orders.push(rotated);
        }

        for order in orders {
            let rendered = reassemble(document.line_count(), order, document.trailing_newline())
                .unwrap()
                .render();
            assert_eq!(rendered, expected);
        }
    }
}

#[test]
fn test_reassemble_withEveryDocument_shouldPreserveLineStructure() {
    let chunker = Chunker::with_whitespace_tokenizer(3);
    for text in DOCUMENTS {
        let document = Document::from_text(text);
        let translated = reassemble(
            document.line_count(),
            fake_translate(chunker.chunk(&document)),
            document.trailing_newline(),
        )
        .unwrap();

        assert_eq!(translated.line_count(), document.line_count());
        assert_eq!(translated.render().ends_with('\n'), text.ends_with('\n'));
        for (source, output) in document.lines().iter().zip(translated.lines()) {
            if source.trim().is_empty() {
                assert_eq!(output, source);
            } else {
                assert_eq!(output, &source.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase());
            }
        }
    }
}

#[tokio::test]
async fn test_dispatch_withChunksFinishingOutOfOrder_shouldRenderInSubmissionOrder() {
    // Later words are longer, so the jittered backend finishes them first
    let words = ["a", "bbbbbbbb", "cccccccccccccccc", "ddddddddddddddddddddddd"];
    let document = Document::from_text(&format!("{}\nlast\n", words.join(" ")));
    let chunks = Chunker::with_whitespace_tokenizer(1).chunk(&document);

    let mut catalog = ModelCatalog::new();
    catalog.insert("en-vi", "models/en-vi");
    let router = ModelRouter::new(
        catalog,
        "m2m100",
        Vec::<String>::new(),
        ["en", "vi"].iter().map(|s| s.to_string()),
    );
    let backend = MockBackend::jittered();
    let dispatcher = Dispatcher::new(Arc::new(router), Arc::new(backend.clone()), 8, Duration::from_secs(5));

    let results = dispatcher
        .dispatch(chunks, document.line_count(), "en", "vi")
        .await
        .unwrap();
    let rendered = reassemble(document.line_count(), results, document.trailing_newline())
        .unwrap()
        .render();

    let completed = backend.completion_order();
    assert_eq!(completed.len(), 5);
    let position = |word: &str| completed.iter().position(|text| text == word).unwrap();
    assert!(position(words[3]) < position(words[0]));
    assert_eq!(
        rendered,
        "[vi] a [vi] bbbbbbbb [vi] cccccccccccccccc [vi] ddddddddddddddddddddddd\n[vi] last\n"
    );
}
