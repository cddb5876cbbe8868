/*!
 * Routing decisions as seen by the backend.
 */

use std::sync::Arc;
use std::time::Duration;

use book_translator::errors::{RoutingError, TranslationError};
use book_translator::providers::ModelSpec;
use book_translator::providers::mock::MockBackend;
use book_translator::translation::{Chunker, Dispatcher, Document, ModelCatalog, ModelRouter, TranslationPlan, reassemble};

use crate::common::{self, MODEL_NAMES};

fn dispatcher(backend: &MockBackend) -> Dispatcher {
    let config = common::test_config();
    Dispatcher::new(
        Arc::new(common::test_router(&config)),
        Arc::new(backend.clone()),
        4,
        Duration::from_secs(5),
    )
}

async fn translate(backend: &MockBackend, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
    let document = Document::from_text(text);
    let chunks = Chunker::with_whitespace_tokenizer(8).chunk(&document);
    let results = dispatcher(backend)
        .dispatch(chunks, document.line_count(), source, target)
        .await?;
    Ok(reassemble(document.line_count(), results, document.trailing_newline())?.render())
}

#[tokio::test]
async fn test_dispatch_withOverridePair_shouldUseMultilingualModelDespiteCatalogEntry() {
    let backend = MockBackend::working();

    let output = translate(&backend, "Good morning.\n", "en", "ko").await.unwrap();

    assert_eq!(output, "[ko] Good morning.\n");
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].model.is_multilingual());
    assert_eq!(calls[0].source_language, "en");
    assert_eq!(calls[0].target_language, "ko");
}

#[tokio::test]
async fn test_dispatch_withPivotPair_shouldTranslateThroughEnglish() {
    let backend = MockBackend::working();

    let output = translate(&backend, "Bonjour tout le monde.\n", "fr", "de").await.unwrap();

    assert_eq!(output, "[de] [en] Bonjour tout le monde.\n");
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].model.to_string(), "bilingual(fr-en)");
    assert_eq!((calls[0].source_language.as_str(), calls[0].target_language.as_str()), ("fr", "en"));
    assert_eq!(calls[1].model.to_string(), "bilingual(en-de)");
    assert_eq!(calls[1].text, "[en] Bonjour tout le monde.");
    assert_eq!((calls[1].source_language.as_str(), calls[1].target_language.as_str()), ("en", "de"));
}

#[tokio::test]
async fn test_dispatch_withMissingPivotStage_shouldFailBeforeCallingBackend() {
    let backend = MockBackend::working();

    let err = translate(&backend, "Guten Tag.\n", "de", "fr").await.unwrap_err();

    assert!(matches!(err, TranslationError::Routing(RoutingError::MissingModel(ref stage)) if stage == "de-en"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_dispatch_withEnglishSourceAndNoModel_shouldFallBackToMultilingual() {
    let backend = MockBackend::working();

    let output = translate(&backend, "Hello.\n", "en", "fr").await.unwrap();

    assert_eq!(output, "[fr] Hello.\n");
    assert!(backend.calls()[0].model.is_multilingual());
}

#[test]
fn test_route_withUnsupportedLanguage_shouldFallBack() {
    let catalog = ModelCatalog::parse(MODEL_NAMES, "models", "ct2fast-").unwrap();
    let router = ModelRouter::new(
        catalog,
        "m2m100",
        Vec::<String>::new(),
        ["en", "fr", "de"].iter().map(|s| s.to_string()),
    );

    let plan = router.route("fr", "vi").unwrap();

    assert_eq!(
        plan,
        TranslationPlan::Fallback(ModelSpec::Multilingual {
            id: "m2m100".to_string()
        })
    );
    assert_eq!(plan.call_count(), 1);
}

#[test]
fn test_validatePivots_withDefaultLanguages_shouldListMissingStages() {
    let config = common::test_config();
    let router = common::test_router(&config);

    let err = router.validate_pivots().unwrap_err();

    let RoutingError::IncompleteCatalog(missing) = err else {
        panic!("expected an incomplete catalog error");
    };
    assert!(missing.contains(&"de-en".to_string()));
    assert!(missing.contains(&"en-fr".to_string()));
    assert!(!missing.contains(&"fr-en".to_string()));
    assert!(!missing.contains(&"en-de".to_string()));
}

#[test]
fn test_fallbackPairs_withDefaultLanguages_shouldReportEnglishSideGaps() {
    let config = common::test_config();
    let router = common::test_router(&config);

    let fallback = router.fallback_pairs();

    assert!(fallback.contains(&"en-fr".to_string()));
    assert!(!fallback.contains(&"en-vi".to_string()));
    assert!(!fallback.contains(&"en-ko".to_string()));
    assert!(!fallback.contains(&"fr-en".to_string()));
}
