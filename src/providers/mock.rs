/*!
 * Mock backend implementations for testing.
 *
 * This module provides a backend that simulates different behaviors:
 * - `MockBackend::working()` - Always succeeds with tagged text
 * - `MockBackend::failing_on("...")` - Fails for texts containing a marker
 * - `MockBackend::failing()` - Always fails with an error
 * - `MockBackend::slow(ms)` - Succeeds after a delay
 * - `MockBackend::jittered()` - Succeeds after a delay that shrinks as text grows
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{ModelSpec, TranslationBackend};

/// A call the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Model the call was routed to
    pub model: ModelSpec,
    /// Text sent
    pub text: String,
    /// Source language
    pub source_language: String,
    /// Target language
    pub target_language: String,
}

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `[target] text`
    Working,
    /// Fails when the text contains the marker
    FailOn(String),
    /// Always fails with an error
    Failing,
    /// Succeeds after a delay (for timeout and ordering tests)
    Slow { delay_ms: u64 },
    /// Delay derived from the text length, so completion order differs from submission order
    Jittered,
}

/// Mock backend for testing dispatch and routing behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    calls: Arc<Mutex<Vec<MockCall>>>,
    completed: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn failing_on(marker: &str) -> Self {
        Self::new(MockBehavior::FailOn(marker.to_string()))
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    pub fn jittered() -> Self {
        Self::new(MockBehavior::Jittered)
    }

    /// Translation the working mock produces for a text
    pub fn expected_translation(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    /// All calls received so far, in arrival order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Texts of successful calls, in the order they finished
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter when a call ends, however it ends
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(
        &self,
        model: &ModelSpec,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().push(MockCall {
            model: model.clone(),
            text: text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(self.in_flight.clone());

        match &self.behavior {
            MockBehavior::Working => {}
            MockBehavior::FailOn(marker) if text.contains(marker.as_str()) => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: format!("Simulated failure on '{}'", marker),
                });
            }
            MockBehavior::FailOn(_) => {}
            MockBehavior::Failing => {
                return Err(ProviderError::RequestFailed("Simulated backend failure".to_string()));
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }
            MockBehavior::Jittered => {
                // Longer texts finish first
                let delay = 40u64.saturating_sub(text.len() as u64 % 40);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        self.completed.lock().push(text.to_string());
        Ok(Self::expected_translation(text, target_language))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }
}
