//! In-process subscription router.
//!
//! Subscribers register against an exact id or a regex over the id (never
//! the scope). Each is either raw, receiving the undecoded [`WireValue`], or
//! typed, receiving the value decoded into a type chosen at registration.
//!
//! Typed subscribers are stored as trampolines: a closure built at
//! registration that knows its target type, decodes, and then calls the
//! user's handler. Dispatch never inspects types at runtime.
//!
//! # Dispatch order
//!
//! For each published change:
//! 1. exact-id raw handlers, in registration order
//! 2. exact-id typed handlers, in registration order
//! 3. pattern raw handlers whose regex matches, in registration order
//! 4. pattern typed handlers whose regex matches, in registration order
//!
//! A decode failure or a panic skips only the handler it belongs to.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use tracing::{error, trace, warn};

use crate::errors::DecodeError;
use crate::protocol::Change;
use crate::value::WireValue;

type RawHandler = Box<dyn Fn(&Change<'_>) + Send + Sync>;
type TypedHandler = Box<dyn Fn(&Change<'_>) -> Result<(), DecodeError> + Send + Sync>;
type RawPatternHandler = Box<dyn Fn(&Change<'_>, &Captures<'_>) + Send + Sync>;
type TypedPatternHandler =
    Box<dyn Fn(&Change<'_>, &Captures<'_>) -> Result<(), DecodeError> + Send + Sync>;

struct PatternSubscriber<H> {
    regex: Regex,
    handler: H,
}

/// Outcome of one [`SubscriptionRouter::publish`].
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Handlers whose callback actually ran.
    pub delivered: usize,
    /// Typed handlers skipped because the value did not decode.
    pub decode_errors: Vec<DecodeError>,
    /// Handlers that panicked.
    pub panicked: usize,
}

impl DispatchReport {
    fn run<F>(&mut self, change: &Change<'_>, handler: F)
    where
        F: FnOnce() -> Result<(), DecodeError>,
    {
        match catch_unwind(AssertUnwindSafe(handler)) {
            Ok(outcome) => self.record(outcome),
            Err(payload) => {
                error!(
                    scope = change.scope,
                    id = change.id,
                    panic = panic_message(&*payload),
                    "subscriber panicked"
                );
                self.panicked += 1;
            }
        }
    }

    fn record(&mut self, outcome: Result<(), DecodeError>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                warn!(
                    scope = %e.scope,
                    id = %e.id,
                    type_name = e.target,
                    error = %e.source,
                    "subscriber decode failed"
                );
                self.decode_errors.push(e);
            }
        }
    }
}

/// Registry of exact-id and pattern subscribers.
///
/// Built during setup with `&mut self` registration methods, then shared
/// read-only (typically behind an `Arc`) for publishing.
#[derive(Default)]
pub struct SubscriptionRouter {
    raw_by_id: HashMap<String, Vec<RawHandler>>,
    typed_by_id: HashMap<String, Vec<TypedHandler>>,
    raw_patterns: Vec<PatternSubscriber<RawPatternHandler>>,
    typed_patterns: Vec<PatternSubscriber<TypedPatternHandler>>,
}

impl SubscriptionRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes whose id equals `id`, receiving the raw value.
    pub fn on_id<F>(&mut self, id: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Change<'_>) + Send + Sync + 'static,
    {
        self.raw_by_id
            .entry(id.into())
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Subscribe to changes whose id equals `id`, receiving the value decoded
    /// as `T`.
    pub fn on_id_as<T, F>(&mut self, id: impl Into<String>, handler: F) -> &mut Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&Change<'_>, T) + Send + Sync + 'static,
    {
        self.typed_by_id
            .entry(id.into())
            .or_default()
            .push(Box::new(move |change: &Change<'_>| -> Result<(), DecodeError> {
                let value = decode_for::<T>(change)?;
                handler(change, value);
                Ok(())
            }));
        self
    }

    /// Subscribe to changes whose id matches `regex`, receiving the raw value
    /// and the regex captures.
    pub fn on_pattern<F>(&mut self, regex: Regex, handler: F) -> &mut Self
    where
        F: Fn(&Change<'_>, &Captures<'_>) + Send + Sync + 'static,
    {
        self.raw_patterns.push(PatternSubscriber {
            regex,
            handler: Box::new(handler),
        });
        self
    }

    /// Subscribe to changes whose id matches `regex`, receiving the captures
    /// and the value decoded as `T`.
    pub fn on_pattern_as<T, F>(&mut self, regex: Regex, handler: F) -> &mut Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&Change<'_>, &Captures<'_>, T) + Send + Sync + 'static,
    {
        self.typed_patterns.push(PatternSubscriber {
            regex,
            handler: Box::new(
                move |change: &Change<'_>, captures: &Captures<'_>| -> Result<(), DecodeError> {
                    let value = decode_for::<T>(change)?;
                    handler(change, captures, value);
                    Ok(())
                },
            ),
        });
        self
    }

    /// Dispatch one change to every matching subscriber.
    pub fn publish(&self, scope: &str, id: &str, value: &WireValue) -> DispatchReport {
        let change = Change { scope, id, value };
        let mut report = DispatchReport::default();

        if let Some(handlers) = self.raw_by_id.get(id) {
            for handler in handlers {
                report.run(&change, || {
                    handler(&change);
                    Ok(())
                });
            }
        }
        if let Some(handlers) = self.typed_by_id.get(id) {
            for handler in handlers {
                report.run(&change, || handler(&change));
            }
        }
        for sub in &self.raw_patterns {
            if let Some(captures) = sub.regex.captures(id) {
                report.run(&change, || {
                    (sub.handler)(&change, &captures);
                    Ok(())
                });
            }
        }
        for sub in &self.typed_patterns {
            if let Some(captures) = sub.regex.captures(id) {
                report.run(&change, || (sub.handler)(&change, &captures));
            }
        }

        trace!(scope, id, delivered = report.delivered, "published change");
        report
    }

    /// Total number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.raw_by_id.values().map(Vec::len).sum::<usize>()
            + self.typed_by_id.values().map(Vec::len).sum::<usize>()
            + self.raw_patterns.len()
            + self.typed_patterns.len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

impl fmt::Debug for SubscriptionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRouter")
            .field("patterns", &(self.raw_patterns.len() + self.typed_patterns.len()))
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn decode_for<T: DeserializeOwned>(change: &Change<'_>) -> Result<T, DecodeError> {
    change.value.decode().map_err(|source| DecodeError {
        scope: change.scope.to_owned(),
        id: change.id.to_owned(),
        target: std::any::type_name::<T>(),
        source,
    })
}
