//! Suggestion providers.
//!
//! The engine never calls a provider itself. A host asks a
//! [`SuggestionProvider`] (usually a [`SuggestionChain`]) for candidates
//! matching what the user typed, then applies the chosen
//! [`Suggestion::action`] to the [`StateMachine`].
//!
//! Providers may be slow or run on another thread. Every query carries a
//! [`CancellationToken`]; a [`SuggestionSession`] cancels the previous query
//! when a new one starts and discards any result that arrives for a query
//! that is no longer current, so no transition is ever driven by a stale
//! result.
//!
//! ```
//! use filterbar::{
//!     Action, FieldDescriptor, FieldType, Schema, StateMachine, SuggestionChain,
//!     SuggestionContext, SuggestionProvider, SuggestionSession,
//! };
//!
//! let schema = Schema::new(vec![
//!     FieldDescriptor::with_default_operators("status", "Status", FieldType::Enum),
//!     FieldDescriptor::with_default_operators("name", "Name", FieldType::String),
//! ]);
//! let mut machine = StateMachine::new();
//! machine.transition(Action::Focus);
//!
//! let chain = SuggestionChain::builtin();
//! let mut session = SuggestionSession::new();
//! let ticket = session.begin();
//! let ctx = SuggestionContext::from_machine(&machine, &schema, "sta");
//! let result = chain.suggestions(&ctx, ticket.token());
//!
//! let items = session.accept(&ticket, result).unwrap().unwrap();
//! assert_eq!(items[0].label, "Status");
//! ```

use crate::error::SuggestError;
use crate::expression::Filter;
use crate::machine::{Action, StateMachine, StepKind};
use crate::schema::{FieldDescriptor, FieldType, OperatorDescriptor, Schema};
use crate::value::{ConditionValue, Connector};

/// Cancellation handle for one suggestion query.
///
/// Wraps [`tokio_util::sync::CancellationToken`]; clones observe the same
/// cancellation. Providers poll it between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(tokio_util::sync::CancellationToken);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Returns [`SuggestError::Cancelled`] once the token is cancelled.
    pub fn check(&self) -> Result<(), SuggestError> {
        if self.is_cancelled() {
            Err(SuggestError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The underlying token, for hosts that await cancellation.
    pub fn inner(&self) -> &tokio_util::sync::CancellationToken {
        &self.0
    }
}

/// What a provider sees when asked for suggestions.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionContext<'a> {
    /// Text typed so far for the current token.
    pub input: &'a str,
    pub step: StepKind,
    pub current_field: Option<&'a FieldDescriptor>,
    pub current_operator: Option<&'a OperatorDescriptor>,
    pub completed: &'a Filter,
    pub schema: &'a Schema,
}

impl<'a> SuggestionContext<'a> {
    /// Builds a context from the machine's current step and list.
    pub fn from_machine(machine: &'a StateMachine, schema: &'a Schema, input: &'a str) -> Self {
        let ctx = machine.context();
        SuggestionContext {
            input,
            step: machine.state(),
            current_field: ctx.current_field,
            current_operator: ctx.current_operator,
            completed: ctx.completed,
            schema,
        }
    }
}

/// One candidate offered to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Text shown in the list.
    pub label: String,
    /// Secondary text, such as the field type.
    pub detail: Option<String>,
    /// Action to apply when the suggestion is chosen.
    pub action: Action,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Suggestion {
            label: label.into(),
            detail: None,
            action,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A source of suggestions.
///
/// Return `Ok(vec![])` when there is nothing to offer so a chain can fall
/// through to the next provider. Long-running providers should call
/// [`CancellationToken::check`] between units of work.
pub trait SuggestionProvider: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Whether this provider has anything to say in `step`.
    fn handles(&self, step: StepKind) -> bool {
        let _ = step;
        true
    }

    fn suggestions(
        &self,
        ctx: &SuggestionContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, SuggestError>;
}

/// Providers tried in order; the first non-empty answer wins.
///
/// Providers that do not handle the current step are skipped. An error from
/// any provider aborts the chain.
#[derive(Default)]
pub struct SuggestionChain {
    providers: Vec<Box<dyn SuggestionProvider>>,
}

impl SuggestionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain with every built-in provider.
    pub fn builtin() -> Self {
        Self::new()
            .with_provider(FieldProvider::default())
            .with_provider(OperatorProvider)
            .with_provider(OptionsProvider)
            .with_provider(ConnectorProvider)
    }

    /// Adds a provider after the existing ones.
    pub fn with_provider<P: SuggestionProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl SuggestionProvider for SuggestionChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn suggestions(
        &self,
        ctx: &SuggestionContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        for provider in self.providers.iter().filter(|p| p.handles(ctx.step)) {
            cancel.check()?;
            let items = provider.suggestions(ctx, cancel)?;
            if !items.is_empty() {
                tracing::trace!(provider = provider.name(), count = items.len(), "suggestions found");
                return Ok(items);
            }
        }
        Ok(Vec::new())
    }
}

/// Schema fields ranked by fuzzy match against the input.
///
/// Substring matches on key or label always qualify. Other fields qualify
/// when their Jaro-Winkler similarity to the input reaches `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct FieldProvider {
    pub threshold: f64,
}

impl Default for FieldProvider {
    fn default() -> Self {
        FieldProvider { threshold: 0.8 }
    }
}

impl FieldProvider {
    fn score(&self, input: &str, field: &FieldDescriptor) -> Option<f64> {
        if input.is_empty() {
            return Some(0.0);
        }
        let label = field.label.to_lowercase();
        let key = field.key.to_lowercase();
        if label.starts_with(input) || key.starts_with(input) {
            return Some(2.0);
        }
        if label.contains(input) || key.contains(input) {
            return Some(1.5);
        }
        let similarity = strsim::jaro_winkler(input, &label).max(strsim::jaro_winkler(input, &key));
        (similarity >= self.threshold).then_some(similarity)
    }
}

impl SuggestionProvider for FieldProvider {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn handles(&self, step: StepKind) -> bool {
        step == StepKind::SelectingField
    }

    fn suggestions(
        &self,
        ctx: &SuggestionContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let input = ctx.input.trim().to_lowercase();
        let mut scored = Vec::new();
        for field in &ctx.schema.fields {
            cancel.check()?;
            if let Some(score) = self.score(&input, field) {
                scored.push((score, field));
            }
        }
        // Stable: equal scores keep schema order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .map(|(_, field)| {
                Suggestion::new(field.label.clone(), Action::SelectField(field.clone()))
                    .detail(field.field_type.as_str())
            })
            .collect())
    }
}

/// Operators allowed for the selected field, filtered by prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorProvider;

impl SuggestionProvider for OperatorProvider {
    fn name(&self) -> &'static str {
        "operators"
    }

    fn handles(&self, step: StepKind) -> bool {
        step == StepKind::SelectingOperator
    }

    fn suggestions(
        &self,
        ctx: &SuggestionContext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let Some(field) = ctx.current_field else {
            return Ok(Vec::new());
        };
        let input = ctx.input.trim().to_lowercase();
        Ok(field
            .operators
            .iter()
            .filter(|op| {
                input.is_empty()
                    || op.key.starts_with(&input)
                    || op.label.to_lowercase().starts_with(&input)
                    || op.symbol.as_deref().is_some_and(|s| s.starts_with(&input))
            })
            .map(|op| {
                let suggestion = Suggestion::new(op.short_text(), Action::SelectOperator(op.clone()));
                if op.symbol.is_some() {
                    suggestion.detail(op.label.clone())
                } else {
                    suggestion
                }
            })
            .collect())
    }
}

/// Value choices for enum and boolean fields.
///
/// Free-form fields get no suggestions; the host confirms typed text itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsProvider;

impl SuggestionProvider for OptionsProvider {
    fn name(&self) -> &'static str {
        "options"
    }

    fn handles(&self, step: StepKind) -> bool {
        step == StepKind::EnteringValue
    }

    fn suggestions(
        &self,
        ctx: &SuggestionContext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let Some(field) = ctx.current_field else {
            return Ok(Vec::new());
        };
        if ctx.current_operator.is_some_and(|op| !op.requires_value) {
            return Ok(Vec::new());
        }
        let input = ctx.input.trim().to_lowercase();
        let matches = |label: &str, value: &str| {
            input.is_empty()
                || label.to_lowercase().contains(&input)
                || value.to_lowercase().starts_with(&input)
        };

        let items = match field.field_type {
            FieldType::Enum => field
                .options
                .iter()
                .filter(|o| matches(o.label.as_str(), o.value.as_str()))
                .map(|o| {
                    let value = ConditionValue::new(o.value.as_str(), o.label.as_str(), o.value.as_str());
                    Suggestion::new(o.label.clone(), Action::ConfirmValue(value))
                })
                .collect(),
            FieldType::Boolean => [true, false]
                .into_iter()
                .filter(|b| matches(b.to_string().as_str(), ""))
                .map(|b| Suggestion::new(b.to_string(), Action::ConfirmValue(ConditionValue::from_raw(b))))
                .collect(),
            _ => Vec::new(),
        };
        Ok(items)
    }
}

/// `AND` / `OR`, filtered by prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectorProvider;

impl SuggestionProvider for ConnectorProvider {
    fn name(&self) -> &'static str {
        "connectors"
    }

    fn handles(&self, step: StepKind) -> bool {
        step == StepKind::SelectingConnector
    }

    fn suggestions(
        &self,
        ctx: &SuggestionContext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let input = ctx.input.trim();
        Ok([Connector::And, Connector::Or]
            .into_iter()
            .filter(|c| {
                c.as_str()
                    .get(..input.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(input))
            })
            .map(|c| Suggestion::new(c.as_str(), Action::SelectConnector(c)))
            .collect())
    }
}

/// Handle for one in-flight query.
#[derive(Debug, Clone)]
pub struct QueryTicket {
    generation: u64,
    token: CancellationToken,
}

impl QueryTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token to pass to the provider.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Tracks the latest suggestion query and rejects stale results.
#[derive(Debug, Default)]
pub struct SuggestionSession {
    generation: u64,
    current: Option<CancellationToken>,
}

impl SuggestionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new query, cancelling the previous one.
    pub fn begin(&mut self) -> QueryTicket {
        self.cancel();
        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        QueryTicket {
            generation: self.generation,
            token,
        }
    }

    /// Cancels the current query, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    /// Returns `true` if `ticket` belongs to the current, uncancelled query.
    pub fn is_current(&self, ticket: &QueryTicket) -> bool {
        ticket.generation == self.generation && !ticket.token.is_cancelled()
    }

    /// Filters a provider result through the staleness check.
    ///
    /// Results for superseded or cancelled queries, and
    /// [`SuggestError::Cancelled`] itself, yield `Ok(None)`. Other provider
    /// errors are returned as-is when the query is still current.
    pub fn accept(
        &self,
        ticket: &QueryTicket,
        result: Result<Vec<Suggestion>, SuggestError>,
    ) -> Result<Option<Vec<Suggestion>>, SuggestError> {
        if !self.is_current(ticket) {
            tracing::debug!(
                generation = ticket.generation,
                current = self.generation,
                "discarding stale suggestions"
            );
            return Ok(None);
        }
        match result {
            Ok(items) => Ok(Some(items)),
            Err(SuggestError::Cancelled) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
