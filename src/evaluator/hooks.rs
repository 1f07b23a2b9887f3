// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parameter and function resolution hooks
//!
//! A host can register, per lookup kind, a synchronous handler and an
//! asynchronous resolver. Both collapse into a single [`Hook`] whose
//! [`HookPolicy`] describes which of them will run. Invocation runs the
//! handler first and then awaits the resolver, with no short-circuit.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::error::EvaluationResult;
use crate::engine::Expression;
use crate::model::Value;

/// Asynchronous resolver for a parameter or function name
#[async_trait]
pub trait Resolver<A: Send>: Send + Sync {
    /// Resolve `name`, recording any result in `args`
    ///
    /// Leaving the result unset means "not handled"; returning an error
    /// aborts the evaluation pass with that error.
    async fn resolve(&self, name: &str, args: &mut A) -> EvaluationResult<()>;
}

#[async_trait]
impl<A, R> Resolver<A> for Arc<R>
where
    A: Send,
    R: Resolver<A> + ?Sized,
{
    async fn resolve(&self, name: &str, args: &mut A) -> EvaluationResult<()> {
        (**self).resolve(name, args).await
    }
}

/// Synchronous, fire-and-forget handler
pub type Handler<A> = Arc<dyn Fn(&str, &mut A) + Send + Sync>;

/// Sync handler for parameter lookups
pub type ParameterHandler = Handler<ParameterArgs>;
/// Sync handler for function calls
pub type FunctionHandler = Handler<FunctionArgs>;
/// Async resolver for parameter lookups
pub type ParameterResolver = Arc<dyn Resolver<ParameterArgs>>;
/// Async resolver for function calls
pub type FunctionResolver = Arc<dyn Resolver<FunctionArgs>>;

struct FnResolver<F>(F);

#[async_trait]
impl<A, F> Resolver<A> for FnResolver<F>
where
    A: Send,
    F: for<'a> Fn(&'a str, &'a mut A) -> BoxFuture<'a, EvaluationResult<()>> + Send + Sync,
{
    async fn resolve(&self, name: &str, args: &mut A) -> EvaluationResult<()> {
        (self.0)(name, args).await
    }
}

/// Build a resolver from a closure returning a boxed future
///
/// ```ignore
/// let resolver = resolver_fn(|name, args: &mut ParameterArgs| {
///     Box::pin(async move {
///         args.set_result(name.len() as i64);
///         Ok(())
///     })
/// });
/// ```
pub fn resolver_fn<A, F>(f: F) -> Arc<dyn Resolver<A>>
where
    A: Send + 'static,
    F: for<'a> Fn(&'a str, &'a mut A) -> BoxFuture<'a, EvaluationResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnResolver(f))
}

/// Which parts of a hook run when it is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPolicy {
    /// Only the synchronous handler
    SyncOnly,
    /// Only the asynchronous resolver
    Async,
    /// The handler, then the resolver
    BothSequential,
}

/// A sync handler and an async resolver for one lookup kind
pub struct Hook<A> {
    handler: Option<Handler<A>>,
    resolver: Option<Arc<dyn Resolver<A>>>,
}

impl<A> Clone for Hook<A> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<A> Default for Hook<A> {
    fn default() -> Self {
        Self {
            handler: None,
            resolver: None,
        }
    }
}

impl<A> fmt::Debug for Hook<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("handler", &self.handler.is_some())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<A: Send> Hook<A> {
    /// Create a hook from optional parts
    pub fn new(handler: Option<Handler<A>>, resolver: Option<Arc<dyn Resolver<A>>>) -> Self {
        Self { handler, resolver }
    }

    /// Replace the sync handler
    pub fn set_handler(&mut self, handler: Handler<A>) {
        self.handler = Some(handler);
    }

    /// Replace the async resolver
    pub fn set_resolver(&mut self, resolver: Arc<dyn Resolver<A>>) {
        self.resolver = Some(resolver);
    }

    /// The sync handler, if any
    pub fn handler(&self) -> Option<&Handler<A>> {
        self.handler.as_ref()
    }

    /// The async resolver, if any
    pub fn resolver(&self) -> Option<&Arc<dyn Resolver<A>>> {
        self.resolver.as_ref()
    }

    /// This hook without its sync handler
    pub fn resolver_only(&self) -> Self {
        Self {
            handler: None,
            resolver: self.resolver.clone(),
        }
    }

    /// This hook with its resolver replaced when `resolver` is given
    pub fn overridden(&self, resolver: Option<Arc<dyn Resolver<A>>>) -> Self {
        Self {
            handler: self.handler.clone(),
            resolver: resolver.or_else(|| self.resolver.clone()),
        }
    }

    /// Whether neither part is registered
    pub fn is_empty(&self) -> bool {
        self.handler.is_none() && self.resolver.is_none()
    }

    /// Which parts run on invocation; `None` when nothing is registered
    pub fn policy(&self) -> Option<HookPolicy> {
        match (&self.handler, &self.resolver) {
            (Some(_), Some(_)) => Some(HookPolicy::BothSequential),
            (Some(_), None) => Some(HookPolicy::SyncOnly),
            (None, Some(_)) => Some(HookPolicy::Async),
            (None, None) => None,
        }
    }

    /// Run the handler, then await the resolver
    pub async fn invoke(&self, name: &str, args: &mut A) -> EvaluationResult<()> {
        if let Some(handler) = &self.handler {
            handler(name, args);
        }
        if let Some(resolver) = &self.resolver {
            resolver.resolve(name, args).await?;
        }
        Ok(())
    }
}

/// Arguments passed to parameter hooks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterArgs {
    result: Option<Value>,
}

impl ParameterArgs {
    /// Create empty arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resolved value
    pub fn set_result(&mut self, value: impl Into<Value>) {
        self.result = Some(value.into());
    }

    /// Whether a hook has produced a value
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// The resolved value, if any
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Consume the arguments, returning the resolved value
    pub fn into_result(self) -> Option<Value> {
        self.result
    }
}

/// Arguments passed to function hooks
///
/// Call arguments are lazy: each is an [`Expression`] sharing the caller's
/// parameters, options and hooks, evaluated only when the hook asks for it.
#[derive(Debug, Default)]
pub struct FunctionArgs {
    arguments: Vec<Expression>,
    result: Option<Value>,
}

impl FunctionArgs {
    /// Wrap lazily evaluated arguments
    pub fn new(arguments: Vec<Expression>) -> Self {
        Self {
            arguments,
            result: None,
        }
    }

    /// The argument expressions
    pub fn arguments(&self) -> &[Expression] {
        &self.arguments
    }

    /// Mutable access to the argument expressions
    pub fn arguments_mut(&mut self) -> &mut [Expression] {
        &mut self.arguments
    }

    /// Number of call arguments
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Whether the call has no arguments
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Evaluate every argument in order
    pub async fn evaluate_arguments(&mut self) -> EvaluationResult<Vec<Value>> {
        let mut values = Vec::with_capacity(self.arguments.len());
        for argument in &mut self.arguments {
            values.push(argument.evaluate_with_installed_hooks().await?);
        }
        Ok(values)
    }

    /// Evaluate every argument in order, blocking the current thread
    ///
    /// Intended for sync handlers.
    pub fn evaluate_arguments_blocking(&mut self) -> EvaluationResult<Vec<Value>> {
        self.arguments
            .iter_mut()
            .map(Expression::evaluate_with_installed_hooks_blocking)
            .collect()
    }

    /// Record the call's result
    pub fn set_result(&mut self, value: impl Into<Value>) {
        self.result = Some(value.into());
    }

    /// Whether a hook has produced a value
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// The call's result, if any
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Consume the arguments, returning the call's result
    pub fn into_result(self) -> Option<Value> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Resolver<ParameterArgs> for Recording {
        async fn resolve(&self, _name: &str, args: &mut ParameterArgs) -> EvaluationResult<()> {
            self.0.lock().unwrap().push("async");
            args.set_result(2);
            Ok(())
        }
    }

    #[test]
    fn test_policy() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler: ParameterHandler = Arc::new(|_, _| {});
        let resolver: ParameterResolver = Arc::new(Recording(calls));

        assert_eq!(Hook::<ParameterArgs>::default().policy(), None);
        assert_eq!(
            Hook::new(Some(handler.clone()), None).policy(),
            Some(HookPolicy::SyncOnly)
        );
        assert_eq!(
            Hook::new(None, Some(resolver.clone())).policy(),
            Some(HookPolicy::Async)
        );
        let both = Hook::new(Some(handler), Some(resolver));
        assert_eq!(both.policy(), Some(HookPolicy::BothSequential));
        assert_eq!(both.resolver_only().policy(), Some(HookPolicy::Async));
    }

    #[tokio::test]
    async fn test_invoke_runs_handler_then_resolver() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sync_calls = calls.clone();
        let handler: ParameterHandler = Arc::new(move |_, args| {
            sync_calls.lock().unwrap().push("sync");
            args.set_result(1);
        });
        let hook = Hook::new(Some(handler), Some(Arc::new(Recording(calls.clone())) as ParameterResolver));

        let mut args = ParameterArgs::new();
        hook.invoke("x", &mut args).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["sync", "async"]);
        assert_eq!(args.into_result(), Some(Value::Integer(2)));
    }

    #[tokio::test]
    async fn test_resolver_fn() {
        let resolver = resolver_fn(|name, args: &mut ParameterArgs| {
            Box::pin(async move {
                args.set_result(name.len() as i64);
                Ok::<(), crate::evaluator::EvaluationError>(())
            })
        });
        let mut args = ParameterArgs::new();
        resolver.resolve("abc", &mut args).await.unwrap();
        assert_eq!(args.result(), Some(&Value::Integer(3)));
    }
}
