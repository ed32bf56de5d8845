//! Dependency-checked middleware stacks.
//!
//! A [`MiddlewareStack`] is an ordered list of middlewares built before the
//! server starts. Adding a middleware checks that every capability it depends
//! on is already provided by the stack or one of its ancestors. The first
//! middleware in the list is the outermost layer, so execution order equals
//! list order.
//!
//! Child stacks borrow their parent, which ties them to the build phase: a
//! route stack is created, validated and wrapped while the server is being
//! assembled, then dropped.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::DependencyError;
use crate::middleware::{wrap, BoxedHandler, Handler, Middleware};

/// Ordered middlewares with the set of capabilities they provide.
#[derive(Default)]
pub struct MiddlewareStack<'p> {
    middlewares: Vec<Arc<dyn Middleware>>,
    provided: BTreeSet<&'static str>,
    parent: Option<&'p MiddlewareStack<'p>>,
}

impl<'p> MiddlewareStack<'p> {
    /// Creates an empty root stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty stack whose dependency checks also see `parent`.
    pub fn with_parent(parent: &'p MiddlewareStack<'p>) -> Self {
        Self {
            middlewares: Vec::new(),
            provided: BTreeSet::new(),
            parent: Some(parent),
        }
    }

    /// Appends `middleware` as the innermost layer.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), DependencyError> {
        self.check(&middleware.dependencies())?;
        self.provided.insert(middleware.name());
        self.middlewares.push(middleware);
        Ok(())
    }

    /// Prepends `middleware` as the outermost layer.
    pub fn shift(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), DependencyError> {
        self.check(&middleware.dependencies())?;
        self.provided.insert(middleware.name());
        self.middlewares.insert(0, middleware);
        Ok(())
    }

    /// Checks the dependencies declared by `handler`.
    pub fn validate_handler(&self, handler: &dyn Handler) -> Result<(), DependencyError> {
        self.check(&handler.dependencies())
    }

    /// Returns true if `name` is provided by this stack or an ancestor.
    pub fn is_provided(&self, name: &str) -> bool {
        self.provided.contains(name) || self.parent.is_some_and(|parent| parent.is_provided(name))
    }

    /// Every provided capability, this stack's first, then each ancestor's.
    pub fn provided_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(stack) = current {
            names.extend(stack.provided.iter().map(|name| (*name).to_string()));
            current = stack.parent;
        }
        names
    }

    /// Number of middlewares in this stack, excluding ancestors.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true if this stack holds no middlewares.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Wraps `handler` in this stack's middlewares, first one outermost.
    ///
    /// Ancestor middlewares are not applied; the parent wraps its own chain.
    pub fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(handler, |next, middleware| wrap(middleware.clone(), next))
    }

    fn check(&self, dependencies: &[&'static str]) -> Result<(), DependencyError> {
        match dependencies.iter().find(|dep| !self.is_provided(dep)) {
            Some(missing) => Err(DependencyError {
                not_found: (*missing).to_string(),
                provided: self.provided_names(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MiddlewareStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.middlewares.iter().map(|m| m.name()).collect();
        f.debug_struct("MiddlewareStack")
            .field("middlewares", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
