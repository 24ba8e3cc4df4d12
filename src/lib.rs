//! Declarative selector bindings over a live, mutating document tree.
//!
//! Application code registers `(selector, Config)` pairs on an [`Engine`].
//! Matching elements present at registration time are bound immediately and
//! the engine keeps the bindings correct as the [`Document`] mutates: every
//! structural change is recorded in the document's mutation feed and
//! [`Engine::flush`] drains it, binding inserted subtrees and tearing down
//! removed ones.
//!
//! ```
//! use bindery::{Config, Engine, Events};
//!
//! # fn main() -> bindery::Result<()> {
//! let mut engine = Engine::from_html("<ul id='list'><li>a</li></ul>")?;
//! let config = Config::builder()
//!     .events(Events::new().on("click", |engine, call| {
//!         engine.document_mut().class_toggle(call.element, "is-selected")?;
//!         Ok(())
//!     }))
//!     .build();
//! engine.register("li", &config)?;
//!
//! let li = engine.document().query_selector("li")?.expect("li exists");
//! engine.click(li)?;
//! assert!(engine.document().class_contains(li, "is-selected"));
//! # Ok(())
//! # }
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

mod binder;
mod config;
mod context;
mod directives;
mod dom;
mod engine;
mod events;
mod observer;
mod registry;
mod resolver;
mod selector;
mod template;
mod value;

pub use config::{
    Action, Call, Callback, Callbacks, Cardinality, Config, ConfigBuilder, ConfigId, Data,
    EventDirective, Events, RefSpec, Refs, Shortcut,
};
pub use context::{Context, ContextId};
pub use dom::{Document, MutationRecord};
pub use engine::{BindTarget, Engine, EngineOptions};
pub use events::{DispatchOutcome, Event, EventInit};
pub use template::{Template, compile_template};
pub use value::{Record, Value};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("invalid node: {0}")]
    InvalidNode(String),
    #[error("dom error: {0}")]
    Dom(String),
    #[error("template parse error: {0}")]
    TemplateParse(String),
    #[error("template evaluation error: {0}")]
    TemplateEvaluation(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("mutation feed did not settle after {0} batches")]
    FlushLimit(usize),
}

impl Error {
    /// Shorthand for application callbacks that want to fail with a message.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

/// Handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}
