//! Typed objects: the user-defined behaviour bound to a [`crate::node::Node`]
//! whose lifecycle (creation, field updates, destruction) is driven by
//! changes to the node's underlying data.

pub mod registry;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::node::{capitalize, NodeRef};

pub use registry::TypeRegistry;

/// The behaviour a node's bound object must provide. All methods have
/// no-op defaults: a concrete type overrides only the hooks it cares about.
pub trait TypedObject: Any + Send + Sync {
    fn created(&self) {}
    fn created_children(&self) {}
    fn created_tree(&self) {}
    fn destroyed(&self) {}
    fn updated(&self, _field: &str, _value: &Value) {}

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Optional capability: a typed object can redirect path resolution to a
/// different set of nodes. Modelled as a side table on [`ObjectType`]
/// rather than a supertrait, since a `dyn TypedObject` cannot be
/// downcast to a second trait object directly.
type RedirectFn = Box<dyn Fn(&dyn TypedObject) -> Vec<NodeRef> + Send + Sync>;
type FieldSetter = Box<dyn Fn(&dyn TypedObject, &Value) + Send + Sync>;
type Constructor = Box<dyn Fn(NodeRef) -> Arc<dyn TypedObject> + Send + Sync>;

/// A named binding descriptor: a constructor plus the field-dispatch table
/// built at registration time (the idiomatic replacement for the source
/// system's reflection-based field assignment, per the design notes).
pub struct ObjectType {
    name: String,
    constructor: Constructor,
    fields: HashMap<String, FieldSetter>,
    redirect: Option<RedirectFn>,
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("supports_redirect", &self.redirect.is_some())
            .finish()
    }
}

impl ObjectType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    pub(crate) fn construct(&self, node: NodeRef) -> Arc<dyn TypedObject> {
        (self.constructor)(node)
    }

    /// Sets field `key` (by capitalized name) on `object` if a matching
    /// setter was registered, then always calls `updated(key, raw)` with
    /// the raw, uncoerced value, per the field coercion contract.
    pub(crate) fn apply_field(&self, object: &Arc<dyn TypedObject>, key: &str, raw: &Value) {
        let field_name = capitalize(key);
        if let Some(setter) = self.fields.get(&field_name) {
            setter(object.as_ref(), raw);
        }
        object.updated(key, raw);
    }

    pub(crate) fn redirect_for(&self, object: &Arc<dyn TypedObject>) -> Option<Vec<NodeRef>> {
        self.redirect.as_ref().map(|f| f(object.as_ref()))
    }
}

/// Builds an [`ObjectType`] for a concrete typed-object implementation `T`,
/// registering settable fields and an optional redirect probe by name.
pub struct ObjectTypeBuilder<T: TypedObject + 'static> {
    name: String,
    fields: Vec<(String, Box<dyn Fn(&T, &Value) + Send + Sync>)>,
    redirect: Option<Box<dyn Fn(&T) -> Vec<NodeRef> + Send + Sync>>,
    _marker: PhantomData<fn(NodeRef) -> T>,
}

impl<T: TypedObject + 'static> ObjectTypeBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            redirect: None,
            _marker: PhantomData,
        }
    }

    /// Registers a settable field. `name` is matched case-sensitively after
    /// capitalizing its first character, per the field coercion rules.
    #[must_use]
    pub fn field(
        mut self,
        name: impl Into<String>,
        setter: impl Fn(&T, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push((capitalize(&name.into()), Box::new(setter)));
        self
    }

    #[must_use]
    pub fn redirect(mut self, f: impl Fn(&T) -> Vec<NodeRef> + Send + Sync + 'static) -> Self {
        self.redirect = Some(Box::new(f));
        self
    }

    pub fn build(self, constructor: impl Fn(NodeRef) -> T + Send + Sync + 'static) -> ObjectType {
        let fields: HashMap<String, FieldSetter> = self
            .fields
            .into_iter()
            .map(|(name, setter)| {
                let setter: FieldSetter = Box::new(move |obj: &dyn TypedObject, v: &Value| {
                    if let Some(concrete) = (obj as &dyn Any).downcast_ref::<T>() {
                        setter(concrete, v);
                    }
                });
                (name, setter)
            })
            .collect();

        let redirect: Option<RedirectFn> = self.redirect.map(|f| -> RedirectFn {
            Box::new(move |obj: &dyn TypedObject| {
                (obj as &dyn Any)
                    .downcast_ref::<T>()
                    .map(|concrete| f(concrete))
                    .unwrap_or_default()
            })
        });

        ObjectType {
            name: self.name,
            constructor: Box::new(move |node| Arc::new(constructor(node)) as Arc<dyn TypedObject>),
            fields,
            redirect,
        }
    }
}
