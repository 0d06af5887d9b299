//! Declarative tree descriptions.
//!
//! An [`Element`] is an immutable, cheaply cloned description of a subtree.
//! The reconciler compares elements by pointer: handing it the same
//! `Element` again means "nothing changed here".

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::RenderError;
use crate::lane::Lanes;
use crate::resource::{Resource, Wakeable};

/// Sibling key used to match children across renders.
pub type Key = Rc<str>;

/// Host node attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Props(BTreeMap<String, String>);

impl Props {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.insert(name.into(), value.into());
		self
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Props {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

/// A unit of user code that expands into child elements.
///
/// Rendering must be pure: the reconciler may call `render` several times
/// for one commit, or discard the result entirely.
pub trait Component {
	/// Name used to match this component against the previous render.
	fn kind(&self) -> &'static str {
		std::any::type_name::<Self>()
	}

	/// Produces the children, or signals that the subtree cannot render yet.
	fn render(&self, cx: &mut RenderContext) -> Result<Vec<Element>, RenderSignal>;
}

/// Non-success outcome of [`Component::render`].
pub enum RenderSignal {
	/// Data is not ready; retry after the wakeable resolves.
	Suspend(Arc<dyn Wakeable>),
	/// Rendering failed.
	Error(RenderError),
}

impl From<RenderError> for RenderSignal {
	fn from(error: RenderError) -> Self {
		Self::Error(error)
	}
}

impl fmt::Debug for RenderSignal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Suspend(wakeable) => f.debug_tuple("Suspend").field(&wakeable.id()).finish(),
			Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
		}
	}
}

/// Context handed to [`Component::render`].
#[derive(Debug)]
pub struct RenderContext {
	lanes: Lanes,
}

impl RenderContext {
	pub(crate) fn new(lanes: Lanes) -> Self {
		Self { lanes }
	}

	/// Lanes of the render pass calling the component.
	pub fn lanes(&self) -> Lanes {
		self.lanes
	}

	/// Reads a resource, suspending the component when it is not ready.
	pub fn read<T: Clone + Send + 'static>(&mut self, resource: &Resource<T>) -> Result<T, RenderSignal> {
		resource.get().ok_or_else(|| RenderSignal::Suspend(resource.as_wakeable()))
	}
}

/// Fallback builder for a catch boundary.
pub type CatchFallback = Rc<dyn Fn(&RenderError) -> Vec<Element>>;

#[derive(Clone)]
pub(crate) enum ElementKind {
	Host { tag: Rc<str>, props: Props, children: Vec<Element> },
	Text(Rc<str>),
	Fragment { children: Vec<Element> },
	Component(Rc<dyn Component>),
	Boundary { fallback: Vec<Element>, children: Vec<Element>, deferred: bool },
	Catch { fallback: CatchFallback, children: Vec<Element> },
}

#[derive(Clone)]
struct ElementInner {
	key: Option<Key>,
	kind: ElementKind,
}

/// Immutable description of a subtree.
#[derive(Clone)]
pub struct Element(Rc<ElementInner>);

impl Element {
	fn from_kind(kind: ElementKind) -> Self {
		Self(Rc::new(ElementInner { key: None, kind }))
	}

	/// Host node with attributes and children.
	pub fn host(tag: &str, props: Props, children: impl IntoIterator<Item = Element>) -> Self {
		Self::from_kind(ElementKind::Host {
			tag: Rc::from(tag),
			props,
			children: children.into_iter().collect(),
		})
	}

	/// Text leaf.
	pub fn text(text: impl AsRef<str>) -> Self {
		Self::from_kind(ElementKind::Text(Rc::from(text.as_ref())))
	}

	/// Transparent group of children.
	pub fn fragment(children: impl IntoIterator<Item = Element>) -> Self {
		Self::from_kind(ElementKind::Fragment {
			children: children.into_iter().collect(),
		})
	}

	/// User component.
	pub fn component(component: impl Component + 'static) -> Self {
		Self::from_kind(ElementKind::Component(Rc::new(component)))
	}

	/// Suspense boundary showing `fallback` while `children` wait on data.
	pub fn boundary(fallback: impl IntoIterator<Item = Element>, children: impl IntoIterator<Item = Element>) -> Self {
		Self::from_kind(ElementKind::Boundary {
			fallback: fallback.into_iter().collect(),
			children: children.into_iter().collect(),
			deferred: false,
		})
	}

	/// Error boundary rendering `fallback` when a descendant fails.
	pub fn catch<F>(fallback: F, children: impl IntoIterator<Item = Element>) -> Self
	where
		F: Fn(&RenderError) -> Vec<Element> + 'static,
	{
		Self::from_kind(ElementKind::Catch {
			fallback: Rc::new(fallback),
			children: children.into_iter().collect(),
		})
	}

	/// Sets the sibling key.
	pub fn with_key(mut self, key: impl AsRef<str>) -> Self {
		Rc::make_mut(&mut self.0).key = Some(Rc::from(key.as_ref()));
		self
	}

	/// Marks a boundary as deferred: on first mount it commits its fallback
	/// and renders its content later at offscreen priority. No effect on
	/// other elements.
	pub fn deferred(mut self) -> Self {
		if let ElementKind::Boundary { deferred, .. } = &mut Rc::make_mut(&mut self.0).kind {
			*deferred = true;
		}
		self
	}

	pub fn key(&self) -> Option<&Key> {
		self.0.key.as_ref()
	}

	/// Returns true when both handles point at the same description.
	pub fn same(&self, other: &Element) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn kind(&self) -> &ElementKind {
		&self.0.kind
	}

	/// Returns true when a unit built from `self` can be reused for `other`.
	pub(crate) fn same_type(&self, other: &Element) -> bool {
		match (self.kind(), other.kind()) {
			(ElementKind::Host { tag: a, .. }, ElementKind::Host { tag: b, .. }) => a == b,
			(ElementKind::Text(_), ElementKind::Text(_)) => true,
			(ElementKind::Fragment { .. }, ElementKind::Fragment { .. }) => true,
			(ElementKind::Component(a), ElementKind::Component(b)) => a.kind() == b.kind(),
			(ElementKind::Boundary { .. }, ElementKind::Boundary { .. }) => true,
			(ElementKind::Catch { .. }, ElementKind::Catch { .. }) => true,
			_ => false,
		}
	}

	/// Attributes of a host element.
	pub fn props(&self) -> Option<&Props> {
		match self.kind() {
			ElementKind::Host { props, .. } => Some(props),
			_ => None,
		}
	}

	/// Content of a text element.
	pub fn as_text(&self) -> Option<&str> {
		match self.kind() {
			ElementKind::Text(text) => Some(text),
			_ => None,
		}
	}
}

impl fmt::Debug for Element {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut out = match self.kind() {
			ElementKind::Host { tag, props, children } => {
				let mut out = f.debug_struct("Host");
				out.field("tag", tag).field("props", props).field("children", children);
				out
			}
			ElementKind::Text(text) => return f.debug_tuple("Text").field(text).finish(),
			ElementKind::Fragment { children } => {
				let mut out = f.debug_struct("Fragment");
				out.field("children", children);
				out
			}
			ElementKind::Component(component) => {
				let mut out = f.debug_struct("Component");
				out.field("kind", &component.kind());
				out
			}
			ElementKind::Boundary { fallback, children, deferred } => {
				let mut out = f.debug_struct("Boundary");
				out.field("fallback", fallback).field("children", children).field("deferred", deferred);
				out
			}
			ElementKind::Catch { children, .. } => {
				let mut out = f.debug_struct("Catch");
				out.field("children", children);
				out
			}
		};
		if let Some(key) = self.key() {
			out.field("key", key);
		}
		out.finish()
	}
}
